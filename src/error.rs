//! Crate-wide error type and `Result` alias.

use crate::types::EntityId;

/// Everything that can go wrong inside modgraph.
///
/// No variant is fatal: every failure leaves previously built state
/// (catalog, session graph) untouched, and recovery is re-running the
/// same operation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The catalog or relation backend could not be reached or read.
    #[error("catalog fetch failed: {0}")]
    Fetch(String),

    /// A traversal seed references an id absent from the catalog.
    #[error("unknown seed entity {0}")]
    InvalidSeed(EntityId),

    /// A direct lookup missed. Callers must handle this — there is no
    /// default entity to substitute.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
