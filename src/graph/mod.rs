//! Graph layer — SQLite-backed store, bounded traversal, session merge,
//! and catalog filtering.

pub mod filter;
pub mod session;
pub mod store;
pub mod traversal;
