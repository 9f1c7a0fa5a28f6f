//! modgraph — module and model dependency graph engine.
//!
//! Provides a SQLite-backed entity/relation store, bounded graph traversal
//! with stop conditions, an incremental session graph, and a JSON HTTP API.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod observability;
pub mod types;
