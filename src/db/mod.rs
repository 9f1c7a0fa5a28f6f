//! SQLite persistence layer: schema setup and row conversion.

pub mod converters;
pub mod schema;
