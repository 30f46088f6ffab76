//! Content store implementations.

pub mod sqlite;

pub use sqlite::SqliteCatalog;
