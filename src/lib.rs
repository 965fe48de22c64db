// Library interface for testing

pub mod buffer;
pub mod classify;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod flush;
pub mod graph;
pub mod ingest;
pub mod models;
pub mod queries;
pub mod schema;
pub mod serve;
pub mod trend;
pub mod validity;

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
