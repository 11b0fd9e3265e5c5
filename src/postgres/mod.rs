//! PostgreSQL persistence module.
//!
//! Owns the process-wide connection pool and its health/lifecycle
//! facade.

pub mod pool;

pub use pool::DatabaseService;
