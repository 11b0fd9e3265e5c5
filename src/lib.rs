// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod telemetry;

// Persistence layer
pub mod postgres;
pub mod queries;

// Convenience re-exports for consumers
pub use config::DatabaseSettings;
pub use error::{DatabaseError, Result};
pub use postgres::DatabaseService;
pub use queries::Queries;
