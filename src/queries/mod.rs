//! Query-execution handle bound to the shared pool.
//!
//! Statement definitions live with the application layer; this crate
//! only owns the pool they execute against.

use sqlx::PgPool;

/// Entry point for issuing statements against the shared pool.
///
/// Cheap to clone; every clone shares the same underlying pool.
///
/// ```ignore
/// let service = DatabaseService::instance().await?;
/// let row: (i64,) = sqlx::query_as("SELECT count(*) FROM sessions")
///     .fetch_one(service.queries().pool())
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Queries {
    pool: PgPool,
}

impl Queries {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The pool to bind statements to.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
