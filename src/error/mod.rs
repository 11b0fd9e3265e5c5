use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the database service.
///
/// Startup failures are returned to the caller rather than terminating
/// the process; a host that cannot serve without a database aborts on
/// `Err` itself.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to create connection pool: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("liveness probe failed: {0}")]
    Ping(#[source] sqlx::Error),

    #[error("liveness probe timed out after {0:?}")]
    PingTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DatabaseError::PingTimeout(Duration::from_secs(1));
        assert!(format!("{}", err).contains("timed out"));

        let err = DatabaseError::Connect(sqlx::Error::PoolClosed);
        assert!(format!("{}", err).contains("failed to create connection pool"));
    }
}
