use thiserror::Error;

/// Error taxonomy for the discovery-to-topology pipeline.
///
/// Adapter- and host-level failures are contained inside the ingestion
/// pipeline: `AdapterUnavailable`/`AdapterTimeout` fail a whole batch,
/// `HostUnreachable` degrades a single host to "no update". `Conflict`
/// indicates a broken reconciliation invariant and is never swallowed.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("discovery adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("discovery adapter timed out")]
    AdapterTimeout,

    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("reconciliation conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                InventoryError::NotFound("row not found".to_string())
            }
            other => InventoryError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
