use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlDispatchError {
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    /// Execution was attempted before `initialize()` or after `shutdown()`.
    #[error("Factory not initialized: {0}")]
    NotInitialized(String),

    /// `initialize()` was called while pools already exist.
    #[error("Factory already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Pool closed: {0}")]
    PoolClosed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// A statement was queued on a transaction that has not begun.
    #[error("Transaction not active: {0}")]
    TransactionNotActive(String),

    /// A statement was queued on a committed or rolled-back transaction.
    #[error("Transaction already finished: {0}")]
    TransactionFinished(String),
}
