//! Driver boundary: one live session per pooled connection.
//!
//! The execution core never speaks a wire protocol itself. It hands a finished
//! SQL string to a [`SqlSession`] and gets back a [`RawResponse`], which the
//! result normalizer turns into a uniform [`crate::QueryOutcome`]. Production
//! code plugs in the `tokio-postgres` implementation from [`postgres`]; tests
//! substitute an in-memory factory.

pub mod postgres;

use async_trait::async_trait;

use crate::error::SqlDispatchError;
use crate::types::{PoolRole, SqlValue};

pub use postgres::PgSessionFactory;

/// Raw driver response, prior to normalization.
///
/// `columns` is the discriminator: a statement that produced a column
/// description is read-shaped and carries `rows`; anything else is write-shaped
/// and carries `affected_rows` plus, for drivers that have the concept, the
/// last-insert identifier.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Column names, present only when the statement described columns
    pub columns: Option<Vec<String>>,
    /// Positional row values, aligned with `columns`
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows affected by a write-shaped statement
    pub affected_rows: u64,
    /// Driver-reported last-insert identifier, if any
    pub last_insert_id: Option<u64>,
}

/// One live database session, exclusively owned by its pooled connection.
#[async_trait]
pub trait SqlSession: Send {
    /// Execute one raw SQL string and return the driver's response.
    ///
    /// # Errors
    /// Returns an error on driver-level failure (syntax error, constraint
    /// violation, connectivity loss) or when the round-trip times out.
    async fn execute(&mut self, sql: &str) -> Result<RawResponse, SqlDispatchError>;

    /// Whether the session is still usable. Unhealthy sessions are retired by
    /// the pool instead of being lent out again.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Creates sessions on behalf of a pool. Each pool role may connect to a
/// different endpoint (write vs. read port).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Establish one new session for the given pool role.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established within the
    /// configured timeout.
    async fn connect(&self, role: PoolRole) -> Result<Box<dyn SqlSession>, SqlDispatchError>;
}
