//! Async read/write-splitting SQL execution layer.
//!
//! A [`DbFactory`] owns two connection pools, one write-capable and one
//! read-only, routes each finished SQL statement to one of them by a cheap syntactic
//! classification, and normalizes every driver response into a uniform
//! [`QueryOutcome`]. Multi-statement transactions reserve one write session
//! and replay queued statements in submission order, rolling back on the
//! first failure.
//!
//! ```no_run
//! use sql_dispatch::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlDispatchError> {
//! let factory = DbFactory::new(FactoryConfig::new("db.local", "app", "svc", "secret"))?;
//! factory.initialize().await?;
//!
//! let outcome = factory.execute("SELECT id, name FROM users").await?;
//! for row in outcome.rows.iter().flatten() {
//!     println!("{:?}", row.get("name"));
//! }
//!
//! let outcome = factory
//!     .run_transaction(["INSERT INTO t (name) VALUES ('A')", "UPDATE t SET x = 1"])
//!     .await;
//! assert!(outcome.success);
//!
//! factory.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod factory;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod router;
pub mod session;
pub mod statement;
pub mod transaction;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::SqlDispatchError;
pub use factory::{AuditEntry, DbFactory, FactoryConfig};
pub use pool::{PooledSession, RolePool};
pub use results::{DbRow, QueryOutcome};
pub use router::classify;
pub use session::{RawResponse, SessionFactory, SqlSession};
pub use statement::{CompiledStatement, EagerStatement};
pub use transaction::{Transaction, TxState};
pub use types::{PoolRole, SqlValue};
