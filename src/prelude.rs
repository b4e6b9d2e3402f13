//! Convenient imports for common functionality.

pub use crate::error::SqlDispatchError;
pub use crate::factory::{AuditEntry, DbFactory, FactoryConfig};
pub use crate::results::{DbRow, QueryOutcome};
pub use crate::statement::{CompiledStatement, EagerStatement};
pub use crate::transaction::{Transaction, TxState};
pub use crate::types::{PoolRole, SqlValue};
