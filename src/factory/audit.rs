use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::PoolRole;

/// One recorded `execute` call.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// The statement as submitted
    pub statement: String,
    /// Wall-clock execution time in seconds
    pub took_secs: f64,
    /// Which pool the statement was routed to
    pub route: PoolRole,
    /// Whether execution produced a successful outcome
    pub success: bool,
    /// Error text, when the outcome failed
    pub error: Option<String>,
    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Append-only log of executed statements, shared across concurrent calls.
///
/// Appends are serialized by a mutex; entries are never mutated or removed.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn record(&self, entry: AuditEntry) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(entry);
    }

    /// Snapshot of all entries recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
