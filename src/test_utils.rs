//! In-memory fake driver for integration tests.
//!
//! Speaks just enough of a toy SQL dialect to exercise routing, pooling, and
//! transactional semantics without a server: `INSERT` appends a `(name, x)`
//! row (name taken from the first quoted literal), `UPDATE` sets `x` for
//! matching rows, `DELETE` removes them, `SELECT` returns the committed rows,
//! and `START TRANSACTION`/`COMMIT`/`ROLLBACK` buffer writes per session until
//! commit. Statements containing a registered failure marker error out, and
//! connects for a chosen role can be made to fail.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::SqlDispatchError;
use crate::session::{RawResponse, SessionFactory, SqlSession};
use crate::types::{PoolRole, SqlValue};

#[derive(Debug, Clone, PartialEq)]
struct FakeRow {
    name: String,
    x: i64,
}

#[derive(Debug, Clone)]
enum FakeOp {
    Insert { name: String, x: i64 },
    Update { name: Option<String>, x: i64 },
    Delete { name: Option<String> },
}

#[derive(Debug, Default)]
struct FakeState {
    rows: Vec<FakeRow>,
    sessions_created_write: usize,
    sessions_created_read: usize,
    sessions_dropped: usize,
    executed: Vec<(PoolRole, String)>,
    fail_connect: Option<PoolRole>,
    fail_markers: Vec<String>,
    sessions_unhealthy: bool,
}

/// Shared fake database plus its session factory.
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
    next_insert_id: Arc<AtomicU64>,
}

impl FakeDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make every statement containing `marker` fail at the driver level.
    pub fn fail_statements_containing(&self, marker: impl Into<String>) {
        self.lock().fail_markers.push(marker.into());
    }

    /// Make `connect` fail for the given role (or succeed again with `None`).
    pub fn set_fail_connect(&self, role: Option<PoolRole>) {
        self.lock().fail_connect = role;
    }

    /// Make every live session report itself unhealthy, so its next recycle
    /// check retires it.
    pub fn set_sessions_unhealthy(&self, unhealthy: bool) {
        self.lock().sessions_unhealthy = unhealthy;
    }

    /// Names of all committed rows, in insertion order.
    #[must_use]
    pub fn committed_names(&self) -> Vec<String> {
        self.lock().rows.iter().map(|row| row.name.clone()).collect()
    }

    /// The `x` value of the committed row with `name`, if present.
    #[must_use]
    pub fn committed_x(&self, name: &str) -> Option<i64> {
        self.lock()
            .rows
            .iter()
            .find(|row| row.name == name)
            .map(|row| row.x)
    }

    #[must_use]
    pub fn sessions_created(&self, role: PoolRole) -> usize {
        let state = self.lock();
        match role {
            PoolRole::Write => state.sessions_created_write,
            PoolRole::Read => state.sessions_created_read,
        }
    }

    #[must_use]
    pub fn sessions_dropped(&self) -> usize {
        self.lock().sessions_dropped
    }

    /// Statements executed on sessions of the given role, in order.
    #[must_use]
    pub fn executed_for(&self, role: PoolRole) -> Vec<String> {
        self.lock()
            .executed
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, sql)| sql.clone())
            .collect()
    }
}

#[async_trait]
impl SessionFactory for FakeDriver {
    async fn connect(&self, role: PoolRole) -> Result<Box<dyn SqlSession>, SqlDispatchError> {
        let mut state = self.lock();
        if state.fail_connect == Some(role) {
            return Err(SqlDispatchError::ConnectionError(format!(
                "fake driver refusing {role} connections"
            )));
        }
        match role {
            PoolRole::Write => state.sessions_created_write += 1,
            PoolRole::Read => state.sessions_created_read += 1,
        }
        drop(state);
        Ok(Box::new(FakeSession {
            role,
            driver: self.clone(),
            pending: None,
        }))
    }
}

struct FakeSession {
    role: PoolRole,
    driver: FakeDriver,
    // Writes buffered since START TRANSACTION; None outside a transaction.
    pending: Option<Vec<FakeOp>>,
}

impl FakeSession {
    fn write_response(affected: u64, insert_id: Option<u64>) -> RawResponse {
        RawResponse {
            columns: None,
            rows: Vec::new(),
            affected_rows: affected,
            last_insert_id: insert_id,
        }
    }

    fn apply(state: &mut FakeState, op: &FakeOp) {
        match op {
            FakeOp::Insert { name, x } => state.rows.push(FakeRow {
                name: name.clone(),
                x: *x,
            }),
            FakeOp::Update { name, x } => {
                for row in &mut state.rows {
                    if name.as_deref().is_none_or(|n| n == row.name) {
                        row.x = *x;
                    }
                }
            }
            FakeOp::Delete { name } => {
                state
                    .rows
                    .retain(|row| name.as_deref().is_some_and(|n| n != row.name));
            }
        }
    }

    fn buffer_or_apply(&mut self, op: FakeOp) {
        if let Some(pending) = self.pending.as_mut() {
            pending.push(op);
        } else {
            Self::apply(&mut self.driver.lock(), &op);
        }
    }
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn execute(&mut self, sql: &str) -> Result<RawResponse, SqlDispatchError> {
        {
            let mut state = self.driver.lock();
            state.executed.push((self.role, sql.to_string()));
            if let Some(marker) = state
                .fail_markers
                .iter()
                .find(|marker| sql.contains(marker.as_str()))
            {
                return Err(SqlDispatchError::ExecutionError(format!(
                    "fake driver rejected statement containing '{marker}'"
                )));
            }
        }

        let head = first_keyword(sql);
        match head.as_str() {
            "START" => {
                self.pending = Some(Vec::new());
                Ok(Self::write_response(0, None))
            }
            "COMMIT" => {
                if let Some(ops) = self.pending.take() {
                    let mut state = self.driver.lock();
                    for op in &ops {
                        Self::apply(&mut state, op);
                    }
                }
                Ok(Self::write_response(0, None))
            }
            "ROLLBACK" => {
                self.pending = None;
                Ok(Self::write_response(0, None))
            }
            "INSERT" => {
                let name = first_quoted(sql).unwrap_or_default();
                let id = self.driver.next_insert_id.fetch_add(1, Ordering::SeqCst) + 1;
                self.buffer_or_apply(FakeOp::Insert { name, x: 0 });
                Ok(Self::write_response(1, Some(id)))
            }
            "UPDATE" => {
                let op = FakeOp::Update {
                    name: first_quoted(sql),
                    x: first_number(sql).unwrap_or(0),
                };
                self.buffer_or_apply(op);
                Ok(Self::write_response(1, None))
            }
            "DELETE" => {
                self.buffer_or_apply(FakeOp::Delete {
                    name: first_quoted(sql),
                });
                Ok(Self::write_response(1, None))
            }
            "SELECT" | "SHOW" => {
                let filter = first_quoted(sql);
                let state = self.driver.lock();
                let rows = state
                    .rows
                    .iter()
                    .filter(|row| filter.as_deref().is_none_or(|n| n == row.name))
                    .map(|row| {
                        vec![SqlValue::Text(row.name.clone()), SqlValue::Int(row.x)]
                    })
                    .collect();
                Ok(RawResponse {
                    columns: Some(vec!["name".to_string(), "x".to_string()]),
                    rows,
                    affected_rows: 0,
                    last_insert_id: None,
                })
            }
            _ => Ok(Self::write_response(0, None)),
        }
    }

    fn is_healthy(&self) -> bool {
        !self.driver.lock().sessions_unhealthy
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.driver.lock().sessions_dropped += 1;
    }
}

fn first_keyword(sql: &str) -> String {
    sql.trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

fn first_quoted(sql: &str) -> Option<String> {
    let start = sql.find('\'')? + 1;
    let end = sql[start..].find('\'')? + start;
    Some(sql[start..end].to_string())
}

fn first_number(sql: &str) -> Option<i64> {
    // First digit run outside quoted literals.
    let mut in_quotes = false;
    let mut digits = String::new();
    for ch in sql.chars() {
        if ch == '\'' {
            in_quotes = !in_quotes;
            if !digits.is_empty() {
                break;
            }
            continue;
        }
        if in_quotes {
            continue;
        }
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}
