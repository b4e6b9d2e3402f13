//! Multi-statement transactions over one reserved write session.
//!
//! A transaction leases a single write connection for its whole lifetime;
//! queued statements replay strictly in submission order on that one session,
//! so their effects are never interleaved with other callers' statements.

use crate::error::SqlDispatchError;
use crate::pool::PooledSession;
use crate::results::QueryOutcome;
use crate::statement::CompiledStatement;

/// Transaction lifecycle. Transitions are one-directional: Idle → Active →
/// Committed | RolledBack. Queuing keeps the state at Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Constructed, `begin` not yet issued
    Idle,
    /// `begin` succeeded; statements may be queued and committed
    Active,
    /// Terminal: all queued statements applied and committed
    Committed,
    /// Terminal: effects undone; the session was released unreused
    RolledBack,
}

/// A stateful sequence of statements bound to one leased write session.
#[derive(Debug)]
pub struct Transaction {
    session: Option<PooledSession>,
    queue: Vec<CompiledStatement>,
    state: TxState,
    last_error: Option<String>,
}

impl Transaction {
    /// Wrap a freshly leased write session. The transaction starts Idle;
    /// nothing has been issued on the session yet.
    #[must_use]
    pub fn new(session: PooledSession) -> Self {
        Self {
            session: Some(session),
            queue: Vec::new(),
            state: TxState::Idle,
            last_error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    /// Number of statements currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The most recent error text, if any statement or transition failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Issue `START TRANSACTION` on the bound session. Idle → Active on
    /// success; a failed start leaves the state unchanged and reports the
    /// failure through the outcome.
    pub async fn begin(&mut self) -> QueryOutcome {
        if self.state == TxState::Active {
            return QueryOutcome::failure("transaction already started");
        }
        if self.is_finished() {
            return QueryOutcome::failure("transaction already finished");
        }
        let outcome = self.run_on_session("START TRANSACTION").await;
        if outcome.success {
            self.state = TxState::Active;
            self.last_error = None;
        } else {
            self.remember_error(&outcome);
        }
        outcome
    }

    /// Queue a statement for the next `commit`. Legal only while Active.
    ///
    /// # Errors
    /// `TransactionNotActive` before `begin`, `TransactionFinished` after
    /// commit/rollback. Queuing never silently succeeds in the wrong state.
    pub fn queue_statement(
        &mut self,
        statement: impl Into<CompiledStatement>,
    ) -> Result<(), SqlDispatchError> {
        match self.state {
            TxState::Active => {
                self.queue.push(statement.into());
                Ok(())
            }
            TxState::Idle => Err(SqlDispatchError::TransactionNotActive(
                "cannot queue statement before begin".to_string(),
            )),
            TxState::Committed | TxState::RolledBack => {
                Err(SqlDispatchError::TransactionFinished(
                    "cannot queue statement on a finished transaction".to_string(),
                ))
            }
        }
    }

    /// Replay every queued statement in submission order, then `COMMIT`.
    ///
    /// The first failing statement triggers `rollback`; remaining queued
    /// statements are discarded unexecuted and the failing statement's outcome
    /// is returned, its message naming the failing step. On success the state
    /// becomes Committed, the queue is cleared, and the session is released.
    pub async fn commit(&mut self) -> QueryOutcome {
        match self.state {
            TxState::Active => {}
            TxState::Idle => return QueryOutcome::failure("no active transaction to commit"),
            TxState::Committed | TxState::RolledBack => {
                return QueryOutcome::failure("transaction already finished");
            }
        }

        let statements = std::mem::take(&mut self.queue);
        for (index, statement) in statements.iter().enumerate() {
            let outcome = self.run_on_session(statement.sql()).await;
            if !outcome.success {
                let failure = QueryOutcome::failure(format!(
                    "statement {} of {} failed: {}",
                    index + 1,
                    statements.len(),
                    outcome.error_message().unwrap_or("unknown error"),
                ));
                self.remember_error(&failure);
                tracing::debug!(step = index + 1, "transaction statement failed, rolling back");
                self.rollback().await;
                return failure;
            }
        }

        let outcome = self.run_on_session("COMMIT").await;
        if outcome.success {
            self.state = TxState::Committed;
            self.last_error = None;
            self.release_session();
        } else {
            self.remember_error(&outcome);
            self.rollback().await;
        }
        outcome
    }

    /// Issue `ROLLBACK` and transition to RolledBack regardless of whether
    /// the rollback statement itself succeeds, since the session is no longer
    /// trustworthy for further transactional use. The queue is cleared and the
    /// session released either way.
    pub async fn rollback(&mut self) -> QueryOutcome {
        match self.state {
            TxState::Active => {}
            TxState::Idle => return QueryOutcome::failure("no active transaction to rollback"),
            TxState::Committed | TxState::RolledBack => {
                return QueryOutcome::failure("transaction already finished");
            }
        }

        let outcome = self.run_on_session("ROLLBACK").await;
        if !outcome.success {
            self.remember_error(&outcome);
        }
        self.state = TxState::RolledBack;
        self.queue.clear();
        self.release_session();
        outcome
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, TxState::Committed | TxState::RolledBack)
    }

    async fn run_on_session(&mut self, sql: &str) -> QueryOutcome {
        match self.session.as_mut() {
            Some(session) => session.run(sql).await,
            // Only reachable if the session was already released by a terminal
            // transition, which the state checks above rule out.
            None => QueryOutcome::failure("transaction session already released"),
        }
    }

    fn remember_error(&mut self, outcome: &QueryOutcome) {
        self.last_error = outcome.message.clone();
    }

    fn release_session(&mut self) {
        // Dropping the guard returns the lease to the write pool.
        self.session = None;
    }
}
