//! The execution core: pools + router + normalizer behind one entry point.
//!
//! A [`DbFactory`] is an explicitly constructed object with a two-phase
//! lifecycle: construct with a [`FactoryConfig`], then `initialize()` to
//! establish the write and read pools. Tests construct independent factories
//! with independent pools; there is no process-wide singleton.

mod audit;
mod config;

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;

use crate::error::SqlDispatchError;
use crate::pool::RolePool;
use crate::results::QueryOutcome;
use crate::router;
use crate::session::{PgSessionFactory, SessionFactory};
use crate::statement::CompiledStatement;
use crate::transaction::Transaction;
use crate::types::PoolRole;

pub use audit::{AuditEntry, AuditLog};
pub use config::FactoryConfig;

#[derive(Clone)]
struct PoolSet {
    write: RolePool,
    read: RolePool,
}

impl PoolSet {
    fn for_role(&self, role: PoolRole) -> &RolePool {
        match role {
            PoolRole::Write => &self.write,
            PoolRole::Read => &self.read,
        }
    }
}

/// The single entry point for running statements.
///
/// Owns the two connection pools, routes each statement to one of them, and
/// records an audit entry per call when debug mode is on.
pub struct DbFactory {
    config: FactoryConfig,
    sessions: Arc<dyn SessionFactory>,
    pools: RwLock<Option<PoolSet>>,
    // Serializes initialize/shutdown; execute reads `pools` without it.
    lifecycle: tokio::sync::Mutex<()>,
    audit: AuditLog,
}

impl std::fmt::Debug for DbFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbFactory")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl DbFactory {
    /// Construct a factory backed by the `tokio-postgres` driver.
    ///
    /// Pools are not established yet; call [`DbFactory::initialize`] next.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: FactoryConfig) -> Result<Self, SqlDispatchError> {
        config.validate()?;
        let sessions = Arc::new(PgSessionFactory::new(config.clone()));
        Self::with_session_factory(config, sessions)
    }

    /// Construct a factory over a custom session factory (used by tests to
    /// plug an in-memory driver).
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn with_session_factory(
        config: FactoryConfig,
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<Self, SqlDispatchError> {
        config.validate()?;
        Ok(Self {
            config,
            sessions,
            pools: RwLock::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            audit: AuditLog::default(),
        })
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.pools_snapshot().is_some()
    }

    #[must_use]
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Establish the write and read pools, validating each with one probe
    /// connection.
    ///
    /// # Errors
    /// `AlreadyInitialized` if pools exist. On partial failure (write pool
    /// established, read pool fails) the write pool is closed before the error
    /// propagates; no leaked pool survives a failed initialize.
    pub async fn initialize(&self) -> Result<(), SqlDispatchError> {
        let _guard = self.lifecycle.lock().await;
        if self.is_initialized() {
            return Err(SqlDispatchError::AlreadyInitialized(
                "pools already created".to_string(),
            ));
        }

        let write = self.build_pool(PoolRole::Write).await?;
        let read = match self.build_pool(PoolRole::Read).await {
            Ok(read) => read,
            Err(err) => {
                // Tear down the half-initialized state before reporting.
                if let Err(close_err) = write.close().await {
                    tracing::warn!(error = %close_err, "failed to close write pool after init failure");
                }
                return Err(err);
            }
        };

        let mut slot = self.pools_slot();
        *slot = Some(PoolSet { write, read });
        tracing::debug!("factory initialized");
        Ok(())
    }

    /// Classify, lease, run, normalize. The lease is returned on every exit
    /// path, including cancellation.
    ///
    /// Driver failures and pool wait timeouts surface as failure outcomes;
    /// `Err` is reserved for calling out of sequence.
    ///
    /// # Errors
    /// `NotInitialized` before `initialize()` or after `shutdown()`.
    pub async fn execute(&self, sql: &str) -> Result<QueryOutcome, SqlDispatchError> {
        let pools = self.pools()?;
        let route = router::classify(sql);
        let pool = pools.for_role(route);

        let started = Instant::now();
        let outcome = match pool.acquire().await {
            Ok(mut session) => session.run(sql).await,
            Err(err) => QueryOutcome::failure(err.to_string()),
        };
        let took = started.elapsed();

        tracing::debug!(
            route = %route,
            took_ms = took.as_millis() as u64,
            success = outcome.success,
            "executed statement"
        );
        if self.config.debug {
            self.audit.record(AuditEntry {
                statement: sql.to_string(),
                took_secs: took.as_secs_f64(),
                route,
                success: outcome.success,
                error: if outcome.success {
                    None
                } else {
                    outcome.message.clone()
                },
                recorded_at: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Lease one write session and start a transaction on it.
    ///
    /// # Errors
    /// `NotInitialized` if pools do not exist; pool lease errors; and
    /// `ExecutionError` if `START TRANSACTION` fails, in which case the lease
    /// is released back to the pool before the error propagates.
    pub async fn begin_transaction(&self) -> Result<Transaction, SqlDispatchError> {
        let pools = self.pools()?;
        let session = pools.write.acquire().await?;
        let mut tx = Transaction::new(session);
        let outcome = tx.begin().await;
        if !outcome.success {
            let message = outcome
                .error_message()
                .unwrap_or("unknown error")
                .to_string();
            // Dropping the transaction returns the lease to the write pool.
            drop(tx);
            return Err(SqlDispatchError::ExecutionError(format!(
                "failed to start transaction: {message}"
            )));
        }
        Ok(tx)
    }

    /// Begin, queue each statement, commit. Any per-statement failure rolls
    /// back and the outcome names the failing step; this never returns `Err`,
    /// since transactional failure is an ordinary, reportable outcome.
    pub async fn run_transaction<I, S>(&self, statements: I) -> QueryOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<CompiledStatement>,
    {
        let mut tx = match self.begin_transaction().await {
            Ok(tx) => tx,
            Err(err) => return QueryOutcome::failure(err.to_string()),
        };
        for statement in statements {
            if let Err(err) = tx.queue_statement(statement) {
                tx.rollback().await;
                return QueryOutcome::failure(err.to_string());
            }
        }
        tx.commit().await
    }

    /// Close both pools, waiting for outstanding leases to return. Calling it
    /// again is a no-op; subsequent `execute` calls fail with `NotInitialized`.
    ///
    /// # Errors
    /// Propagates pool close failures.
    pub async fn shutdown(&self) -> Result<(), SqlDispatchError> {
        let _guard = self.lifecycle.lock().await;
        let set = {
            let mut slot = self.pools_slot();
            slot.take()
        };
        let Some(set) = set else {
            return Ok(());
        };
        let write_result = set.write.close().await;
        let read_result = set.read.close().await;
        tracing::debug!("factory shut down");
        write_result.and(read_result)
    }

    /// Snapshot of the audit log (populated only when `config.debug` is set).
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.audit.snapshot()
    }

    /// Handle to one of the pools, e.g. to inspect lease counters. `None`
    /// before `initialize()` or after `shutdown()`.
    #[must_use]
    pub fn pool(&self, role: PoolRole) -> Option<RolePool> {
        self.pools_snapshot().map(|set| set.for_role(role).clone())
    }

    async fn build_pool(&self, role: PoolRole) -> Result<RolePool, SqlDispatchError> {
        let capacity = match role {
            PoolRole::Write => self.config.write_pool_size,
            PoolRole::Read => self.config.read_pool_size,
        };
        let pool = RolePool::new(
            self.sessions.clone(),
            role,
            capacity,
            self.config.timeout,
            self.config.recycle_after,
        )?;

        // Pools fill lazily; probe one session now so a bad endpoint fails
        // initialize() instead of the first execute().
        match pool.acquire().await {
            Ok(probe) => drop(probe),
            Err(err) => {
                if let Err(close_err) = pool.close().await {
                    tracing::warn!(error = %close_err, "failed to close {role} pool after probe failure");
                }
                return Err(err);
            }
        }
        Ok(pool)
    }

    fn pools(&self) -> Result<PoolSet, SqlDispatchError> {
        self.pools_snapshot().ok_or_else(|| {
            SqlDispatchError::NotInitialized("call initialize() before executing".to_string())
        })
    }

    fn pools_snapshot(&self) -> Option<PoolSet> {
        match self.pools.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn pools_slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<PoolSet>> {
        match self.pools.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
