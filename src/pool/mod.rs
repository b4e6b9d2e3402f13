//! Role-tagged connection pools.
//!
//! Two independent instances exist per factory, write and read, each owning a
//! bounded set of sessions. Leasing is delegated entirely to the pool: a
//! session is lent to at most one caller at a time, callers suspend when all
//! sessions are lent at capacity, and every lease is returned exactly once via
//! the [`PooledSession`] guard, on every exit path.

mod manager;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use deadpool::managed::{Object, Pool, PoolError};
use tokio::sync::Notify;

use crate::error::SqlDispatchError;
use crate::results::QueryOutcome;
use crate::session::SessionFactory;
use crate::types::PoolRole;

pub use manager::SessionManager;

/// Lease bookkeeping shared between a pool and its outstanding guards.
///
/// Counts are only touched after a successful acquire and in the guard's drop,
/// so a caller cancelled while waiting on `acquire` leaves no phantom lease.
#[derive(Debug, Default)]
struct LeaseAccounting {
    active: AtomicUsize,
    granted: AtomicU64,
    released: Notify,
    closed: AtomicBool,
}

/// A bounded pool of sessions for one role.
#[derive(Clone)]
pub struct RolePool {
    pool: Pool<SessionManager>,
    role: PoolRole,
    capacity: usize,
    accounting: Arc<LeaseAccounting>,
}

impl std::fmt::Debug for RolePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolePool")
            .field("role", &self.role)
            .field("capacity", &self.capacity)
            .field("active_leases", &self.active_leases())
            .finish()
    }
}

impl RolePool {
    /// Build a pool of `capacity` sessions for `role`.
    ///
    /// Sessions are established lazily on first lease; `wait_timeout` bounds
    /// how long an `acquire` may suspend, and `recycle_after` bounds how long a
    /// session may sit idle before being retired on its next lease.
    ///
    /// # Errors
    /// Returns `ConfigError` if the pool cannot be constructed.
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        role: PoolRole,
        capacity: usize,
        wait_timeout: Duration,
        recycle_after: Duration,
    ) -> Result<Self, SqlDispatchError> {
        if capacity == 0 {
            return Err(SqlDispatchError::ConfigError(format!(
                "{role} pool capacity must be at least 1"
            )));
        }
        let manager = SessionManager::new(factory, role, recycle_after);
        let pool = Pool::builder(manager)
            .max_size(capacity)
            .wait_timeout(Some(wait_timeout))
            .create_timeout(Some(wait_timeout))
            .recycle_timeout(Some(wait_timeout))
            .runtime(deadpool::Runtime::Tokio1)
            .build()
            .map_err(|err| {
                SqlDispatchError::ConfigError(format!("failed to build {role} pool: {err}"))
            })?;

        Ok(Self {
            pool,
            role,
            capacity,
            accounting: Arc::new(LeaseAccounting::default()),
        })
    }

    pub fn role(&self) -> PoolRole {
        self.role
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Leases currently out.
    pub fn active_leases(&self) -> usize {
        self.accounting.active.load(Ordering::SeqCst)
    }

    /// Total leases granted over the pool's lifetime.
    pub fn leases_granted(&self) -> u64 {
        self.accounting.granted.load(Ordering::SeqCst)
    }

    /// Lease one session, suspending until one is available or capacity allows
    /// creating one.
    ///
    /// # Errors
    /// `Timeout` when no session frees up within the wait timeout, `PoolClosed`
    /// after `close`, or the session factory's error when establishing a new
    /// session fails.
    pub async fn acquire(&self) -> Result<PooledSession, SqlDispatchError> {
        let object = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(self.role, err))?;
        self.accounting.active.fetch_add(1, Ordering::SeqCst);
        self.accounting.granted.fetch_add(1, Ordering::SeqCst);
        Ok(PooledSession {
            object: Some(object),
            accounting: self.accounting.clone(),
        })
    }

    /// Ordered shutdown: stop accepting new leases, wait for every outstanding
    /// lease to be returned, then tear down the remaining sessions.
    ///
    /// # Errors
    /// `PoolClosed` if the pool was already closed.
    pub async fn close(&self) -> Result<(), SqlDispatchError> {
        if self.accounting.closed.swap(true, Ordering::SeqCst) {
            return Err(SqlDispatchError::PoolClosed(format!(
                "{} pool already closed",
                self.role
            )));
        }
        self.pool.close();
        loop {
            let released = self.accounting.released.notified();
            tokio::pin!(released);
            // Register for the wakeup before checking, so a release landing
            // between the check and the await is not missed.
            released.as_mut().enable();
            if self.accounting.active.load(Ordering::SeqCst) == 0 {
                break;
            }
            released.await;
        }
        tracing::debug!(role = %self.role, "pool closed");
        Ok(())
    }
}

/// RAII lease of one session. Dropping the guard returns the session to the
/// pool, including on error and cancellation paths.
pub struct PooledSession {
    // Taken in drop so the session is returned before the lease counts move.
    object: Option<Object<SessionManager>>,
    accounting: Arc<LeaseAccounting>,
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession").finish_non_exhaustive()
    }
}

impl PooledSession {
    /// Execute one statement on the leased session and normalize the response.
    ///
    /// Driver errors are converted to failure outcomes here; no raw driver
    /// error escapes past this boundary.
    pub async fn run(&mut self, sql: &str) -> QueryOutcome {
        let Some(object) = self.object.as_mut() else {
            return QueryOutcome::failure("session already returned to the pool");
        };
        match object.execute(sql).await {
            Ok(raw) => QueryOutcome::from_raw(raw),
            Err(err) => QueryOutcome::failure(err.to_string()),
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        // Return (or tear down) the session before updating the counts, so a
        // `close` observing zero leases knows the session's destruction ran.
        drop(self.object.take());
        self.accounting.active.fetch_sub(1, Ordering::SeqCst);
        self.accounting.released.notify_waiters();
    }
}

fn map_pool_error(
    role: PoolRole,
    err: PoolError<SqlDispatchError>,
) -> SqlDispatchError {
    match err {
        PoolError::Timeout(kind) => SqlDispatchError::Timeout(format!(
            "{role} pool lease timed out ({kind:?})"
        )),
        PoolError::Closed => {
            SqlDispatchError::PoolClosed(format!("{role} pool is closed"))
        }
        PoolError::Backend(inner) => inner,
        other => SqlDispatchError::ConnectionError(format!(
            "{role} pool lease failed: {other}"
        )),
    }
}
