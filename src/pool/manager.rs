use std::sync::Arc;
use std::time::Duration;

use deadpool::managed;

use crate::error::SqlDispatchError;
use crate::session::{SessionFactory, SqlSession};
use crate::types::PoolRole;

/// Creates and recycles sessions for one role's pool.
///
/// Recycling runs when an idle session is about to be lent out again: a session
/// idle past the recycle interval, or one reporting itself unhealthy, is
/// retired and replaced transparently to the caller. This absorbs server-side
/// expiry of long-idle connections.
pub struct SessionManager {
    factory: Arc<dyn SessionFactory>,
    role: PoolRole,
    recycle_after: Duration,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn SessionFactory>, role: PoolRole, recycle_after: Duration) -> Self {
        Self {
            factory,
            role,
            recycle_after,
        }
    }

    pub fn role(&self) -> PoolRole {
        self.role
    }
}

impl managed::Manager for SessionManager {
    type Type = Box<dyn SqlSession>;
    type Error = SqlDispatchError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        tracing::debug!(role = %self.role, "establishing new pooled session");
        self.factory.connect(self.role).await
    }

    async fn recycle(
        &self,
        session: &mut Self::Type,
        metrics: &managed::Metrics,
    ) -> managed::RecycleResult<Self::Error> {
        if metrics.last_used() > self.recycle_after {
            tracing::debug!(role = %self.role, "retiring session idle past recycle interval");
            return Err(managed::RecycleError::Message(
                "session idle past recycle interval".into(),
            ));
        }
        if !session.is_healthy() {
            tracing::debug!(role = %self.role, "retiring unhealthy session");
            return Err(managed::RecycleError::Message(
                "session no longer healthy".into(),
            ));
        }
        Ok(())
    }
}
