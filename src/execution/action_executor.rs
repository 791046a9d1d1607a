use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::commands::CommandError;
use crate::context::ExecutionContext;

/// Runs prepared contexts forward (`commit`) or backward (`rollback`).
///
/// Both always return a context: failures are recorded on it, never raised.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn commit(&self, context: ExecutionContext) -> ExecutionContext;

    async fn rollback(&self, context: ExecutionContext) -> ExecutionContext;
}

/// Non-owning reference to an executor.
///
/// Composite commands live in the registry the executor owns, so they point back
/// at the executor weakly.
#[derive(Clone)]
pub struct ExecutorHandle {
    inner: Weak<dyn ActionExecutor>,
}

impl ExecutorHandle {
    pub fn new<E: ActionExecutor + 'static>(executor: &Arc<E>) -> Self {
        let weak: Weak<E> = Arc::downgrade(executor);
        Self { inner: weak }
    }

    pub fn from_dyn(executor: &Arc<dyn ActionExecutor>) -> Self {
        Self {
            inner: Arc::downgrade(executor),
        }
    }

    pub fn upgrade(&self) -> Result<Arc<dyn ActionExecutor>, CommandError> {
        self.inner
            .upgrade()
            .ok_or_else(|| CommandError::execution("action executor has been dropped"))
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
