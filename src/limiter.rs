//! Bounded admission for page sessions.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Caps how many tasks run at once. Waiters are admitted in FIFO order.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Option<Arc<Semaphore>>,
}

impl ConcurrencyLimiter {
    /// `max_concurrent == 0` admits everything immediately.
    pub fn new(max_concurrent: usize) -> Self {
        let semaphore = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
        Self { semaphore }
    }

    pub fn is_bounded(&self) -> bool {
        self.semaphore.is_some()
    }

    /// Free slots, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Runs `task` once a slot is free. The slot is released when the task
    /// finishes, whatever its outcome.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = match &self.semaphore {
            // The semaphore is never closed, so acquisition only fails if that changes.
            Some(semaphore) => semaphore.acquire().await.ok(),
            None => None,
        };
        task.await
    }
}
