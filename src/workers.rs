//! Blocking worker pool for CPU-bound PDF processing
//!
//! Routes hand document work to this pool so that decode/encode-heavy
//! operations never stall request intake on the async runtime. The pool is
//! a fixed number of permits over `spawn_blocking`; a request runs to
//! completion once admitted and is never cancelled mid-flight.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Worker task panicked: {0}")]
    TaskPanicked(String),
}

/// Fixed-size pool of blocking workers, sized to available CPU cores by
/// default. Owned by `AppState` and passed explicitly to the routes that
/// need it.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        WorkerPool {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` on a blocking worker once a permit is available.
    pub async fn run<F, T>(&self, job: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::PoolClosed)?;

        task::spawn_blocking(move || {
            let result = job();
            drop(permit);
            result
        })
        .await
        .map_err(|e| WorkerError::TaskPanicked(e.to_string()))
    }
}
