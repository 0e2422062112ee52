use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default number of concurrently running transfer jobs.
pub const DEFAULT_WORKERS: usize = 12;

/// Bounded executor for publish, download and tier-sync jobs.
///
/// Jobs are spawned immediately but only start their work once one of the
/// pool's permits is free. A submitted job runs to its own completion even when
/// every caller has stopped waiting on its handle.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    handle:  Handle,
    permits: Arc<Semaphore>,
    size:    usize,
}

impl WorkerPool {
    pub fn new(handle: Handle, workers: usize) -> Self {
        let size = workers.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Pool bound to the runtime of the calling task, if there is one.
    pub fn try_current(workers: usize) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(handle, workers))
    }

    pub fn size(&self) -> usize { self.size }

    /// Permits not held by a running job.
    pub fn idle(&self) -> usize { self.permits.available_permits() }

    pub fn submit<F, T>(&self, job: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            // the semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            job.await
        })
    }

    /// Run blocking work (file copies, lock waits) under a pool permit.
    pub fn submit_blocking<F, T>(&self, job: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = self.handle.clone();
        self.handle.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            match handle.spawn_blocking(job).await {
                Ok(value) => value,
                Err(e) => match e.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    Err(e) => std::panic::panic_any(e.to_string()),
                },
            }
        })
    }
}
