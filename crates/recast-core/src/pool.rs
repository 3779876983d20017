use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Caps how many generation sessions run at once. Within one session the
/// idea and artifact stages stay sequential; the pool only bounds
/// whole-session parallelism.
#[derive(Clone)]
pub struct GenerationPool {
    permits: Arc<Semaphore>,
}

impl GenerationPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run `fut` once a permit is free. Callers queue in FIFO order.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        // the semaphore is never closed, so acquire only fails if it were
        let _permit = self.permits.clone().acquire_owned().await.ok();
        fut.await
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
