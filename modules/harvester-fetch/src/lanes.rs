//! Bounded-concurrency worker lanes and cooperative cancellation (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// Shared cancellation flag checked at every suspension point. Flipping it
/// does not abort in-flight work; callers observe it and wind down,
/// surfacing a terminal `interrupted` outcome rather than an error (§5).
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A named lane with a bounded worker pool (`search`, `fetch`, `parse`, `llm`).
pub struct Lane {
    name: &'static str,
    semaphore: Semaphore,
}

impl Lane {
    pub fn new(name: &'static str, concurrency: usize) -> Self {
        Self {
            name,
            semaphore: Semaphore::new(concurrency.max(1)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire a slot, yielding once admitted. Callers check `CancelToken`
    /// after acquiring (and before any suspension point) to honor cooperative
    /// cancellation even while queued.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("lane semaphore should never be closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn lane_limits_concurrent_holders() {
        let lane = Arc::new(Lane::new("fetch", 2));
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let lane = lane.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = lane.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn cancel_token_observed_after_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
