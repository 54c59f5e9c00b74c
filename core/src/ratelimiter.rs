//! Token-bucket pacing for launching per-target work.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Releases `per_sec` permits a second from a background task. The refill
/// task stops when the last clone is dropped.
pub struct RateLimiter {
    sem: Arc<Semaphore>,
    refill: Arc<RefillGuard>,
}

struct RefillGuard(JoinHandle<()>);

impl Drop for RefillGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        RateLimiter { sem: self.sem.clone(), refill: self.refill.clone() }
    }
}

impl RateLimiter {
    /// Must be called from within a tokio runtime.
    pub fn new(per_sec: u32) -> Self {
        let sem = Arc::new(Semaphore::new(0));
        let sem_bg = sem.clone();
        let interval_ms = u64::from(1000u32 / per_sec.clamp(1, 1000));
        let handle = tokio::spawn(async move {
            let mut t = tokio::time::interval(Duration::from_millis(interval_ms));
            t.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                t.tick().await;
                // keep at most one second of burst
                if sem_bg.available_permits() < per_sec as usize {
                    sem_bg.add_permits(1);
                }
            }
        });
        RateLimiter { sem, refill: Arc::new(RefillGuard(handle)) }
    }

    pub async fn acquire(&self) {
        if let Ok(permit) = self.sem.acquire().await {
            permit.forget();
        }
    }
}
