// Detection Throttle
// Enforces a minimum spacing between remote score requests.
// One instance is shared (Arc) by every caller path that issues score calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct DetectionThrottle {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl DetectionThrottle {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    /// Throttle that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Wait until the spacing since the previous request has elapsed, then
    /// record this request. Callers queue on the lock, so bursts are serialized.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_spacing {
                let wait = self.min_spacing - elapsed;
                debug!("[DETECTION] throttling remote score request for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let throttle = DetectionThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successive_calls_are_spaced() {
        let throttle = DetectionThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_between_tasks() {
        let throttle = Arc::new(DetectionThrottle::new(Duration::from_millis(500)));
        let start = Instant::now();
        let a = {
            let t = throttle.clone();
            tokio::spawn(async move { t.acquire().await })
        };
        let b = {
            let t = throttle.clone();
            tokio::spawn(async move { t.acquire().await })
        };
        a.await.unwrap();
        b.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_waits() {
        let throttle = DetectionThrottle::disabled();
        let start = Instant::now();
        for _ in 0..5 {
            throttle.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
