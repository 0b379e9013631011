use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::error::UpstreamError;

/// Bounds in-flight upstream calls for one pipeline component.
///
/// Clones share the same permits, so every request served by a service
/// draws from the same pool.
#[derive(Debug, Clone)]
pub struct Throttle {
    name: String,
    semaphore: Arc<Semaphore>,
    call_timeout: Duration,
}

impl Throttle {
    pub fn new(name: &str, permits: usize, call_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
            call_timeout,
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a permit, then runs `call` under the per-call deadline
    pub async fn run<T, F>(&self, operation: &str, call: F) -> Result<T, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| UpstreamError::Connection(format!("{} throttle closed", self.name)))?;

        with_deadline(operation, self.call_timeout, call).await
    }
}

pub async fn with_deadline<T, F>(operation: &str, deadline: Duration, call: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout {
            operation: operation.to_string(),
            millis: deadline.as_millis() as u64,
        }),
    }
}

/// Sleeps unless the pause is zero
pub async fn pause(millis: u64) {
    if millis > 0 {
        sleep(Duration::from_millis(millis)).await;
    }
}

/// Delay between fetch groups, growing with the records fetched so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub base_ms: u64,
    pub records_per_ms: u64,
    pub max_extra_ms: u64,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            base_ms: 200,
            records_per_ms: 100,
            max_extra_ms: 300,
        }
    }
}

impl DelayPolicy {
    pub fn none() -> Self {
        Self {
            base_ms: 0,
            records_per_ms: 100,
            max_extra_ms: 0,
        }
    }

    pub fn delay_ms(&self, records_so_far: usize) -> u64 {
        let extra = (records_so_far as u64)
            .checked_div(self.records_per_ms)
            .unwrap_or(0)
            .min(self.max_extra_ms);
        self.base_ms + extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_adaptive_delay() {
        let policy = DelayPolicy::default();
        assert_eq!(policy.delay_ms(0), 200);
        assert_eq!(policy.delay_ms(1_000), 210);
        assert_eq!(policy.delay_ms(3_000), 230);
        assert_eq!(policy.delay_ms(100_000), 500);
        assert_eq!(DelayPolicy::none().delay_ms(50_000), 0);
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: Result<(), UpstreamError> = with_deadline("slow_call", Duration::from_millis(10), async {
            sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(UpstreamError::Timeout { operation, millis }) => {
                assert_eq!(operation, "slow_call");
                assert_eq!(millis, 10);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_throttle_bounds_concurrency() {
        let throttle = Throttle::new("test", 2, Duration::from_secs(5));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let calls = (0..6).map(|_| {
            let throttle = throttle.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                throttle
                    .run("slow_call", async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(20)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, UpstreamError>(())
                    })
                    .await
            }
        });

        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(throttle.available(), 2);
    }
}
