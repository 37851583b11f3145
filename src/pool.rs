use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::VecDeque;

use compact_str::{CompactString, format_compact};
use parking_lot::Mutex;

use crate::limiter::TokenBucket;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub done: usize,
    pub failed: usize,
}

/// Drains `items` with exactly `workers` concurrent workers.
///
/// Each worker pops the next item off a shared queue, waits for a permit from
/// `limiter` (when given) and runs `job` on it. A failed job is logged and
/// counted; the worker moves on to the next item.
pub async fn run<T, F, Fut>(
    items: Vec<T>,
    workers: usize,
    limiter: Option<&TokenBucket>,
    job: F,
) -> PoolStats
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let total = items.len();
    let queue = Mutex::new(VecDeque::from(items));
    let done = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let worker = |id: usize| {
        let (queue, done, failed, job) = (&queue, &done, &failed, &job);
        async move {
            let target = format_compact!("worker-{id}");
            loop {
                let Some(item) = queue.lock().pop_front() else {
                    break;
                };
                if let Some(limiter) = limiter {
                    limiter.acquire().await;
                }
                match job(item).await {
                    Ok(()) => {
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        if n % 50 == 0 {
                            log::info!(target: &target, "\x1b[36mprogress\x1b[0m {n}/{total}");
                        }
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        log::warn!(target: &target, "{e:#}");
                    }
                }
            }
            target
        }
    };

    let futs = (0..workers.max(1)).map(worker);
    let finished: Vec<CompactString> = futures_util::future::join_all(futs).await;
    tracing::debug!(target: "pool", "{} workers drained {total} items", finished.len());

    PoolStats {
        done: done.into_inner(),
        failed: failed.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;

    #[tokio::test]
    async fn bounded_and_exhaustive() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let seen = Mutex::new(Vec::new());

        let stats = run((0..40).collect(), 4, None, |i: u32| {
            let (in_flight, peak, seen) = (&in_flight, &peak, &seen);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                seen.lock().push(i);
                in_flight.fetch_sub(1, Ordering::SeqCst);
                if i % 10 == 9 {
                    anyhow::bail!("item {i} failed");
                }
                Ok(())
            }
        })
        .await;

        assert_eq!(stats, PoolStats { done: 36, failed: 4 });
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 2);
        let mut seen = seen.into_inner();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn limiter_gates_every_job() {
        let bucket = TokenBucket::new(0.01, Some(3.0));
        let stats = tokio::time::timeout(
            Duration::from_millis(500),
            run(vec![(); 3], 2, Some(&bucket), |()| async { Ok(()) }),
        )
        .await
        .unwrap();
        assert_eq!(stats.done, 3);
        assert!(!bucket.try_acquire());
    }
}
