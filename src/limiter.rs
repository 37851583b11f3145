use core::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Token bucket shared by every worker of a crawl.
///
/// The bucket starts full; it refills continuously at `rate` permits per
/// second and never holds more than `capacity` permits.
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<Bucket>,
}

impl TokenBucket {
    pub fn new(rate: f64, capacity: Option<f64>) -> Self {
        let rate = rate.max(0.01);
        let capacity = capacity.unwrap_or(rate).max(1.0);
        Self {
            rate,
            capacity,
            state: Mutex::new(Bucket {
                tokens: capacity,
                last: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Takes a permit if one is available, otherwise reports how long until
    /// the next one.
    fn take(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64((missing / self.rate).max(0.001)))
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.take().is_ok()
    }

    pub async fn acquire(&self) {
        while let Err(wait) = self.take() {
            tokio::time::sleep(wait).await;
        }
    }
}
