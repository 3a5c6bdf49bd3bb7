use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Global gate in front of the market-data provider.
///
/// A token bucket of size one: the single token is held for the whole request
/// and refills `min_interval` after the previous request started.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

/// Held while a provider request is in flight.
pub struct Permit<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) -> Permit<'_> {
        let mut last_start = self.last_start.lock().await;

        if let Some(prev) = *last_start {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                let wait = ready_at - Instant::now();
                debug!(wait_ms = wait.as_millis() as u64, "throttling provider call");
                sleep_until(ready_at).await;
            }
        }

        *last_start = Some(Instant::now());
        Permit {
            _guard: last_start,
        }
    }
}
