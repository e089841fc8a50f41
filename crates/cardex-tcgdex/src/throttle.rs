use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};

/// Cooperative pacing: a minimum interval between the starts of consecutive
/// calls.
///
/// The lock is held across the sleep, so concurrent callers queue up and
/// leave one interval apart. Share one `Throttle` (behind an `Arc`) between
/// everything that talks to the same upstream.
#[derive(Debug)]
pub struct Throttle {
  interval: Duration,
  last:     Mutex<Option<Instant>>,
}

impl Throttle {
  pub fn new(interval: Duration) -> Self {
    Self { interval, last: Mutex::new(None) }
  }

  /// Wait until a call may start, then record it as started.
  pub async fn wait(&self) {
    let mut last = self.last.lock().await;
    if let Some(prev) = *last {
      tokio::time::sleep_until(prev + self.interval).await;
    }
    *last = Some(Instant::now());
  }
}
