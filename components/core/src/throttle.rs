use log::debug;
use std::time::Duration;
use tokio::time::Instant;

/// Rate limiting guard for polled data sources.
///
/// Owned by whatever performs the expensive call. `check()` answers whether
/// the minimum interval since the last permitted call has elapsed and arms
/// the guard when it has, so multiple sensors sharing one data source end up
/// with a single network request per window.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last: None,
        }
    }

    /// Returns true if the caller may proceed. The first call always passes.
    pub fn check(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => {
                debug!(
                    "Throttled, {:?} left in the current window",
                    self.interval - now.duration_since(last)
                );
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
