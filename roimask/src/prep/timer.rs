use std::time::{Duration, Instant};

/// Accumulating wall-clock timer.
#[derive(Clone)]
pub struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// Creates a running timer.
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// Adds the time since creation or the previous call to the total.
    #[inline]
    pub fn elapsed(&mut self) {
        let now = Instant::now();
        self.consumed += now - self.since;
        self.since = now;
    }

    #[inline]
    pub fn get_total_ms(&self) -> u64 {
        self.consumed.as_millis() as u64
    }

    #[inline]
    pub fn get_total_secs(&self) -> f64 {
        self.consumed.as_secs_f64()
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AccTimer;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_intervals_accumulate_once() {
        let mut timer = AccTimer::new();
        sleep(Duration::from_millis(20));
        timer.elapsed();
        let first = timer.get_total_ms();
        assert!(first >= 20);
        timer.elapsed();
        assert!(timer.get_total_ms() < first + 20);
    }
}
