//! Throughput telemetry from a sliding window of cumulative byte counts.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::DEFAULT_RATE_WINDOW_SECS;

#[derive(Debug, Clone, Copy)]
struct RateSample {
    timestamp: Instant,
    bytes: u64,
}

/// Derives bytes/second from `(timestamp, cumulative bytes)` samples.
///
/// The speed is never stored; it is recomputed from the oldest and newest
/// retained samples, so it cannot drift from the counters it describes.
#[derive(Debug)]
pub struct RateSampler {
    samples: VecDeque<RateSample>,
    window: Duration,
}

impl Default for RateSampler {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_RATE_WINDOW_SECS))
    }
}

impl RateSampler {
    /// Creates a sampler retaining `window` worth of history.
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    /// Records the cumulative byte count observed at `now`.
    ///
    /// Samples older than the window (relative to `now`) are pruned. The
    /// sample exactly `window` old is kept so a full window is covered.
    pub fn record(&mut self, now: Instant, bytes: u64) {
        self.samples.push_back(RateSample {
            timestamp: now,
            bytes,
        });

        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(oldest.timestamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns the average speed in bytes/second across the window.
    ///
    /// Returns 0.0 with fewer than two samples or a zero time span.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };

        let elapsed = last.timestamp.saturating_duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        last.bytes.saturating_sub(first.bytes) as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to move `remaining_bytes`.
    ///
    /// Returns `None` while the speed is zero, or when the estimate does
    /// not fit in a `Duration`.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining_bytes as f64 / speed).ok()
    }

    /// Drops all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn no_samples_is_zero() {
        let rate = RateSampler::default();
        assert_eq!(rate.bytes_per_second(), 0.0);
        assert!(rate.eta(1000).is_none());
    }

    #[test]
    fn single_sample_is_zero() {
        let mut rate = RateSampler::default();
        rate.record(Instant::now(), 100);
        assert_eq!(rate.bytes_per_second(), 0.0);
    }

    #[test]
    fn zero_span_is_zero() {
        let mut rate = RateSampler::default();
        let now = Instant::now();
        rate.record(now, 0);
        rate.record(now, 4096);
        assert_eq!(rate.bytes_per_second(), 0.0);
    }

    #[test]
    fn averages_across_the_whole_window() {
        let mut rate = RateSampler::new(secs(5));
        let t0 = Instant::now();
        rate.record(t0, 0);
        rate.record(t0 + secs(1), 1000);
        rate.record(t0 + secs(2), 3000);

        assert!((rate.bytes_per_second() - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prunes_samples_outside_the_window() {
        let mut rate = RateSampler::new(secs(2));
        let t0 = Instant::now();
        rate.record(t0, 0);
        rate.record(t0 + secs(1), 10_000);
        rate.record(t0 + secs(2), 11_000);
        rate.record(t0 + secs(3), 12_000);

        // t0 fell out; the window is now [1s, 3s].
        assert_eq!(rate.len(), 3);
        assert!((rate.bytes_per_second() - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn eta_uses_current_speed() {
        let mut rate = RateSampler::new(secs(5));
        let t0 = Instant::now();
        rate.record(t0, 0);
        rate.record(t0 + secs(2), 2000);

        let eta = rate.eta(5000).unwrap();
        assert_eq!(eta, secs(5));
    }

    #[test]
    fn eta_beyond_duration_range_is_unknown() {
        let mut rate = RateSampler::new(secs(10));
        let t0 = Instant::now();
        rate.record(t0, 0);
        rate.record(t0 + secs(5), 1);

        assert!(rate.bytes_per_second() < 1.0);
        assert!(rate.eta(u64::MAX).is_none());
        assert!(rate.eta(10).is_some());
    }

    #[test]
    fn reset_clears_history() {
        let mut rate = RateSampler::default();
        let t0 = Instant::now();
        rate.record(t0, 0);
        rate.record(t0 + secs(1), 500);
        rate.reset();
        assert!(rate.is_empty());
        assert_eq!(rate.bytes_per_second(), 0.0);
    }
}
