// ── Throughput math ──
//
// Pure functions over counter pairs: raw rate, EMA smoothing, decay for
// unreliable intervals, and the noise floor.

use std::time::Duration;

/// Tunables for speed derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedPolicy {
    /// EMA weight of the newest raw sample.
    pub alpha: f64,
    /// Multiplier applied to the last reported speed when Δt is out of range.
    pub decay: f64,
    /// Smoothed speeds below this many bytes/sec report as 0.
    pub noise_floor: f64,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            decay: 0.7,
            noise_floor: 100.0,
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
        }
    }
}

impl SpeedPolicy {
    /// Whether counters `elapsed_secs` apart give a trustworthy rate.
    pub fn interval_is_valid(&self, elapsed_secs: f64) -> bool {
        elapsed_secs >= self.min_interval.as_secs_f64()
            && elapsed_secs <= self.max_interval.as_secs_f64()
    }

    /// `alpha * raw + (1 - alpha) * previous`, or `raw` when there is no
    /// previous smoothed value. Noise floor applied.
    pub fn smooth(&self, previous: Option<f64>, raw: f64) -> f64 {
        let smoothed = match previous {
            Some(prev) => self.alpha * raw + (1.0 - self.alpha) * prev,
            None => raw,
        };
        self.apply_floor(smoothed)
    }

    /// Fade the previously reported speed. Noise floor applied.
    pub fn decay(&self, previous: f64) -> f64 {
        self.apply_floor(previous * self.decay)
    }

    pub fn apply_floor(&self, speed: f64) -> f64 {
        if speed < self.noise_floor { 0.0 } else { speed }
    }
}

/// Bytes/sec between two cumulative counter readings.
///
/// A counter that went backwards (reset or reconnect) yields 0.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn raw_speed(previous: u64, current: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / elapsed_secs
}
