//! Dispersion measures over a batch of round-trip times.
//!
//! All arithmetic runs on `f64` nanoseconds. Degenerate batches never divide by
//! zero: an empty batch reports every measure as zero, and a single sample
//! reports both standard deviations as zero.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ping::ProbeStatistics;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Immutable result of one completed jitter run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JitterStatistics {
    host: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rtts: Vec<Duration>,
    mean: Duration,
    squared_deviation: f64,
    uncorrected_sd: Duration,
    corrected_sd: Duration,
    rtt_range: Duration,
    probe_statistics: ProbeStatistics,
}

impl JitterStatistics {
    pub fn compute(
        host: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        probe_statistics: ProbeStatistics,
    ) -> Self {
        let rtts = probe_statistics.rtts.clone();

        Self {
            host: host.into(),
            start,
            end,
            mean: to_duration(average_nanos(&rtts)),
            squared_deviation: squared_deviation(&rtts),
            uncorrected_sd: to_duration(uncorrected_deviation(&rtts)),
            corrected_sd: to_duration(corrected_deviation(&rtts)),
            rtt_range: rtt_range(&rtts),
            rtts,
            probe_statistics,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Captured round-trip times in arrival order.
    pub fn rtts(&self) -> &[Duration] {
        &self.rtts
    }

    pub fn mean(&self) -> Duration {
        self.mean
    }

    /// Sum of squared deviations from the mean, in nanoseconds squared.
    pub fn squared_deviation(&self) -> f64 {
        self.squared_deviation
    }

    pub fn squared_deviation_ms2(&self) -> f64 {
        self.squared_deviation / (NANOS_PER_MILLI * NANOS_PER_MILLI)
    }

    /// Population standard deviation.
    pub fn uncorrected_sd(&self) -> Duration {
        self.uncorrected_sd
    }

    /// Sample standard deviation (Bessel's correction).
    pub fn corrected_sd(&self) -> Duration {
        self.corrected_sd
    }

    pub fn rtt_range(&self) -> Duration {
        self.rtt_range
    }

    pub fn mean_ms(&self) -> f64 {
        as_millis_f64(self.mean)
    }

    pub fn uncorrected_sd_ms(&self) -> f64 {
        as_millis_f64(self.uncorrected_sd)
    }

    pub fn corrected_sd_ms(&self) -> f64 {
        as_millis_f64(self.corrected_sd)
    }

    pub fn rtt_range_ms(&self) -> f64 {
        as_millis_f64(self.rtt_range)
    }

    pub fn rtts_ms(&self) -> Vec<f64> {
        self.rtts.iter().copied().map(as_millis_f64).collect()
    }

    pub fn probe_statistics(&self) -> &ProbeStatistics {
        &self.probe_statistics
    }

    pub fn packet_loss(&self) -> f64 {
        self.probe_statistics.packet_loss()
    }
}

fn as_millis_f64(value: Duration) -> f64 {
    value.as_nanos() as f64 / NANOS_PER_MILLI
}

fn to_duration(nanos: f64) -> Duration {
    if nanos.is_finite() && nanos > 0.0 {
        Duration::from_nanos(nanos.round() as u64)
    } else {
        Duration::ZERO
    }
}

/// Mean in nanoseconds, zero for an empty batch.
pub fn average_nanos(values: &[Duration]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let total: f64 = values.iter().map(|v| v.as_nanos() as f64).sum();
    total / values.len() as f64
}

/// Sum of `(x - mean)^2` in nanoseconds squared.
pub fn squared_deviation(values: &[Duration]) -> f64 {
    let avg = average_nanos(values);
    values
        .iter()
        .map(|v| (v.as_nanos() as f64 - avg).powi(2))
        .sum()
}

/// `sqrt(sd / n)` in nanoseconds.
pub fn uncorrected_deviation(values: &[Duration]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (squared_deviation(values) / values.len() as f64).sqrt()
}

/// `sqrt(sd / (n - 1))` in nanoseconds, zero when `n <= 1`.
pub fn corrected_deviation(values: &[Duration]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    (squared_deviation(values) / (values.len() - 1) as f64).sqrt()
}

pub fn rtt_range(values: &[Duration]) -> Duration {
    if values.len() <= 1 {
        return Duration::ZERO;
    }
    let min = values.iter().min().copied().unwrap_or_default();
    let max = values.iter().max().copied().unwrap_or_default();
    max - min
}
