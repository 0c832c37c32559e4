// ── Window aggregation ──

use crate::model::{UsageSnapshot, WindowSummary};

/// Summarize a time-ordered run of snapshots for one device.
///
/// Byte totals are last-minus-first of the cumulative counters (0 if the
/// counter went backwards). Latency averages only measured samples.
/// Returns `None` for an empty run.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn summarize_window(snapshots: &[UsageSnapshot]) -> Option<WindowSummary> {
    let first = snapshots.first()?;
    let last = snapshots.last()?;
    let count = snapshots.len() as f64;

    let sum_down: f64 = snapshots.iter().map(|s| s.download_speed).sum();
    let sum_up: f64 = snapshots.iter().map(|s| s.upload_speed).sum();
    let peak_down = snapshots.iter().map(|s| s.download_speed).fold(0.0, f64::max);
    let peak_up = snapshots.iter().map(|s| s.upload_speed).fold(0.0, f64::max);

    let measured: Vec<i64> = snapshots
        .iter()
        .map(|s| s.latency_ms)
        .filter(|l| *l >= 0)
        .collect();
    let avg_latency_ms = (!measured.is_empty())
        .then(|| measured.iter().sum::<i64>() as f64 / measured.len() as f64);

    Some(WindowSummary {
        samples: snapshots.len(),
        from: first.timestamp,
        to: last.timestamp,
        downloaded: last.rx_bytes.saturating_sub(first.rx_bytes),
        uploaded: last.tx_bytes.saturating_sub(first.tx_bytes),
        avg_download_speed: sum_down / count,
        avg_upload_speed: sum_up / count,
        peak_download_speed: peak_down,
        peak_upload_speed: peak_up,
        avg_latency_ms,
    })
}
