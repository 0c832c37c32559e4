// ── Metric engine ──
//
// Keyed state store (MAC -> last sample, smoothed speeds, last reported
// stats). Each per-MAC update runs under the DashMap shard lock for that
// key, so overlapping poll cycles read-modify-write one entry at a time.
// A sample older than the stored one is ignored: later timestamps win.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use mifimon_api::RawDeviceRecord;

use super::speed::{SpeedPolicy, raw_speed};
use crate::model::{DeviceKind, DeviceSample, DeviceStats, MacAddress};

/// A parsed record plus the hostname resolved for it.
#[derive(Debug, Clone)]
pub struct Observation {
    pub record: RawDeviceRecord,
    pub hostname: String,
}

impl Observation {
    pub fn new(record: RawDeviceRecord, hostname: Option<&str>) -> Self {
        let hostname = hostname
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map_or_else(|| format!("Device {}", record.slot), str::to_owned);
        Self { record, hostname }
    }
}

/// Counter movement of one present device since its previous sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDelta {
    pub mac: MacAddress,
    pub hostname: String,
    pub delta_rx: u64,
    pub delta_tx: u64,
    /// Time since the previous sample; zero on first sighting.
    pub elapsed: chrono::Duration,
}

/// Result of one ingest pass.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Connected devices in reply order, then one final record per
    /// device that vanished this cycle.
    pub devices: Vec<DeviceStats>,
    /// One entry per present device, stale samples excluded.
    pub deltas: Vec<DeviceDelta>,
    /// Sum of positive download counter deltas across connected devices.
    pub delta_rx: u64,
    /// Sum of positive upload counter deltas across connected devices.
    pub delta_tx: u64,
}

impl CycleReport {
    pub fn connected(&self) -> impl Iterator<Item = &DeviceStats> {
        self.devices.iter().filter(|d| d.is_connected)
    }

    pub fn total_download_speed(&self) -> f64 {
        self.connected().map(|d| d.download_speed).sum()
    }

    pub fn total_upload_speed(&self) -> f64 {
        self.connected().map(|d| d.upload_speed).sum()
    }
}

struct TrackState {
    last: DeviceSample,
    smoothed_down: Option<f64>,
    smoothed_up: Option<f64>,
    stats: DeviceStats,
}

pub struct MetricEngine {
    policy: SpeedPolicy,
    tracked: DashMap<MacAddress, TrackState>,
}

impl MetricEngine {
    pub fn new(policy: SpeedPolicy) -> Self {
        Self {
            policy,
            tracked: DashMap::new(),
        }
    }

    /// Number of MACs currently tracked.
    pub fn tracked(&self) -> usize {
        self.tracked.len()
    }

    /// Feed one poll cycle's observations taken at `at`.
    pub fn ingest(&self, observations: &[Observation], latency_ms: i64, at: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        let mut present = HashSet::with_capacity(observations.len());

        for obs in observations {
            let mac = MacAddress::new(&obs.record.mac);
            present.insert(mac.clone());
            let (stats, delta) = self.observe(mac, obs, latency_ms, at);
            if let Some(delta) = delta {
                report.delta_rx = report.delta_rx.saturating_add(delta.delta_rx);
                report.delta_tx = report.delta_tx.saturating_add(delta.delta_tx);
                report.deltas.push(delta);
            }
            report.devices.push(stats);
        }

        report.devices.extend(self.sweep_missing(&present, at));
        report
    }

    fn observe(
        &self,
        mac: MacAddress,
        obs: &Observation,
        latency_ms: i64,
        at: DateTime<Utc>,
    ) -> (DeviceStats, Option<DeviceDelta>) {
        let record = &obs.record;
        let sample = DeviceSample {
            rx_bytes: record.rx_bytes,
            tx_bytes: record.tx_bytes,
            timestamp: at,
        };

        match self.tracked.entry(mac) {
            Entry::Vacant(slot) => {
                debug!(mac = %slot.key(), slot = record.slot, "tracking new device");
                let stats = build_stats(slot.key().clone(), obs, 0.0, 0.0, latency_ms, at);
                slot.insert(TrackState {
                    last: sample,
                    smoothed_down: None,
                    smoothed_up: None,
                    stats: stats.clone(),
                });
                let delta = DeviceDelta {
                    mac: stats.mac.clone(),
                    hostname: stats.hostname.clone(),
                    delta_rx: 0,
                    delta_tx: 0,
                    elapsed: chrono::Duration::zero(),
                };
                (stats, Some(delta))
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                if at < state.last.timestamp {
                    debug!(mac = %state.stats.mac, "ignoring sample older than stored state");
                    return (state.stats.clone(), None);
                }

                let since_last = at - state.last.timestamp;
                #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
                let elapsed = since_last.num_milliseconds() as f64 / 1000.0;

                let (down, up) = if self.policy.interval_is_valid(elapsed) {
                    let raw_down = raw_speed(state.last.rx_bytes, sample.rx_bytes, elapsed);
                    let raw_up = raw_speed(state.last.tx_bytes, sample.tx_bytes, elapsed);
                    (
                        self.policy.smooth(state.smoothed_down, raw_down),
                        self.policy.smooth(state.smoothed_up, raw_up),
                    )
                } else {
                    debug!(mac = %state.stats.mac, elapsed, "interval out of range, decaying");
                    (
                        self.policy.decay(state.stats.download_speed),
                        self.policy.decay(state.stats.upload_speed),
                    )
                };

                let delta_rx = sample.rx_bytes.saturating_sub(state.last.rx_bytes);
                let delta_tx = sample.tx_bytes.saturating_sub(state.last.tx_bytes);

                let stats = build_stats(state.stats.mac.clone(), obs, down, up, latency_ms, at);
                state.last = sample;
                state.smoothed_down = Some(down);
                state.smoothed_up = Some(up);
                state.stats = stats.clone();
                let delta = DeviceDelta {
                    mac: stats.mac.clone(),
                    hostname: stats.hostname.clone(),
                    delta_rx,
                    delta_tx,
                    elapsed: since_last,
                };
                (stats, Some(delta))
            }
        }
    }

    /// Emit one disconnected record per tracked MAC absent from `present`
    /// and stop tracking it.
    fn sweep_missing(&self, present: &HashSet<MacAddress>, at: DateTime<Utc>) -> Vec<DeviceStats> {
        let missing: Vec<MacAddress> = self
            .tracked
            .iter()
            .filter(|entry| !present.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        missing
            .into_iter()
            .filter_map(|mac| {
                self.tracked
                    .remove_if(&mac, |_, state| state.last.timestamp < at)
                    .map(|(mac, state)| {
                        info!(%mac, hostname = %state.stats.hostname, "device disconnected");
                        state.stats.into_disconnected(at)
                    })
            })
            .collect()
    }
}

fn build_stats(
    mac: MacAddress,
    obs: &Observation,
    download_speed: f64,
    upload_speed: f64,
    latency_ms: i64,
    at: DateTime<Utc>,
) -> DeviceStats {
    DeviceStats {
        kind: DeviceKind::classify(&obs.hostname, &mac),
        mac,
        hostname: obs.hostname.clone(),
        ip: obs.record.ip,
        slot: Some(obs.record.slot),
        rx_bytes: obs.record.rx_bytes,
        tx_bytes: obs.record.tx_bytes,
        download_speed,
        upload_speed,
        latency_ms,
        last_update: at,
        is_connected: true,
        connected_secs: Some(obs.record.connected_secs),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    const MAC_A: &str = "aa:aa:aa:aa:aa:aa";
    const MAC_B: &str = "bb:bb:bb:bb:bb:bb";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 27, 18, 0, 0).unwrap()
    }

    fn obs(mac: &str, rx: u64, tx: u64) -> Observation {
        Observation::new(
            RawDeviceRecord {
                mac: mac.into(),
                ip: None,
                rx_bytes: rx,
                tx_bytes: tx,
                connected_secs: 60,
                slot: 1,
            },
            None,
        )
    }

    fn engine() -> MetricEngine {
        MetricEngine::new(SpeedPolicy::default())
    }

    fn only(report: &CycleReport) -> &DeviceStats {
        assert_eq!(report.devices.len(), 1);
        &report.devices[0]
    }

    #[test]
    fn first_poll_reports_zero_speed() {
        let e = engine();
        let r = e.ingest(&[obs(MAC_A, 1_000, 500)], 12, t0());
        let d = only(&r);
        assert_eq!((d.download_speed, d.upload_speed), (0.0, 0.0));
        assert!(d.is_connected);
        assert_eq!(d.latency_ms, 12);
        assert_eq!(d.hostname, "Device 1");
    }

    #[test]
    fn second_poll_uses_raw_speed_then_smooths() {
        let e = engine();
        e.ingest(&[obs(MAC_A, 0, 0)], 0, t0());

        // 10_000 bytes in 2s -> raw 5000, no smoothed history -> 5000
        let r = e.ingest(&[obs(MAC_A, 10_000, 2_000)], 0, t0() + Duration::seconds(2));
        let d = only(&r);
        assert_eq!(d.download_speed, 5_000.0);
        assert_eq!(d.upload_speed, 1_000.0);
        assert_eq!((r.delta_rx, r.delta_tx), (10_000, 2_000));

        // raw 1000 -> 0.4 * 1000 + 0.6 * 5000 = 3400
        let r = e.ingest(&[obs(MAC_A, 12_000, 2_000)], 0, t0() + Duration::seconds(4));
        let d = only(&r);
        assert!((d.download_speed - 3_400.0).abs() < 1e-9);
        // raw 0 -> 0.6 * 1000 = 600
        assert!((d.upload_speed - 600.0).abs() < 1e-9);
    }

    #[test]
    fn deltas_carry_elapsed_time_per_device() {
        let e = engine();
        let r = e.ingest(&[obs(MAC_A, 0, 0)], 0, t0());
        assert_eq!(r.deltas.len(), 1);
        assert_eq!(r.deltas[0].elapsed, Duration::zero());

        let r = e.ingest(
            &[obs(MAC_A, 3_000, 100), obs(MAC_B, 7, 7)],
            0,
            t0() + Duration::milliseconds(2_500),
        );
        let a = r.deltas.iter().find(|d| d.mac.as_str() == MAC_A).unwrap();
        assert_eq!((a.delta_rx, a.delta_tx), (3_000, 100));
        assert_eq!(a.elapsed, Duration::milliseconds(2_500));
        let b = r.deltas.iter().find(|d| d.mac.as_str() == MAC_B).unwrap();
        assert_eq!((b.delta_rx, b.elapsed), (0, Duration::zero()));

        // Stale sample: no delta at all.
        let r = e.ingest(&[obs(MAC_A, 1, 0)], 0, t0() + Duration::seconds(1));
        assert!(r.deltas.is_empty());
    }

    #[test]
    fn counter_reset_reads_as_zero_rate() {
        let e = engine();
        e.ingest(&[obs(MAC_A, 0, 0)], 0, t0());
        e.ingest(&[obs(MAC_A, 4_000, 0)], 0, t0() + Duration::seconds(2));

        let r = e.ingest(&[obs(MAC_A, 10, 0)], 0, t0() + Duration::seconds(4));
        let d = only(&r);
        // 0.4 * 0 + 0.6 * 2000
        assert!((d.download_speed - 1_200.0).abs() < 1e-9);
        assert_eq!(r.delta_rx, 0);
    }

    #[test]
    fn out_of_range_interval_decays_previous_speed() {
        let e = engine();
        e.ingest(&[obs(MAC_A, 0, 0)], 0, t0());
        e.ingest(&[obs(MAC_A, 20_000, 0)], 0, t0() + Duration::seconds(2));

        // 30s gap: decay 10_000 -> 7_000 regardless of counters
        let r = e.ingest(&[obs(MAC_A, 9_999_999, 0)], 0, t0() + Duration::seconds(32));
        assert!((only(&r).download_speed - 7_000.0).abs() < 1e-9);

        // 100ms later: still out of range -> 4_900
        let at = t0() + Duration::seconds(32) + Duration::milliseconds(100);
        let r = e.ingest(&[obs(MAC_A, 9_999_999, 0)], 0, at);
        assert!((only(&r).download_speed - 4_900.0).abs() < 1e-9);
    }

    #[test]
    fn stale_sample_does_not_touch_state() {
        let e = engine();
        e.ingest(&[obs(MAC_A, 0, 0)], 0, t0());
        e.ingest(&[obs(MAC_A, 10_000, 0)], 0, t0() + Duration::seconds(2));

        let r = e.ingest(&[obs(MAC_A, 1, 0)], 0, t0() + Duration::seconds(1));
        assert_eq!(only(&r).rx_bytes, 10_000);
        assert_eq!(only(&r).download_speed, 5_000.0);
    }

    #[test]
    fn disappearing_device_is_reported_once() {
        let e = engine();
        e.ingest(&[obs(MAC_A, 100, 100), obs(MAC_B, 5, 5)], 30, t0());
        e.ingest(
            &[obs(MAC_A, 9_100, 100), obs(MAC_B, 5, 5)],
            30,
            t0() + Duration::seconds(2),
        );

        // N+1: B missing -> one final record
        let r = e.ingest(&[obs(MAC_A, 9_100, 100)], 30, t0() + Duration::seconds(4));
        assert_eq!(r.devices.len(), 2);
        let gone = r.devices.iter().find(|d| d.mac.as_str() == MAC_B).unwrap();
        assert!(!gone.is_connected);
        assert_eq!((gone.download_speed, gone.upload_speed, gone.latency_ms), (0.0, 0.0, 0));
        assert_eq!(gone.last_update, t0() + Duration::seconds(4));
        assert_eq!(e.tracked(), 1);

        // N+2: still missing -> nothing
        let r = e.ingest(&[obs(MAC_A, 9_100, 100)], 30, t0() + Duration::seconds(6));
        assert!(r.devices.iter().all(|d| d.mac.as_str() != MAC_B));
    }

    #[test]
    fn reappearing_device_starts_fresh() {
        let e = engine();
        e.ingest(&[obs(MAC_A, 0, 0)], 0, t0());
        e.ingest(&[obs(MAC_A, 20_000, 0)], 0, t0() + Duration::seconds(2));
        e.ingest(&[], 0, t0() + Duration::seconds(4));

        let r = e.ingest(&[obs(MAC_A, 40_000, 0)], 0, t0() + Duration::seconds(6));
        assert_eq!(only(&r).download_speed, 0.0);
    }

    #[test]
    fn mac_identity_is_case_insensitive() {
        let e = engine();
        e.ingest(&[obs("AA:AA:AA:AA:AA:AA", 0, 0)], 0, t0());
        let r = e.ingest(&[obs(MAC_A, 2_000, 0)], 0, t0() + Duration::seconds(2));
        assert_eq!(r.devices.len(), 1);
        assert_eq!(only(&r).download_speed, 1_000.0);
    }

    #[test]
    fn hostname_drives_classification() {
        let mut o = obs(MAC_A, 0, 0);
        o.hostname = "Pixel-8".into();
        let r = engine().ingest(&[o], 0, t0());
        assert_eq!(only(&r).kind, DeviceKind::Android);
    }

    #[test]
    fn placeholder_hostname_classifies_by_vendor() {
        let r = engine().ingest(&[obs("DC:A6:32:00:11:22", 0, 0)], 0, t0());
        assert_eq!(only(&r).hostname, "Device 1");
        assert_eq!(only(&r).kind, DeviceKind::Computer);
    }
}
