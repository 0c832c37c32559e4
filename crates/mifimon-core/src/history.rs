// ── Usage history ──
//
// Contract for the append-only store that keeps per-device snapshots and
// the latest period totals, plus an in-memory implementation.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::model::{MacAddress, UsagePeriod, UsageSnapshot};

/// Persistence seam for usage data.
///
/// Implementations must return `snapshots` ordered by timestamp.
pub trait HistoryStore: Send + Sync {
    fn append(&self, mac: &MacAddress, snapshot: UsageSnapshot);

    /// Snapshots for `mac` with `from <= timestamp < to`.
    fn snapshots(&self, mac: &MacAddress, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<UsageSnapshot>;

    /// Every MAC with at least one stored snapshot.
    fn macs(&self) -> Vec<MacAddress>;

    /// Drop snapshots that fell out of retention as of `now`, forgetting
    /// MACs left without any.
    fn prune(&self, now: DateTime<Utc>);

    fn save_period(&self, period: UsagePeriod);

    fn load_period(&self) -> Option<UsagePeriod>;

    /// Receiver of the latest saved period.
    fn subscribe(&self) -> watch::Receiver<Option<Arc<UsagePeriod>>>;
}

/// Process-local history with a retention horizon.
pub struct MemoryHistory {
    retention: chrono::Duration,
    series: DashMap<MacAddress, VecDeque<UsageSnapshot>>,
    period: watch::Sender<Option<Arc<UsagePeriod>>>,
}

impl MemoryHistory {
    pub fn new(retention: std::time::Duration) -> Self {
        let (period, _) = watch::channel(None);
        Self {
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
            series: DashMap::new(),
            period,
        }
    }

    pub fn len(&self, mac: &MacAddress) -> usize {
        self.series.get(mac).map_or(0, |s| s.len())
    }

    fn trim(&self, series: &mut VecDeque<UsageSnapshot>, newest: DateTime<Utc>) {
        if let Some(horizon) = newest.checked_sub_signed(self.retention) {
            while series.front().is_some_and(|s| s.timestamp < horizon) {
                series.pop_front();
            }
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, mac: &MacAddress, snapshot: UsageSnapshot) {
        let mut series = self.series.entry(mac.clone()).or_default();

        // Overlapping cycles can finish out of order; keep the series sorted.
        let pos = series.partition_point(|s| s.timestamp <= snapshot.timestamp);
        series.insert(pos, snapshot);

        let newest = series.back().map_or(snapshot.timestamp, |s| s.timestamp);
        self.trim(&mut series, newest);
    }

    fn snapshots(&self, mac: &MacAddress, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<UsageSnapshot> {
        self.series
            .get(mac)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp >= from && s.timestamp < to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn macs(&self) -> Vec<MacAddress> {
        let mut macs: Vec<MacAddress> = self.series.iter().map(|r| r.key().clone()).collect();
        macs.sort();
        macs
    }

    fn prune(&self, now: DateTime<Utc>) {
        self.series.retain(|mac, series| {
            self.trim(series, now);
            if series.is_empty() {
                debug!(%mac, "history expired");
            }
            !series.is_empty()
        });
    }

    fn save_period(&self, period: UsagePeriod) {
        self.period.send_modify(|slot| *slot = Some(Arc::new(period)));
    }

    fn load_period(&self) -> Option<UsagePeriod> {
        self.period.borrow().as_deref().cloned()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Arc<UsagePeriod>>> {
        self.period.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 27, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn snap(secs: i64) -> UsageSnapshot {
        UsageSnapshot {
            timestamp: t(secs),
            rx_bytes: u64::try_from(secs).unwrap(),
            tx_bytes: 0,
            download_speed: 0.0,
            upload_speed: 0.0,
            latency_ms: -1,
        }
    }

    fn mac() -> MacAddress {
        MacAddress::new("aa:bb:cc:dd:ee:ff")
    }

    #[test]
    fn out_of_order_appends_stay_sorted() {
        let h = MemoryHistory::new(std::time::Duration::from_secs(3600));
        h.append(&mac(), snap(4));
        h.append(&mac(), snap(2));
        h.append(&mac(), snap(6));

        let stamps: Vec<u64> = h
            .snapshots(&mac(), t(0), t(10))
            .iter()
            .map(|s| s.rx_bytes)
            .collect();
        assert_eq!(stamps, vec![2, 4, 6]);
    }

    #[test]
    fn range_is_half_open() {
        let h = MemoryHistory::new(std::time::Duration::from_secs(3600));
        for s in [0, 5, 10] {
            h.append(&mac(), snap(s));
        }
        assert_eq!(h.snapshots(&mac(), t(0), t(10)).len(), 2);
        assert!(h.snapshots(&MacAddress::new("00:00:00:00:00:01"), t(0), t(10)).is_empty());
    }

    #[test]
    fn retention_prunes_old_points() {
        let h = MemoryHistory::new(std::time::Duration::from_secs(60));
        h.append(&mac(), snap(0));
        h.append(&mac(), snap(30));
        h.append(&mac(), snap(90));
        assert_eq!(h.len(&mac()), 2);
    }

    #[test]
    fn prune_forgets_devices_that_never_return() {
        let h = MemoryHistory::new(std::time::Duration::from_secs(60));
        let gone = MacAddress::new("00:00:00:00:00:01");
        h.append(&gone, snap(0));
        h.append(&mac(), snap(50));
        h.append(&mac(), snap(100));

        // Appending to one series leaves the other untouched.
        assert_eq!(h.macs(), vec![gone.clone(), mac()]);

        h.prune(t(100));
        assert_eq!(h.macs(), vec![mac()]);
        assert_eq!(h.len(&mac()), 2);
        assert_eq!(h.len(&gone), 0);

        h.prune(t(200));
        assert!(h.macs().is_empty());
    }

    #[test]
    fn saved_period_is_broadcast() {
        let h = MemoryHistory::new(std::time::Duration::from_secs(60));
        let mut rx = h.subscribe();
        assert!(h.load_period().is_none());

        let period = UsagePeriod::empty(t(0));
        h.save_period(period.clone());
        assert!(rx.has_changed().unwrap());
        assert_eq!(h.load_period(), Some(period));
        assert_eq!(h.macs(), Vec::<MacAddress>::new());
    }
}
