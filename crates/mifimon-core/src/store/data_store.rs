// ── Central data store ──
//
// Holds the latest successful poll results. A failed cycle only records
// the error: previously stored data stays visible, stamped with the time
// it was last refreshed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::Collection;
use crate::model::{DeviceStats, SystemStatus, UsagePeriod};
use crate::stream::SnapshotStream;

pub struct DataStore {
    pub(crate) devices: Collection<DeviceStats>,
    pub(crate) system_status: watch::Sender<Option<Arc<SystemStatus>>>,
    pub(crate) usage_period: watch::Sender<Option<Arc<UsagePeriod>>>,
    pub(crate) last_success: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_error: watch::Sender<Option<String>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (system_status, _) = watch::channel(None);
        let (usage_period, _) = watch::channel(None);
        let (last_success, _) = watch::channel(None);
        let (last_error, _) = watch::channel(None);

        Self {
            devices: Collection::new(),
            system_status,
            usage_period,
            last_success,
            last_error,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<DeviceStats>>> {
        self.devices.snapshot()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn system_status(&self) -> Option<Arc<SystemStatus>> {
        self.system_status.borrow().clone()
    }

    pub fn usage_period(&self) -> Option<Arc<UsagePeriod>> {
        self.usage_period.borrow().clone()
    }

    /// When the last successful device poll completed.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.borrow()
    }

    /// Message of the most recent failed cycle, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// How old the stored device data is at `now`. `None` before the
    /// first successful poll.
    pub fn data_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_success().map(|at| now - at)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Device snapshots published after the point of subscription.
    pub fn subscribe_devices(&self) -> SnapshotStream<DeviceStats> {
        SnapshotStream::changes(self.devices.subscribe())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the device set with one cycle's report. A device that
    /// vanished this cycle stays listed with `is_connected == false` until
    /// the next cycle replaces the set again.
    pub(crate) fn apply_devices<'a>(
        &self,
        devices: impl IntoIterator<Item = &'a DeviceStats>,
        at: DateTime<Utc>,
    ) {
        let items = devices
            .into_iter()
            .map(|d| (d.mac.clone(), d.clone()))
            .collect();
        self.devices.replace_all(items);
        self.mark_success(at);
    }

    pub(crate) fn apply_system_status(&self, status: SystemStatus) {
        self.system_status
            .send_modify(|slot| *slot = Some(Arc::new(status)));
    }

    pub(crate) fn apply_usage_period(&self, period: UsagePeriod) {
        self.usage_period
            .send_modify(|slot| *slot = Some(Arc::new(period)));
    }

    pub(crate) fn record_failure(&self, message: String) {
        self.last_error.send_modify(|slot| *slot = Some(message));
    }

    fn mark_success(&self, at: DateTime<Utc>) {
        self.last_success.send_modify(|slot| {
            if slot.is_none_or(|prev| prev < at) {
                *slot = Some(at);
            }
        });
        self.last_error.send_modify(|slot| *slot = None);
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
