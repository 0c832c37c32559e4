// ── Controller ──
//
// Lifecycle for one router: the poll cycles, the background tasks that
// drive them, and the reactive data they publish through the DataStore.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mifimon_api::RouterClient;

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::fetch;
use crate::history::{HistoryStore, MemoryHistory};
use crate::metrics::{MetricEngine, Observation, summarize_window};
use crate::model::{
    DeviceActivity, DeviceStats, LATENCY_UNAVAILABLE, MacAddress, SystemStatus, UsagePeriod,
    UsageSnapshot, UsageWindow, WindowSummary,
};
use crate::store::DataStore;
use crate::stream::SnapshotStream;
use crate::usage::{CycleUsage, UsageTracker};

// ── ConnectionState ──────────────────────────────────────────────

/// Poller health observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No cycle has run yet.
    Idle,
    /// First cycle in flight.
    Polling,
    Healthy,
    /// Consecutive failed device polls since the last success.
    Degraded { failures: u32 },
}

// ── Controller ───────────────────────────────────────────────────

/// Entry point for consumers. Cheap to clone.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    client: RouterClient,
    engine: MetricEngine,
    store: Arc<DataStore>,
    history: Arc<dyn HistoryStore>,
    usage: Mutex<UsageTracker>,
    connection_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    /// Child of `cancel` for the running task set, replaced on each start.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Controller with an in-memory history. Does not poll until
    /// [`start`](Self::start) or an explicit `poll_*` call.
    pub fn new(config: ControllerConfig) -> Self {
        let history = Arc::new(MemoryHistory::new(config.history_retention));
        Self::with_history(config, history)
    }

    /// Controller backed by the given history store. Period totals resume
    /// from the store's last saved period.
    pub fn with_history(config: ControllerConfig, history: Arc<dyn HistoryStore>) -> Self {
        let client = RouterClient::new(config.transport(), config.credentials.clone());
        let engine = MetricEngine::new(config.speed);
        let tracker = history
            .load_period()
            .map_or_else(|| UsageTracker::new(Utc::now()), UsageTracker::resume);
        let (connection_state, _) = watch::channel(ConnectionState::Idle);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                engine,
                store: Arc::new(DataStore::new()),
                history,
                usage: Mutex::new(tracker),
                connection_state,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn client(&self) -> &RouterClient {
        &self.inner.client
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.inner.history
    }

    // ── Background lifecycle ─────────────────────────────────────

    /// Spawn the device poll, status poll and usage flush tasks. Calling
    /// `start` while tasks are running restarts them.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        let child = {
            let mut slot = self.inner.cancel_child.lock().await;
            slot.cancel();
            *slot = self.inner.cancel.child_token();
            slot.clone()
        };
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        let config = &self.inner.config;
        if !config.device_poll_interval.is_zero() {
            let ctrl = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(device_poll_task(ctrl, config.device_poll_interval, cancel)));
        }

        if !config.status_poll_interval.is_zero() {
            let ctrl = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(status_poll_task(ctrl, config.status_poll_interval, cancel)));
        }

        if !config.usage_flush_interval.is_zero() {
            let ctrl = self.clone();
            handles.push(tokio::spawn(usage_flush_task(ctrl, config.usage_flush_interval, child)));
        }

        info!(
            host = %config.host,
            device_every = ?config.device_poll_interval,
            status_every = ?config.status_poll_interval,
            "poller started"
        );
    }

    /// Cancel and join the background tasks, then flush usage totals.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.flush_usage(Utc::now()).await;
        debug!("poller stopped");
    }

    // ── Poll cycles ──────────────────────────────────────────────

    /// Run one device poll cycle.
    ///
    /// Returns the connected devices plus one final record for each device
    /// that disappeared since the previous cycle. On failure the store
    /// keeps its last good data and records the error.
    ///
    /// Samples are stamped with the time the cycle started, so when cycles
    /// overlap the one issued last wins regardless of completion order.
    pub async fn poll_devices(&self) -> Result<Vec<DeviceStats>, CoreError> {
        let inner = &self.inner;
        let at = Utc::now();
        inner.connection_state.send_if_modified(|state| {
            if *state == ConnectionState::Idle {
                *state = ConnectionState::Polling;
                true
            } else {
                false
            }
        });

        let (fetched, latency_ms) = tokio::join!(fetch::fetch_cycle(&inner.client), self.latency_for_cycle());
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_failure(&e);
                return Err(e);
            }
        };

        let observations: Vec<Observation> = snapshot
            .devices
            .records()
            .into_iter()
            .map(|record| {
                let hostname = snapshot.hostname_for(&record.mac).map(str::to_owned);
                Observation::new(record, hostname.as_deref())
            })
            .collect();

        let mut report = inner.engine.ingest(&observations, latency_ms, at);
        let status = SystemStatus::from_raw(&snapshot.status, at);

        for device in report.connected() {
            inner.history.append(
                &device.mac,
                UsageSnapshot {
                    timestamp: at,
                    rx_bytes: device.rx_bytes,
                    tx_bytes: device.tx_bytes,
                    download_speed: device.download_speed,
                    upload_speed: device.upload_speed,
                    latency_ms: device.latency_ms,
                },
            );
        }

        let period = {
            let mut tracker = inner.usage.lock().await;
            tracker.record(CycleUsage {
                at,
                delta_rx: report.delta_rx,
                delta_tx: report.delta_tx,
                download_speed: report.total_download_speed(),
                upload_speed: report.total_upload_speed(),
                devices: report.connected().count(),
                activity: std::mem::take(&mut report.deltas),
            });
            tracker.record_battery(&status);
            tracker.period().clone()
        };

        inner.store.apply_devices(&report.devices, at);
        inner.store.apply_usage_period(period);
        inner.store.apply_system_status(status);
        inner.connection_state.send_replace(ConnectionState::Healthy);

        debug!(
            devices = report.connected().count(),
            latency_ms,
            "device poll complete"
        );
        Ok(report.devices)
    }

    /// Run one status poll and fold it into the battery tracking.
    pub async fn poll_system_status(&self) -> Result<SystemStatus, CoreError> {
        let at = Utc::now();
        let raw = fetch::fetch_status(&self.inner.client).await.inspect_err(|e| {
            self.inner.store.record_failure(e.to_string());
        })?;
        let status = SystemStatus::from_raw(&raw, at);

        let period = {
            let mut tracker = self.inner.usage.lock().await;
            tracker.record_battery(&status);
            tracker.period().clone()
        };
        self.inner.store.apply_usage_period(period);
        self.inner.store.apply_system_status(status.clone());
        Ok(status)
    }

    /// Round-trip time in ms, or [`LATENCY_UNAVAILABLE`].
    pub async fn measure_latency(&self) -> i64 {
        self.inner.client.probe_latency().await
    }

    /// Ask the router to reboot. Success means the request went out.
    pub async fn reboot(&self) -> Result<(), CoreError> {
        self.inner.client.reboot().await?;
        self.inner.client.session().invalidate().await;
        info!(host = %self.inner.config.host, "reboot requested");
        Ok(())
    }

    // ── Usage ────────────────────────────────────────────────────

    /// Aggregate `mac`'s history over the calendar `window` containing
    /// `now`. `None` when no samples fall in it.
    pub fn usage_summary(
        &self,
        mac: &MacAddress,
        window: UsageWindow,
        now: DateTime<Utc>,
    ) -> Option<WindowSummary> {
        let (from, to) = window.bounds(now);
        summarize_window(&self.inner.history.snapshots(mac, from, to))
    }

    /// [`usage_summary`](Self::usage_summary) for every device with history.
    pub fn usage_summaries(
        &self,
        window: UsageWindow,
        now: DateTime<Utc>,
    ) -> Vec<(MacAddress, WindowSummary)> {
        self.inner
            .history
            .macs()
            .into_iter()
            .filter_map(|mac| {
                let summary = self.usage_summary(&mac, window, now)?;
                Some((mac, summary))
            })
            .collect()
    }

    pub async fn usage_period(&self) -> UsagePeriod {
        self.inner.usage.lock().await.period().clone()
    }

    /// Per-device connected time and traffic for the calendar `window`,
    /// busiest first.
    pub async fn device_activity(&self, window: UsageWindow) -> Vec<(MacAddress, DeviceActivity)> {
        let mut all: Vec<(MacAddress, DeviceActivity)> = self
            .inner
            .usage
            .lock()
            .await
            .period()
            .devices
            .iter()
            .map(|(mac, activity)| (mac.clone(), activity.clone()))
            .collect();
        all.sort_by_key(|(_, activity)| std::cmp::Reverse(activity.get(window).downloaded));
        all
    }

    /// Roll windows forward to `now`, save the period to history and drop
    /// history older than the retention horizon.
    pub async fn flush_usage(&self, now: DateTime<Utc>) {
        let period = {
            let mut tracker = self.inner.usage.lock().await;
            tracker.roll(now);
            tracker.period().clone()
        };
        self.inner.history.save_period(period.clone());
        self.inner.history.prune(now);
        self.inner.store.apply_usage_period(period);
        debug!("usage period flushed");
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Device lists published by later poll cycles.
    pub fn devices(&self) -> SnapshotStream<DeviceStats> {
        self.inner.store.subscribe_devices()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<DeviceStats>>> {
        self.inner.store.devices_snapshot()
    }

    pub fn system_status(&self) -> Option<Arc<SystemStatus>> {
        self.inner.store.system_status()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────

    async fn latency_for_cycle(&self) -> i64 {
        if self.inner.config.measure_latency {
            self.inner.client.probe_latency().await
        } else {
            LATENCY_UNAVAILABLE
        }
    }

    fn record_failure(&self, error: &CoreError) {
        self.inner.store.record_failure(error.to_string());
        self.inner.connection_state.send_modify(|state| {
            let failures = match *state {
                ConnectionState::Degraded { failures } => failures.saturating_add(1),
                _ => 1,
            };
            *state = ConnectionState::Degraded { failures };
        });
    }
}

// ── Background tasks ─────────────────────────────────────────────

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn device_poll_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = controller.poll_devices().await {
                    warn!(error = %e, kind = e.kind(), "device poll failed");
                }
            }
        }
    }
}

async fn status_poll_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = controller.poll_system_status().await {
                    warn!(error = %e, kind = e.kind(), "status poll failed");
                }
            }
        }
    }
}

async fn usage_flush_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = ticker(period);
    interval.tick().await; // nothing to flush yet

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => controller.flush_usage(Utc::now()).await,
        }
    }
}
