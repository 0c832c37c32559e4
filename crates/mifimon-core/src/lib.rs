// mifimon-core: polling, metric derivation and usage aggregation on top of
// mifimon-api, consumed by the CLI.

pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod metrics;
pub mod model;
pub mod store;
pub mod stream;
pub mod usage;

mod fetch;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, Credentials};
pub use controller::{ConnectionState, Controller};
pub use error::CoreError;
pub use history::{HistoryStore, MemoryHistory};
pub use metrics::{
    CycleReport, DeviceDelta, MetricEngine, Observation, SpeedPolicy, summarize_window,
};
pub use store::DataStore;
pub use stream::{Snapshot, SnapshotStream};
pub use usage::{CycleUsage, UsageTracker};

pub use model::{
    ActivityTotals, BatterySession, DeviceActivity, DeviceKind, DeviceSample, DeviceStats,
    LATENCY_UNAVAILABLE, MacAddress, PeriodTotals, SystemStatus, UsagePeriod, UsageSnapshot,
    UsageWindow, Vendor, WindowSummary,
};

