// ── Domain model ──
//
// Canonical types consumed by the CLI and any other front end.

pub mod device;
pub mod mac;
pub mod status;
pub mod usage;

pub use device::{DeviceKind, DeviceSample, DeviceStats, LATENCY_UNAVAILABLE};
pub use mac::{MacAddress, Vendor};
pub use status::{SystemStatus, parse_uptime};
pub use usage::{
    ActivityTotals, BatterySession, DeviceActivity, PeriodTotals, UsagePeriod, UsageSnapshot,
    UsageWindow, WindowSummary,
};
