// ── Metric derivation ──
//
// Speed math, the per-MAC metric engine, and window aggregation.

mod aggregate;
mod engine;
mod speed;

pub use aggregate::summarize_window;
pub use engine::{CycleReport, DeviceDelta, MetricEngine, Observation};
pub use speed::{SpeedPolicy, raw_speed};
