// ── Core configuration types ──
//
// These types describe how to reach a router and how to poll it. The
// core crate never reads config files; `mifimon-config` builds these.

use std::time::Duration;

use mifimon_api::TransportConfig;

use crate::metrics::SpeedPolicy;

pub use mifimon_api::Credentials;

/// Everything a [`Controller`](crate::Controller) needs.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Router address (e.g., "192.168.1.1").
    pub host: String,
    pub port: u16,
    /// `None` polls unauthenticated.
    pub credentials: Option<Credentials>,
    /// Bound on connect and on each request/response exchange.
    pub timeout: Duration,
    pub device_poll_interval: Duration,
    pub status_poll_interval: Duration,
    pub usage_flush_interval: Duration,
    /// Probe round-trip latency alongside each device poll.
    pub measure_latency: bool,
    pub speed: SpeedPolicy,
    /// How long the in-memory history keeps snapshots.
    pub history_retention: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            host: transport.host,
            port: transport.port,
            credentials: None,
            timeout: transport.timeout,
            device_poll_interval: Duration::from_secs(2),
            status_poll_interval: Duration::from_secs(5),
            usage_flush_interval: Duration::from_secs(300),
            measure_latency: true,
            speed: SpeedPolicy::default(),
            history_retention: Duration::from_secs(35 * 24 * 3600),
        }
    }
}

impl ControllerConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
        }
    }
}
