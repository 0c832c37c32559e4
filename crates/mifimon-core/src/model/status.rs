// ── System status ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mifimon_api::RawSystemStatus;

/// Typed router status. Fields the router left blank are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub provider: Option<String>,
    pub network_type: Option<String>,
    pub sub_network_type: Option<String>,
    pub battery_percent: Option<u8>,
    pub charging: bool,
    /// Signal strength in bars, 0..=5.
    pub signal_bars: Option<u8>,
    pub uptime_secs: u64,
    pub fetched_at: DateTime<Utc>,
}

impl SystemStatus {
    pub fn from_raw(raw: &RawSystemStatus, fetched_at: DateTime<Utc>) -> Self {
        Self {
            provider: non_empty(&raw.network_provider).or_else(|| non_empty(&raw.spn_name_data)),
            network_type: non_empty(&raw.network_type),
            sub_network_type: non_empty(&raw.sub_network_type),
            battery_percent: parse_percent(&raw.battery_vol_percent)
                .or_else(|| parse_percent(&raw.battery_pers)),
            charging: raw.battery_charging.trim() == "1",
            signal_bars: raw.signalbar.trim().parse::<u8>().ok().map(|b| b.min(5)),
            uptime_secs: parse_uptime(&raw.realtime_time),
            fetched_at,
        }
    }
}

/// Seconds from `H:M:S` (hours may exceed 24, components may be padded
/// with spaces) or plain integer seconds. Anything else is 0.
pub fn parse_uptime(raw: &str) -> u64 {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return secs;
    }

    let Ok(parts) = raw
        .split(':')
        .map(|part| part.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
    else {
        return 0;
    };
    match parts.as_slice() {
        [h, m, s] => h
            .saturating_mul(3600)
            .saturating_add(m.saturating_mul(60))
            .saturating_add(*s),
        _ => 0,
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_percent(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|p| *p <= 100)
}
