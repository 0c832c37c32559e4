// ── Device domain types ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{MacAddress, Vendor};

/// Latency sentinel: the probe failed or was never run.
pub const LATENCY_UNAVAILABLE: i64 = mifimon_api::LATENCY_UNAVAILABLE;

/// One counter reading for a device, as fed to the metric engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub timestamp: DateTime<Utc>,
}

/// Rough device family guessed from its hostname, then its MAC vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Apple,
    Android,
    Computer,
    #[default]
    Unknown,
}

const APPLE_WORDS: &[&str] = &["iphone", "ipad", "apple"];
const ANDROID_WORDS: &[&str] = &[
    "android", "galaxy", "samsung", "pixel", "redmi", "xiaomi", "huawei", "oppo", "vivo",
    "oneplus", "realme",
];
const COMPUTER_WORDS: &[&str] = &[
    "laptop", "desktop", "macbook", "imac", "windows", "pc", "nitro", "thinkpad", "lenovo",
    "dell", "asus", "acer",
];

impl DeviceKind {
    /// Hostname keywords win; an unrecognized name falls back to the
    /// vendor registered for `mac`.
    pub fn classify(hostname: &str, mac: &MacAddress) -> Self {
        let name = hostname.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));

        if has(APPLE_WORDS) {
            Self::Apple
        } else if has(ANDROID_WORDS) {
            Self::Android
        } else if has(COMPUTER_WORDS) {
            Self::Computer
        } else {
            mac.vendor().map_or(Self::Unknown, Self::from)
        }
    }
}

impl From<Vendor> for DeviceKind {
    fn from(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Apple => Self::Apple,
            Vendor::Samsung | Vendor::Xiaomi => Self::Android,
            Vendor::RaspberryPi | Vendor::VMware | Vendor::VirtualBox => Self::Computer,
        }
    }
}

/// Derived per-device view handed to consumers every poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub mac: MacAddress,
    pub hostname: String,
    pub ip: Option<IpAddr>,
    pub kind: DeviceKind,
    /// Router slot (1..=6) the device was last reported in.
    pub slot: Option<u8>,
    /// Cumulative bytes delivered to the device.
    pub rx_bytes: u64,
    /// Cumulative bytes sent by the device.
    pub tx_bytes: u64,
    /// Smoothed bytes/sec.
    pub download_speed: f64,
    /// Smoothed bytes/sec.
    pub upload_speed: f64,
    /// Round-trip estimate in ms, or [`LATENCY_UNAVAILABLE`].
    pub latency_ms: i64,
    pub last_update: DateTime<Utc>,
    pub is_connected: bool,
    /// Session length reported by the router.
    pub connected_secs: Option<u64>,
}

impl DeviceStats {
    /// `None` when latency is the unavailable sentinel.
    pub fn latency(&self) -> Option<u64> {
        u64::try_from(self.latency_ms).ok()
    }

    /// Final record emitted in the cycle a device disappears.
    pub fn into_disconnected(self, at: DateTime<Utc>) -> Self {
        Self {
            download_speed: 0.0,
            upload_speed: 0.0,
            latency_ms: 0,
            last_update: at,
            is_connected: false,
            connected_secs: None,
            ..self
        }
    }
}
