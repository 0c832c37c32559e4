// ── Router wire models ──
//
// Loosely-typed shapes of the proc_get replies. Values arrive as strings
// on most firmware but occasionally as numbers, so string fields are
// deserialized leniently.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::device_string::{RawDeviceRecord, dedupe_by_mac, parse_device_string};

/// Number of `sta_info<N>` slots the router reports.
pub const DEVICE_SLOTS: u8 = 6;

// ── Device list ─────────────────────────────────────────────────────

/// Reply of the device-list endpoint.
#[derive(Debug, Clone, Default)]
pub struct DeviceListResponse {
    /// `(slot, raw value)` for each `sta_info<N>` key, missing keys as empty.
    pub slots: Vec<(u8, String)>,
    pub station_list: Vec<StationEntry>,
}

impl DeviceListResponse {
    pub fn from_value(value: &Value) -> Self {
        let slots = (1..=DEVICE_SLOTS)
            .map(|slot| {
                let raw = value
                    .get(format!("sta_info{slot}"))
                    .map(value_to_string)
                    .unwrap_or_default();
                (slot, raw)
            })
            .collect();

        Self {
            slots,
            station_list: value.get("station_list").map(station_entries).unwrap_or_default(),
        }
    }

    /// `true` when every slot is `""` or `"none"`.
    ///
    /// An expired session makes the router answer with blanked fields,
    /// which is indistinguishable from an idle hotspot on a single reply.
    pub fn all_slots_empty(&self) -> bool {
        self.slots.iter().all(|(_, raw)| {
            let raw = raw.trim();
            raw.is_empty() || raw.eq_ignore_ascii_case("none")
        })
    }

    /// Decoded, de-duplicated device records.
    pub fn records(&self) -> Vec<RawDeviceRecord> {
        dedupe_by_mac(
            self.slots
                .iter()
                .filter_map(|(slot, raw)| parse_device_string(*slot, raw)),
        )
    }
}

// ── Station / hostname lists ────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StationEntry {
    #[serde(default, alias = "mac", deserialize_with = "lenient_string")]
    pub mac_addr: String,
    #[serde(default, alias = "hostName", deserialize_with = "lenient_string")]
    pub hostname: String,
    #[serde(default, alias = "ipaddr", deserialize_with = "lenient_string")]
    pub ip_addr: String,
}

/// Decode a `station_list` array, skipping entries that do not fit.
pub fn station_entries(value: &Value) -> Vec<StationEntry> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<StationEntry>(item.clone()).ok())
                .filter(|entry| !entry.mac_addr.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// A MAC to hostname association found in the hostname-list reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostnameEntry {
    pub mac: String,
    pub hostname: String,
}

const MAC_KEYS: &[&str] = &["mac", "mac_addr", "macAddress"];
const NAME_KEYS: &[&str] = &["hostname", "hostName", "name"];

/// Collect every object in `value` (at any depth) that carries both a
/// MAC-like key and a name-like key.
pub fn hostname_entries(value: &Value) -> Vec<HostnameEntry> {
    let mut out = Vec::new();
    collect_hostnames(value, &mut out);
    out
}

fn collect_hostnames(value: &Value, out: &mut Vec<HostnameEntry>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_hostnames(item, out)),
        Value::Object(map) => {
            let mac = MAC_KEYS.iter().find_map(|k| map.get(*k)).map(value_to_string);
            let name = NAME_KEYS.iter().find_map(|k| map.get(*k)).map(value_to_string);
            if let (Some(mac), Some(hostname)) = (mac, name) {
                if !mac.is_empty() && !hostname.is_empty() {
                    out.push(HostnameEntry {
                        mac: mac.to_ascii_lowercase(),
                        hostname,
                    });
                }
            }
            map.values()
                .filter(|v| v.is_array() || v.is_object())
                .for_each(|v| collect_hostnames(v, out));
        }
        _ => {}
    }
}

// ── System status ───────────────────────────────────────────────────

/// Flat reply of the system-status endpoint. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawSystemStatus {
    #[serde(deserialize_with = "lenient_string")]
    pub network_provider: String,
    #[serde(deserialize_with = "lenient_string")]
    pub spn_name_data: String,
    #[serde(deserialize_with = "lenient_string")]
    pub battery_charging: String,
    #[serde(deserialize_with = "lenient_string")]
    pub battery_vol_percent: String,
    #[serde(deserialize_with = "lenient_string")]
    pub battery_pers: String,
    #[serde(deserialize_with = "lenient_string")]
    pub signalbar: String,
    #[serde(deserialize_with = "lenient_string")]
    pub network_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub sub_network_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub realtime_time: String,
}

// ── Batch ───────────────────────────────────────────────────────────

/// Everything one poll cycle fetched, merged into a single record.
#[derive(Debug, Clone, Default)]
pub struct RouterSnapshot {
    pub devices: DeviceListResponse,
    pub stations: Vec<StationEntry>,
    pub hostnames: Vec<HostnameEntry>,
    pub status: RawSystemStatus,
}

impl RouterSnapshot {
    /// Hostname for `mac`: station list first, then hostname list.
    pub fn hostname_for(&self, mac: &str) -> Option<&str> {
        self.devices
            .station_list
            .iter()
            .chain(&self.stations)
            .find(|s| s.mac_addr.eq_ignore_ascii_case(mac) && !s.hostname.is_empty())
            .map(|s| s.hostname.as_str())
            .or_else(|| {
                self.hostnames
                    .iter()
                    .find(|h| h.mac.eq_ignore_ascii_case(mac))
                    .map(|h| h.hostname.as_str())
            })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|v| value_to_string(&v))
}
