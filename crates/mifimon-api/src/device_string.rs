// ── Device-string decoding ──
//
// Slot strings look like
//   tm:2025-11-27 18:42:09,mac:86:52:47:47:4e:0a,ipaddr:192.168.1.101,
//   link_time:2hr46min4sec,rx_bytes:72986240,tx_bytes:667381878
// but fields may be missing or reordered. Tokens are split on commas and
// then on their first colon into a key/value map; each logical field is
// pulled from that map independently.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use indexmap::IndexMap;
use serde::Serialize;

/// One router-reported client entry, rebuilt fresh on every poll.
///
/// Counters are from the device's point of view. The router labels bytes
/// it *received* from the device `rx_bytes`; that is the device's upload
/// (`tx_bytes` here). The router's `tx_bytes` is the device's download
/// (`rx_bytes` here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawDeviceRecord {
    /// Lowercase, colon separated.
    pub mac: String,
    pub ip: Option<IpAddr>,
    /// Bytes delivered to the device (router `tx_bytes`).
    pub rx_bytes: u64,
    /// Bytes sent by the device (router `rx_bytes`).
    pub tx_bytes: u64,
    /// Parsed from `link_time`.
    pub connected_secs: u64,
    /// Position in the router's reply, 1..=6.
    pub slot: u8,
}

impl RawDeviceRecord {
    pub fn total_bytes(&self) -> u64 {
        self.rx_bytes.saturating_add(self.tx_bytes)
    }
}

/// Decode one slot string. `None` for empty slots and for entries
/// without a usable MAC address.
pub fn parse_device_string(slot: u8, raw: &str) -> Option<RawDeviceRecord> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return None;
    }

    let fields = tokenize(raw);
    let mac = fields.get("mac").and_then(|v| parse_mac(v))?;

    Some(RawDeviceRecord {
        mac,
        ip: fields.get("ipaddr").and_then(|v| parse_ipv4(v)),
        rx_bytes: fields.get("tx_bytes").map_or(0, |v| parse_counter(v)),
        tx_bytes: fields.get("rx_bytes").map_or(0, |v| parse_counter(v)),
        connected_secs: fields.get("link_time").map_or(0, |v| parse_link_time(v)),
        slot,
    })
}

/// Keep one record per MAC: the one with the larger `rx + tx` total.
/// On a tie the earlier slot wins. First-seen order is preserved.
pub fn dedupe_by_mac(records: impl IntoIterator<Item = RawDeviceRecord>) -> Vec<RawDeviceRecord> {
    let mut by_mac: IndexMap<String, RawDeviceRecord> = IndexMap::new();
    for record in records {
        match by_mac.get_mut(&record.mac) {
            Some(existing) if record.total_bytes() > existing.total_bytes() => *existing = record,
            Some(_) => {}
            None => {
                by_mac.insert(record.mac.clone(), record);
            }
        }
    }
    by_mac.into_values().collect()
}

/// Seconds in a free-text duration such as `2hr46min4sec`, `46m4s`, or `4s`.
///
/// Each number is scaled by the first letter of the word after it
/// (`h`, `m`, `s`). Missing components count as zero, unknown units
/// are ignored.
pub fn parse_link_time(raw: &str) -> u64 {
    let mut total = 0u64;
    let mut number: Option<u64> = None;
    let mut in_unit = false;

    for c in raw.chars() {
        if let Some(digit) = c.to_digit(10) {
            number = Some(number.unwrap_or(0).saturating_mul(10).saturating_add(u64::from(digit)));
            in_unit = false;
        } else if c.is_ascii_alphabetic() {
            if !in_unit {
                if let Some(n) = number.take() {
                    let scale = match c.to_ascii_lowercase() {
                        'h' => 3600,
                        'm' => 60,
                        's' => 1,
                        _ => 0,
                    };
                    total = total.saturating_add(n.saturating_mul(scale));
                }
            }
            in_unit = true;
        } else {
            number = None;
            in_unit = false;
        }
    }

    total
}

// ── Field helpers ───────────────────────────────────────────────────

fn tokenize(raw: &str) -> HashMap<&str, &str> {
    let mut fields = HashMap::new();
    for token in raw.split(',') {
        if let Some((key, value)) = token.split_once(':') {
            fields.entry(key.trim()).or_insert_with(|| value.trim());
        }
    }
    fields
}

fn parse_mac(value: &str) -> Option<String> {
    let mac: String = value
        .chars()
        .take_while(|c| c.is_ascii_hexdigit() || *c == ':')
        .collect();
    mac.chars()
        .any(|c| c.is_ascii_hexdigit())
        .then(|| mac.to_ascii_lowercase())
}

fn parse_ipv4(value: &str) -> Option<IpAddr> {
    let ip: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    ip.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

fn parse_counter(value: &str) -> u64 {
    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
