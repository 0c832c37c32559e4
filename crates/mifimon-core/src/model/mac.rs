// MacAddress is the primary key for every per-device structure: metric
// state, the device collection, and usage history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::Display;

/// MAC address, normalized to lowercase colon-separated form (aa:bb:cc:dd:ee:ff).
///
/// Equality is therefore case-insensitive with respect to the raw input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    /// Normalize from colon-separated, dash-separated, or mixed-case input.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase().replace('-', ":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First three octets (the vendor prefix).
    pub fn oui(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }

    /// Locally administered bit set (randomized "private" addresses).
    pub fn is_locally_administered(&self) -> bool {
        self.0
            .get(..2)
            .and_then(|octet| u8::from_str_radix(octet, 16).ok())
            .is_some_and(|b| b & 0b10 != 0)
    }

    /// Manufacturer registered for the OUI. Randomized addresses carry no
    /// vendor prefix and always return `None`.
    pub fn vendor(&self) -> Option<Vendor> {
        if self.is_locally_administered() {
            return None;
        }
        let oui = self.oui();
        VENDOR_PREFIXES
            .iter()
            .find(|(prefix, _)| *prefix == oui)
            .map(|(_, vendor)| *vendor)
    }
}

// ── Vendor lookup ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Vendor {
    Apple,
    Samsung,
    Xiaomi,
    #[strum(serialize = "Raspberry Pi")]
    RaspberryPi,
    #[strum(serialize = "VMware")]
    VMware,
    VirtualBox,
}

const VENDOR_PREFIXES: &[(&str, Vendor)] = &[
    ("3c:22:fb", Vendor::Apple),
    ("a4:83:e7", Vendor::Apple),
    ("ac:bc:32", Vendor::Apple),
    ("f0:18:98", Vendor::Apple),
    ("00:12:fb", Vendor::Samsung),
    ("00:16:32", Vendor::Samsung),
    ("5c:0a:5b", Vendor::Samsung),
    ("28:6c:07", Vendor::Xiaomi),
    ("64:09:80", Vendor::Xiaomi),
    ("f8:a4:5f", Vendor::Xiaomi),
    ("b8:27:eb", Vendor::RaspberryPi),
    ("dc:a6:32", Vendor::RaspberryPi),
    ("e4:5f:01", Vendor::RaspberryPi),
    ("00:0c:29", Vendor::VMware),
    ("00:50:56", Vendor::VMware),
    ("08:00:27", Vendor::VirtualBox),
];

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
