// ── Usage types ──
//
// Per-device history points, window summaries, and hotspot-wide period
// totals. Windows are UTC calendar windows: day, week (from Sunday), month.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::MacAddress;

/// One history point appended per device per successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub timestamp: DateTime<Utc>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub download_speed: f64,
    pub upload_speed: f64,
    pub latency_ms: i64,
}

/// Aggregate over a time-ordered run of snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub samples: usize,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Last cumulative counter minus first.
    pub downloaded: u64,
    pub uploaded: u64,
    pub avg_download_speed: f64,
    pub avg_upload_speed: f64,
    pub peak_download_speed: f64,
    pub peak_upload_speed: f64,
    /// Mean over measured samples only; `None` if none were measured.
    pub avg_latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UsageWindow {
    Day,
    Week,
    Month,
}

impl UsageWindow {
    pub const ALL: [Self; 3] = [Self::Day, Self::Week, Self::Month];

    /// First calendar day of the window containing `at`.
    pub fn start_date(self, at: DateTime<Utc>) -> NaiveDate {
        let date = at.date_naive();
        match self {
            Self::Day => date,
            Self::Week => date - chrono::Days::new(u64::from(date.weekday().num_days_from_sunday())),
            Self::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Half-open `[start, end)` instant range of the window containing `at`.
    pub fn bounds(self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_date(at);
        let end = match self {
            Self::Day => start.checked_add_days(chrono::Days::new(1)),
            Self::Week => start.checked_add_days(chrono::Days::new(7)),
            Self::Month => start.checked_add_months(Months::new(1)),
        }
        .unwrap_or(start);
        (midnight(start), midnight(end))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Hotspot-wide totals for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub window: UsageWindow,
    pub started: NaiveDate,
    pub downloaded: u64,
    pub uploaded: u64,
    pub peak_download_speed: f64,
    pub peak_upload_speed: f64,
    pub peak_devices: usize,
    /// Time the router spent off its charger.
    pub on_battery_ms: u64,
}

impl PeriodTotals {
    pub fn empty(window: UsageWindow, at: DateTime<Utc>) -> Self {
        Self {
            window,
            started: window.start_date(at),
            downloaded: 0,
            uploaded: 0,
            peak_download_speed: 0.0,
            peak_upload_speed: 0.0,
            peak_devices: 0,
            on_battery_ms: 0,
        }
    }
}

// ── Device activity ──

/// Connected time and traffic of one device within one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub window: UsageWindow,
    pub started: NaiveDate,
    pub connected_ms: u64,
    pub downloaded: u64,
    pub uploaded: u64,
}

impl ActivityTotals {
    pub fn empty(window: UsageWindow, at: DateTime<Utc>) -> Self {
        Self {
            window,
            started: window.start_date(at),
            connected_ms: 0,
            downloaded: 0,
            uploaded: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceActivity {
    pub hostname: String,
    pub last_active: DateTime<Utc>,
    pub day: ActivityTotals,
    pub week: ActivityTotals,
    pub month: ActivityTotals,
}

impl DeviceActivity {
    pub fn empty(hostname: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            hostname: hostname.into(),
            last_active: at,
            day: ActivityTotals::empty(UsageWindow::Day, at),
            week: ActivityTotals::empty(UsageWindow::Week, at),
            month: ActivityTotals::empty(UsageWindow::Month, at),
        }
    }

    pub fn get(&self, window: UsageWindow) -> &ActivityTotals {
        match window {
            UsageWindow::Day => &self.day,
            UsageWindow::Week => &self.week,
            UsageWindow::Month => &self.month,
        }
    }

    pub(crate) fn get_mut(&mut self, window: UsageWindow) -> &mut ActivityTotals {
        match window {
            UsageWindow::Day => &mut self.day,
            UsageWindow::Week => &mut self.week,
            UsageWindow::Month => &mut self.month,
        }
    }
}

// ── Battery ──

/// Unbroken run of status readings with the router off its charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatterySession {
    pub started: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub start_percent: Option<u8>,
    pub last_percent: Option<u8>,
}

impl BatterySession {
    pub fn start(at: DateTime<Utc>, percent: Option<u8>) -> Self {
        Self {
            started: at,
            last_seen: at,
            start_percent: percent,
            last_percent: percent,
        }
    }

    /// Length up to the latest reading.
    pub fn duration(&self) -> chrono::Duration {
        self.last_seen - self.started
    }
}

// ── Period ──

/// Day, week and month totals as of `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub day: PeriodTotals,
    pub week: PeriodTotals,
    pub month: PeriodTotals,
    /// Open battery session, `None` while charging.
    pub battery: Option<BatterySession>,
    /// Per-device activity for devices seen this month.
    pub devices: BTreeMap<MacAddress, DeviceActivity>,
    pub updated_at: DateTime<Utc>,
}

impl UsagePeriod {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            day: PeriodTotals::empty(UsageWindow::Day, at),
            week: PeriodTotals::empty(UsageWindow::Week, at),
            month: PeriodTotals::empty(UsageWindow::Month, at),
            battery: None,
            devices: BTreeMap::new(),
            updated_at: at,
        }
    }

    pub fn get(&self, window: UsageWindow) -> &PeriodTotals {
        match window {
            UsageWindow::Day => &self.day,
            UsageWindow::Week => &self.week,
            UsageWindow::Month => &self.month,
        }
    }

    pub(crate) fn get_mut(&mut self, window: UsageWindow) -> &mut PeriodTotals {
        match window {
            UsageWindow::Day => &mut self.day,
            UsageWindow::Week => &mut self.week,
            UsageWindow::Month => &mut self.month,
        }
    }
}
