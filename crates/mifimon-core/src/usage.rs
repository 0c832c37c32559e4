// ── Usage period tracking ──
//
// Day/week/month totals: hotspot traffic and per-device activity fed once
// per successful device poll, on-battery time fed by every status reading.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::metrics::DeviceDelta;
use crate::model::{
    ActivityTotals, BatterySession, DeviceActivity, PeriodTotals, SystemStatus, UsagePeriod,
    UsageWindow,
};

/// One successful poll cycle as seen by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleUsage {
    pub at: DateTime<Utc>,
    pub delta_rx: u64,
    pub delta_tx: u64,
    pub download_speed: f64,
    pub upload_speed: f64,
    pub devices: usize,
    pub activity: Vec<DeviceDelta>,
}

#[derive(Debug, Clone)]
pub struct UsageTracker {
    period: UsagePeriod,
}

impl UsageTracker {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            period: UsagePeriod::empty(at),
        }
    }

    /// Continue from a previously saved period. Windows that ended since
    /// it was saved are reset on the next [`roll`](Self::roll).
    pub fn resume(period: UsagePeriod) -> Self {
        Self { period }
    }

    pub fn period(&self) -> &UsagePeriod {
        &self.period
    }

    /// Reset every window whose calendar span no longer contains `at`.
    /// Device activity last touched before the current month is dropped.
    pub fn roll(&mut self, at: DateTime<Utc>) {
        for window in UsageWindow::ALL {
            let start = window.start_date(at);
            let totals = self.period.get_mut(window);
            if start > totals.started {
                info!(%window, from = %totals.started, to = %start, "usage window rolled over");
                *totals = PeriodTotals::empty(window, at);
            }
        }

        let month = UsageWindow::Month.start_date(at);
        self.period.devices.retain(|mac, activity| {
            if activity.month.started < month {
                debug!(%mac, "dropping device activity from an earlier month");
                return false;
            }
            for window in UsageWindow::ALL {
                let totals = activity.get_mut(window);
                if window.start_date(at) > totals.started {
                    *totals = ActivityTotals::empty(window, at);
                }
            }
            true
        });

        if at > self.period.updated_at {
            self.period.updated_at = at;
        }
    }

    /// Fold one cycle into every window. A sample from before a window's
    /// current start is dropped for that window.
    pub fn record(&mut self, cycle: CycleUsage) {
        self.roll(cycle.at);
        for window in UsageWindow::ALL {
            let totals = self.period.get_mut(window);
            if is_earlier(window, cycle.at, totals.started) {
                debug!(%window, at = %cycle.at, "dropping usage sample from an earlier window");
                continue;
            }
            totals.downloaded = totals.downloaded.saturating_add(cycle.delta_rx);
            totals.uploaded = totals.uploaded.saturating_add(cycle.delta_tx);
            totals.peak_download_speed = totals.peak_download_speed.max(cycle.download_speed);
            totals.peak_upload_speed = totals.peak_upload_speed.max(cycle.upload_speed);
            totals.peak_devices = totals.peak_devices.max(cycle.devices);
        }

        for delta in cycle.activity {
            self.record_activity(cycle.at, delta);
        }
    }

    /// Fold one status reading into the battery session and the
    /// on-battery totals.
    ///
    /// The span since the previous reading counts as on battery when that
    /// reading was off the charger. A reading that reports neither a
    /// battery level nor charging carries no battery information and is
    /// skipped, as is one older than the open session's latest reading.
    pub fn record_battery(&mut self, status: &SystemStatus) {
        let at = status.fetched_at;
        if status.battery_percent.is_none() && !status.charging {
            debug!("status reading without battery information");
            return;
        }
        let previous = self.period.battery.map(|session| session.last_seen);
        if previous.is_some_and(|last| at < last) {
            debug!(%at, "dropping battery reading older than the open session");
            return;
        }

        self.roll(at);
        if let Some(last) = previous {
            let span_ms = u64::try_from((at - last).num_milliseconds()).unwrap_or(0);
            for window in UsageWindow::ALL {
                let totals = self.period.get_mut(window);
                if !is_earlier(window, at, totals.started) {
                    totals.on_battery_ms = totals.on_battery_ms.saturating_add(span_ms);
                }
            }
        }

        if status.charging {
            if let Some(session) = self.period.battery.take() {
                info!(
                    minutes = session.duration().num_minutes(),
                    percent = ?status.battery_percent,
                    "battery session ended"
                );
            }
        } else if let Some(session) = self.period.battery.as_mut() {
            session.last_seen = at;
            if status.battery_percent.is_some() {
                session.last_percent = status.battery_percent;
            }
        } else {
            info!(percent = ?status.battery_percent, "battery session started");
            self.period.battery = Some(BatterySession::start(at, status.battery_percent));
        }
    }

    fn record_activity(&mut self, at: DateTime<Utc>, delta: DeviceDelta) {
        let DeviceDelta {
            mac,
            hostname,
            delta_rx,
            delta_tx,
            elapsed,
        } = delta;
        let connected_ms = u64::try_from(elapsed.num_milliseconds()).unwrap_or(0);

        let activity = self
            .period
            .devices
            .entry(mac)
            .or_insert_with(|| DeviceActivity::empty(hostname.as_str(), at));
        activity.hostname = hostname;
        if at > activity.last_active {
            activity.last_active = at;
        }
        for window in UsageWindow::ALL {
            let totals = activity.get_mut(window);
            if is_earlier(window, at, totals.started) {
                continue;
            }
            totals.connected_ms = totals.connected_ms.saturating_add(connected_ms);
            totals.downloaded = totals.downloaded.saturating_add(delta_rx);
            totals.uploaded = totals.uploaded.saturating_add(delta_tx);
        }
    }
}

/// `at` falls in a window that began before `started`.
fn is_earlier(window: UsageWindow, at: DateTime<Utc>, started: NaiveDate) -> bool {
    window.start_date(at) < started
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::MacAddress;

    fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, m, d, h, 0, 0).unwrap()
    }

    fn cycle(at: DateTime<Utc>, rx: u64, down: f64, devices: usize) -> CycleUsage {
        CycleUsage {
            at,
            delta_rx: rx,
            delta_tx: rx / 4,
            download_speed: down,
            upload_speed: down / 4.0,
            devices,
            activity: Vec::new(),
        }
    }

    fn delta(mac: &str, rx: u64, elapsed_secs: i64) -> DeviceDelta {
        DeviceDelta {
            mac: MacAddress::new(mac),
            hostname: "Pixel-8".into(),
            delta_rx: rx,
            delta_tx: 0,
            elapsed: Duration::seconds(elapsed_secs),
        }
    }

    fn status(at: DateTime<Utc>, charging: bool, percent: Option<u8>) -> SystemStatus {
        SystemStatus {
            provider: None,
            network_type: None,
            sub_network_type: None,
            battery_percent: percent,
            charging,
            signal_bars: None,
            uptime_secs: 0,
            fetched_at: at,
        }
    }

    #[test]
    fn accumulates_into_all_windows() {
        let mut t = UsageTracker::new(at(11, 27, 8));
        t.record(cycle(at(11, 27, 9), 1_000, 500.0, 2));
        t.record(cycle(at(11, 27, 10), 3_000, 200.0, 3));

        for window in UsageWindow::ALL {
            let totals = t.period().get(window);
            assert_eq!(totals.downloaded, 4_000);
            assert_eq!(totals.uploaded, 1_000);
            assert_eq!(totals.peak_download_speed, 500.0);
            assert_eq!(totals.peak_devices, 3);
        }
        assert_eq!(t.period().updated_at, at(11, 27, 10));
    }

    #[test]
    fn new_day_resets_day_only() {
        let mut t = UsageTracker::new(at(11, 27, 8));
        t.record(cycle(at(11, 27, 9), 1_000, 500.0, 2));
        // Friday: same week, same month
        t.record(cycle(at(11, 28, 9), 10, 50.0, 1));

        assert_eq!(t.period().day.downloaded, 10);
        assert_eq!(t.period().day.peak_devices, 1);
        assert_eq!(t.period().week.downloaded, 1_010);
        assert_eq!(t.period().month.downloaded, 1_010);
    }

    #[test]
    fn new_week_and_month_reset_together() {
        let mut t = UsageTracker::new(at(11, 29, 8));
        t.record(cycle(at(11, 29, 9), 1_000, 0.0, 1));
        // 2025-11-30 is a Sunday; 2025-12-01 a Monday in a new month.
        t.record(cycle(at(11, 30, 9), 100, 0.0, 1));
        assert_eq!(t.period().week.downloaded, 100);
        assert_eq!(t.period().month.downloaded, 1_100);

        t.record(cycle(at(12, 1, 9), 7, 0.0, 1));
        assert_eq!(t.period().week.downloaded, 107);
        assert_eq!(t.period().month.downloaded, 7);
    }

    #[test]
    fn sample_from_an_earlier_day_is_dropped_for_that_window() {
        let mut t = UsageTracker::new(at(11, 28, 8));
        t.record(cycle(at(11, 28, 9), 1_000, 0.0, 1));
        t.record(cycle(at(11, 27, 23), 5, 0.0, 1));

        assert_eq!(t.period().day.downloaded, 1_000);
        assert_eq!(t.period().week.downloaded, 1_005);
    }

    #[test]
    fn resumed_period_rolls_on_first_record() {
        let mut saved = UsagePeriod::empty(at(10, 31, 12));
        saved.month.downloaded = 42;
        let mut t = UsageTracker::resume(saved);
        t.record(cycle(at(11, 1, 0), 1, 0.0, 1));
        assert_eq!(t.period().month.downloaded, 1);
        assert_eq!(t.period().month.started.to_string(), "2025-11-01");
    }

    // ── Device activity ──

    #[test]
    fn activity_accumulates_per_device() {
        let mut t = UsageTracker::new(at(11, 27, 8));
        let mut c = cycle(at(11, 27, 9), 0, 0.0, 1);
        c.activity = vec![delta("aa:00:00:00:00:01", 0, 0)];
        t.record(c);
        let mut c = cycle(at(11, 27, 10), 500, 0.0, 2);
        c.activity = vec![
            delta("aa:00:00:00:00:01", 300, 2),
            delta("bb:00:00:00:00:02", 0, 0),
        ];
        t.record(c);

        let a = &t.period().devices[&MacAddress::new("aa:00:00:00:00:01")];
        assert_eq!(a.hostname, "Pixel-8");
        assert_eq!(a.last_active, at(11, 27, 10));
        for window in UsageWindow::ALL {
            assert_eq!(a.get(window).connected_ms, 2_000);
            assert_eq!(a.get(window).downloaded, 300);
        }
        assert_eq!(t.period().devices.len(), 2);
    }

    #[test]
    fn activity_rolls_with_the_calendar() {
        let mut t = UsageTracker::new(at(11, 29, 8));
        let mut c = cycle(at(11, 29, 9), 0, 0.0, 1);
        c.activity = vec![delta("aa:00:00:00:00:01", 100, 60)];
        t.record(c);

        // Sunday: new day and week, same month.
        let mut c = cycle(at(11, 30, 9), 0, 0.0, 1);
        c.activity = vec![delta("aa:00:00:00:00:01", 10, 30)];
        t.record(c);
        let a = &t.period().devices[&MacAddress::new("aa:00:00:00:00:01")];
        assert_eq!((a.day.connected_ms, a.day.downloaded), (30_000, 10));
        assert_eq!((a.week.connected_ms, a.week.downloaded), (30_000, 10));
        assert_eq!((a.month.connected_ms, a.month.downloaded), (90_000, 110));

        // New month: the idle device is forgotten.
        t.roll(at(12, 1, 0));
        assert!(t.period().devices.is_empty());
    }

    // ── Battery ──

    #[test]
    fn battery_session_spans_uncharged_readings() {
        let start = at(11, 27, 8);
        let mut t = UsageTracker::new(start);
        t.record_battery(&status(start, true, Some(100)));
        assert!(t.period().battery.is_none());

        t.record_battery(&status(start + Duration::minutes(5), false, Some(99)));
        t.record_battery(&status(start + Duration::minutes(65), false, Some(80)));
        let session = t.period().battery.unwrap();
        assert_eq!(session.started, start + Duration::minutes(5));
        assert_eq!(session.duration(), Duration::hours(1));
        assert_eq!((session.start_percent, session.last_percent), (Some(99), Some(80)));

        // Back on the charger: the last span still counts, the session closes.
        t.record_battery(&status(start + Duration::minutes(95), true, Some(79)));
        assert!(t.period().battery.is_none());
        for window in UsageWindow::ALL {
            assert_eq!(t.period().get(window).on_battery_ms, 90 * 60 * 1000);
        }
    }

    #[test]
    fn battery_time_resets_with_the_day() {
        let mut t = UsageTracker::new(at(11, 27, 22));
        t.record_battery(&status(at(11, 27, 22), false, Some(90)));
        t.record_battery(&status(at(11, 27, 23), false, Some(80)));
        t.record_battery(&status(at(11, 28, 1), false, Some(60)));

        // The span crossing midnight lands in the new day.
        assert_eq!(t.period().day.on_battery_ms, 2 * 3600 * 1000);
        assert_eq!(t.period().week.on_battery_ms, 3 * 3600 * 1000);
        assert_eq!(t.period().battery.unwrap().duration(), Duration::hours(3));
    }

    #[test]
    fn readings_without_battery_data_are_ignored() {
        let mut t = UsageTracker::new(at(11, 27, 8));
        t.record_battery(&status(at(11, 27, 8), false, None));
        assert!(t.period().battery.is_none());

        t.record_battery(&status(at(11, 27, 9), false, Some(50)));
        t.record_battery(&status(at(11, 27, 8), false, Some(55)));
        let session = t.period().battery.unwrap();
        assert_eq!(session.last_seen, at(11, 27, 9));
        assert_eq!(t.period().day.on_battery_ms, 0);
    }
}
