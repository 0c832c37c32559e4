//! `mifimon usage`: per-device and hotspot-wide totals for a calendar window.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use mifimon_core::{Controller, MacAddress, PeriodTotals, UsageWindow, WindowSummary};

use crate::cli::{GlobalOpts, UsageArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Report ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceUsage {
    mac: MacAddress,
    hostname: Option<String>,
    #[serde(flatten)]
    summary: WindowSummary,
    /// Time seen connected during the window.
    connected_ms: u64,
}

#[derive(Serialize)]
struct UsageReport {
    window: UsageWindow,
    hotspot: PeriodTotals,
    devices: Vec<DeviceUsage>,
}

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Downloaded")]
    downloaded: String,
    #[tabled(rename = "Uploaded")]
    uploaded: String,
    #[tabled(rename = "Avg Down")]
    avg_down: String,
    #[tabled(rename = "Peak Down")]
    peak_down: String,
    #[tabled(rename = "Avg Up")]
    avg_up: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Connected")]
    connected: String,
    #[tabled(rename = "Samples")]
    samples: usize,
}

impl From<&DeviceUsage> for UsageRow {
    fn from(u: &DeviceUsage) -> Self {
        let s = &u.summary;
        Self {
            hostname: u.hostname.clone().unwrap_or_else(|| "-".into()),
            mac: u.mac.to_string(),
            downloaded: output::fmt_bytes(s.downloaded),
            uploaded: output::fmt_bytes(s.uploaded),
            avg_down: output::fmt_speed(s.avg_download_speed),
            peak_down: output::fmt_speed(s.peak_download_speed),
            avg_up: output::fmt_speed(s.avg_upload_speed),
            latency: s
                .avg_latency_ms
                .map_or_else(|| "-".into(), |ms| format!("{ms:.0} ms")),
            connected: output::fmt_duration(u.connected_ms / 1000),
            samples: s.samples,
        }
    }
}

fn detail(report: &UsageReport, color: bool) -> String {
    let rows: Vec<UsageRow> = report.devices.iter().map(UsageRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    let h = &report.hotspot;
    let heading = output::paint_heading(
        &format!("Hotspot this {} (since {})", report.window, h.started),
        color,
    );
    format!(
        "{table}\n{heading}\n  Downloaded: {}\n  Uploaded:   {}\n  Peak down:  {}\n  Peak up:    {}\n  Peak devices: {}\n  On battery: {}",
        output::fmt_bytes(h.downloaded),
        output::fmt_bytes(h.uploaded),
        output::fmt_speed(h.peak_download_speed),
        output::fmt_speed(h.peak_upload_speed),
        h.peak_devices,
        output::fmt_duration(h.on_battery_ms / 1000),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: &UsageArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let window = util::window(args.window);

    for n in 0..args.samples {
        if n > 0 && !util::pause(util::secs(args.interval)).await {
            break;
        }
        controller.poll_devices().await?;
    }

    let now = Utc::now();
    controller.flush_usage(now).await;

    let mut hostnames: HashMap<MacAddress, String> = HashMap::new();
    let mut connected: HashMap<MacAddress, u64> = HashMap::new();
    for (mac, activity) in controller.device_activity(window).await {
        connected.insert(mac.clone(), activity.get(window).connected_ms);
        hostnames.insert(mac, activity.hostname);
    }
    let snapshot = controller.devices_snapshot();
    for d in snapshot.as_ref() {
        hostnames.insert(d.mac.clone(), d.hostname.clone());
    }

    let summaries = match &args.mac {
        Some(raw) => {
            let mac = MacAddress::new(raw);
            let summary = controller
                .usage_summary(&mac, window, now)
                .ok_or_else(|| CliError::UnknownDevice { mac: raw.clone() })?;
            vec![(mac, summary)]
        }
        None => {
            let mut all = controller.usage_summaries(window, now);
            all.sort_by_key(|(_, summary)| Reverse(summary.downloaded));
            all
        }
    };

    let period = controller.usage_period().await;
    let report = UsageReport {
        window,
        hotspot: period.get(window).clone(),
        devices: summaries
            .into_iter()
            .map(|(mac, summary)| DeviceUsage {
                hostname: hostnames.get(&mac).cloned(),
                connected_ms: connected.get(&mac).copied().unwrap_or(0),
                mac,
                summary,
            })
            .collect(),
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| detail(r, color),
        |r| {
            r.devices
                .iter()
                .map(|d| format!("{}\t{}", d.mac, d.summary.downloaded))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
