//! `mifimon status`: carrier, signal, battery and uptime.

use serde::Serialize;

use mifimon_core::{BatterySession, Controller, SystemStatus};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    status: SystemStatus,
    battery_session: Option<BatterySession>,
}

fn on_battery(session: &BatterySession) -> String {
    let secs = u64::try_from(session.duration().num_seconds()).unwrap_or(0);
    match session.start_percent {
        Some(pct) => format!("{} (from {pct}%)", output::fmt_duration(secs)),
        None => output::fmt_duration(secs),
    }
}

fn detail(r: &StatusReport) -> String {
    let s = &r.status;
    let network = match (&s.network_type, &s.sub_network_type) {
        (Some(net), Some(sub)) if sub != net => format!("{net} ({sub})"),
        (Some(net), _) => net.clone(),
        (None, Some(sub)) => sub.clone(),
        (None, None) => "-".into(),
    };
    let battery = match (s.battery_percent, s.charging) {
        (Some(pct), true) => format!("{pct}% (charging)"),
        (Some(pct), false) => format!("{pct}%"),
        (None, true) => "charging".into(),
        (None, false) => "-".into(),
    };
    let mut lines = vec![
        format!("Provider: {}", s.provider.as_deref().unwrap_or("-")),
        format!("Network:  {network}"),
        format!(
            "Signal:   {}",
            s.signal_bars.map_or_else(|| "-".into(), |b| format!("{b}/5"))
        ),
        format!("Battery:  {battery}"),
    ];
    if let Some(session) = &r.battery_session {
        lines.push(format!("Unplugged: {}", on_battery(session)));
    }
    lines.push(format!("Uptime:   {}", output::fmt_duration(s.uptime_secs)));
    lines.join("\n")
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let status = controller.poll_system_status().await?;
    let report = StatusReport {
        status,
        battery_session: controller.usage_period().await.battery,
    };
    let out = output::render_single(global.output, &report, detail, |r| {
        r.status.provider.clone().unwrap_or_default()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
