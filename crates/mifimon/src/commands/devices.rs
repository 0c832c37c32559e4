//! `mifimon devices`: connected devices with live transfer speeds.

use std::io::IsTerminal;

use tabled::Tabled;
use tokio_stream::StreamExt;
use tracing::debug;

use mifimon_core::{ConnectionState, Controller, DeviceStats};

use crate::cli::{DevicesArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Down")]
    download: String,
    #[tabled(rename = "Up")]
    upload: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Received")]
    received: String,
    #[tabled(rename = "Sent")]
    sent: String,
    #[tabled(rename = "Connected")]
    connected: String,
}

fn row(d: &DeviceStats, color: bool) -> DeviceRow {
    DeviceRow {
        hostname: d.hostname.clone(),
        mac: d.mac.to_string(),
        ip: d.ip.map(|ip| ip.to_string()).unwrap_or_default(),
        kind: d.kind.to_string(),
        download: output::fmt_speed(d.download_speed),
        upload: output::fmt_speed(d.upload_speed),
        latency: output::paint_latency(d.latency(), color),
        received: output::fmt_bytes(d.rx_bytes),
        sent: output::fmt_bytes(d.tx_bytes),
        connected: if d.is_connected {
            d.connected_secs
                .map_or_else(|| "-".into(), output::fmt_duration)
        } else {
            "disconnected".into()
        },
    }
}

fn footer(devices: &[DeviceStats], color: bool) -> String {
    let online: Vec<&DeviceStats> = devices.iter().filter(|d| d.is_connected).collect();
    let down: f64 = online.iter().map(|d| d.download_speed).sum();
    let up: f64 = online.iter().map(|d| d.upload_speed).sum();
    let noun = if online.len() == 1 { "device" } else { "devices" };
    output::paint_heading(
        &format!(
            "{} {noun}, down {}, up {}",
            online.len(),
            output::fmt_speed(down),
            output::fmt_speed(up)
        ),
        color,
    )
}

fn render(devices: &[DeviceStats], global: &GlobalOpts) -> Result<String, CliError> {
    let color = output::should_color(global.color);
    let body = output::render_list(
        global.output,
        devices,
        |d| row(d, color),
        |d| d.mac.to_string(),
    )?;
    if global.output == OutputFormat::Table {
        return Ok(format!("{body}\n{}", footer(devices, color)));
    }
    Ok(body)
}

fn connected(devices: impl IntoIterator<Item = DeviceStats>) -> Vec<DeviceStats> {
    devices.into_iter().filter(|d| d.is_connected).collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: &DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.watch {
        return watch(controller, global).await;
    }

    // Speeds need two samples, so take a second poll one interval later.
    controller.poll_devices().await?;
    if !util::pause(util::secs(args.interval)).await {
        return Ok(());
    }
    let devices = connected(controller.poll_devices().await?);

    output::print_output(&render(&devices, global)?, global.quiet);
    Ok(())
}

/// Live view. A device that drops off stays listed as disconnected for
/// one refresh.
async fn watch(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let clear = global.output == OutputFormat::Table && std::io::stdout().is_terminal();
    let mut devices = controller.devices();
    let mut state = controller.connection_state();

    controller.start().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snapshot = devices.next() => {
                let Some(snapshot) = snapshot else { break };
                let list: Vec<DeviceStats> = snapshot.iter().map(|d| (**d).clone()).collect();
                if clear {
                    print!("\x1b[2J\x1b[H");
                }
                output::print_output(&render(&list, global)?, global.quiet);
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                debug!(state = ?current, "connection state changed");
                if let ConnectionState::Degraded { failures } = current {
                    let reason = controller.store().last_error().unwrap_or_default();
                    eprintln!("poll failed ({failures} in a row): {reason}");
                }
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mifimon_core::{DeviceKind, MacAddress};

    use super::*;

    fn device(mac: &str, down: f64) -> DeviceStats {
        DeviceStats {
            mac: MacAddress::new(mac),
            hostname: "Pixel-8".into(),
            ip: None,
            kind: DeviceKind::Android,
            slot: Some(1),
            rx_bytes: 0,
            tx_bytes: 0,
            download_speed: down,
            upload_speed: 0.0,
            latency_ms: 12,
            last_update: Utc::now(),
            is_connected: true,
            connected_secs: Some(90),
        }
    }

    #[test]
    fn disconnected_device_is_marked_and_left_out_of_totals() {
        let online = device("aa:00:00:00:00:01", 2048.0);
        let gone = device("aa:00:00:00:00:02", 4096.0).into_disconnected(Utc::now());

        assert_eq!(row(&online, false).connected, "1m 30s");
        assert_eq!(row(&gone, false).connected, "disconnected");

        let footer = footer(&[online, gone], false);
        let expected = format!("1 device, down {}", output::fmt_speed(2048.0));
        assert!(footer.starts_with(&expected), "{footer}");
    }
}
