//! `mifimon latency`: round-trip probe to the router.

use serde::Serialize;

use mifimon_core::Controller;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct LatencyReport {
    router: String,
    latency_ms: u64,
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let config = controller.config();
    let router = format!("{}:{}", config.host, config.port);

    let measured = controller.measure_latency().await;
    let latency_ms = u64::try_from(measured).map_err(|_| CliError::ConnectionFailed {
        addr: router.clone(),
        reason: "no reply to the latency probe".into(),
    })?;

    let color = output::should_color(global.color);
    let report = LatencyReport { router, latency_ms };
    let out = output::render_single(
        global.output,
        &report,
        |r| {
            format!(
                "{}: {}",
                r.router,
                output::paint_latency(Some(r.latency_ms), color)
            )
        },
        |r| r.latency_ms.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
