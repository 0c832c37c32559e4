//! `mifimon reboot`.

use mifimon_core::Controller;

use crate::cli::GlobalOpts;
use crate::error::CliError;

use super::util;

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let host = &controller.config().host;
    if !util::confirm(
        &format!("Reboot router {host}? Every connected device will drop off"),
        "reboot",
        global.yes,
    )? {
        return Ok(());
    }
    controller.reboot().await?;
    if !global.quiet {
        eprintln!("✓ Reboot requested; the router will be back in about a minute");
    }
    Ok(())
}
