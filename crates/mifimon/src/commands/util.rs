//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use mifimon_core::UsageWindow;

use crate::cli::WindowArg;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal on stdin there is nobody to ask, so `action` is
/// refused unless `--yes` was given.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

pub fn window(arg: WindowArg) -> UsageWindow {
    match arg {
        WindowArg::Day => UsageWindow::Day,
        WindowArg::Week => UsageWindow::Week,
        WindowArg::Month => UsageWindow::Month,
    }
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Sleep for `period`, returning `false` early if Ctrl-C arrives first.
pub async fn pause(period: Duration) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => false,
        () = tokio::time::sleep(period) => true,
    }
}
