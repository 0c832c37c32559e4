//! Command dispatch: bridges CLI args to controller calls and output formatting.

pub mod config_cmd;
pub mod devices;
pub mod latency;
pub mod reboot;
pub mod status;
pub mod usage;
pub mod util;

use mifimon_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a router-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(controller, &args, global).await,
        Command::Status => status::handle(controller, global).await,
        Command::Usage(args) => usage::handle(controller, &args, global).await,
        Command::Latency => latency::handle(controller, global).await,
        Command::Reboot => reboot::handle(controller, global).await,
        // Config and Completions are handled before a controller exists
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions do not take a router connection".into(),
        )),
    }
}
