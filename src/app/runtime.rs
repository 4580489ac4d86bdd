//! Process setup and subcommand dispatch.

use anyhow::Result;
use tracing::debug;

use super::{config, fetch, filter, terminal};
use crate::ProcessExit;
use crate::cli::{Cli, Command};

pub(crate) async fn run_fwfetch(cli: Cli) -> Result<ProcessExit> {
    let file_config = config::load_config(cli.config.as_deref())?;
    terminal::init_tracing(terminal::resolve_log_level(
        cli.verbose,
        cli.quiet,
        file_config.verbosity,
    ));
    debug!(?cli, ?file_config, "configuration resolved");

    match &cli.command {
        Command::Fetch(args) => fetch::run_fetch(args, &file_config, cli.quiet).await,
        Command::Filter(args) => filter::run_filter(args),
    }
}
