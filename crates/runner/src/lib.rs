//! Tranche Runner
//!
//! The `tranche` command line. Parses arguments, builds a [`Session`]
//! (live Binance futures or a paper exchange) and hands the command to the
//! execution crate:
//!
//! - **cli**: clap definitions
//! - **bootstrap**: configuration and collaborator wiring
//! - **commands**: one handler per subcommand, plus result printing
//!
//! Ctrl-C fires a [`CancelToken`]; a running TWAP stops before its next
//! slice and a monitored grid cancels its open orders.

pub mod bootstrap;
pub mod cli;
pub mod commands;

use log::{info, warn};
use tranche_execution::CancelToken;

pub use bootstrap::Session;
pub use cli::{Cli, Command};

/// Build the session the flags ask for and run the command
pub async fn run(cli: Cli, cancel: CancelToken) -> anyhow::Result<()> {
    let session = if cli.paper {
        Session::paper(cli.paper_price)
    } else {
        Session::live()?
    };
    commands::execute(&session, cli.command, &cancel, cli.json).await
}

/// Cancel `token` on the first Ctrl-C
pub fn cancel_on_ctrl_c(token: CancelToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping");
                token.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });
}
