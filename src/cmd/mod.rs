//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`] or [`validate`]. Each handler lives in
//! its own submodule.

pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::BalancerError;

pub async fn dispatch(cli: Cli) -> Result<(), BalancerError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  hashlb v{version}: path-hashing HTTP load balancer\n\n  \
         No command provided. To get started:\n\n    \
         hashlb run                        Start with ./hashlb.yaml or built-in defaults\n    \
         hashlb run -b host:port ...       Start with explicit backends\n    \
         hashlb validate hashlb.yaml       Check a config file\n    \
         hashlb --help                     See all commands and options\n"
    );
}
