//! Command dispatch: bridges CLI args -> engine runs -> output formatting.

pub mod apply;
pub mod devices;
pub mod kinds;
pub mod list;
pub mod plan;
pub mod util;

use clap::CommandFactory;

use crate::cli::{Cli, Command, CompletionsArgs, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(global),
        Command::Kinds => kinds::handle(global),
        Command::List(args) => list::handle(args, global).await,
        Command::Plan(args) => plan::handle(args, global).await,
        Command::Apply(args) => apply::handle(args, global).await,
        Command::Completions(args) => {
            completions(&args);
            Ok(())
        }
    }
}

fn completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "opnsync", &mut std::io::stdout());
}
