use std::process::ExitCode;

use clap::Parser;
use disburse::adapter::inbound::cli::command::{CheckCommand, Cli, Commands};
use disburse::adapter::inbound::cli::output::{self, OutputConfig};
use disburse::adapter::inbound::cli::{check, run};
use disburse::error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    match dispatch(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Run a command. `Ok(false)` means it ran but some accounts failed.
async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run(args) => run::execute(&args).await,
        Commands::Fund(args) => run::execute_fund(&args).await,
        Commands::Check(CheckCommand::Config(args)) => {
            check::execute_config(&args.config).map(|()| true)
        }
        Commands::Check(CheckCommand::Accounts(args)) => {
            check::execute_accounts(&args.accounts).map(|()| true)
        }
    }
}
