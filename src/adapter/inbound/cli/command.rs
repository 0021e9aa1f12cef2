//! Command-line interface definitions.
//!
//! Defines the CLI structure for the disburse binary using `clap`: running
//! one operation as a batch, the combined `fund` run, and offline checks of
//! configuration and accounts files.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::OperationKind;

const DEFAULT_CONFIG: &str = "disburse.toml";

/// Rate-limited batch transfers with retryable failure reports
#[derive(Parser, Debug)]
#[command(name = "disburse")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one operation over every account in an accounts file
    Run(RunArgs),

    /// Fund accounts with the native amount, then the token amount
    Fund(FundArgs),

    /// Validate inputs without touching the network
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `disburse check`.
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate the configuration file.
    Config(ConfigPathArg),
    /// Validate an accounts file.
    Accounts(AccountsArg),
}

/// Shared argument struct for commands that only need a configuration path.
#[derive(Args, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct AccountsArg {
    /// Path to the accounts file (JSON array of publicKey/privateKey).
    #[arg(short, long)]
    pub accounts: PathBuf,
}

/// Options shared by every command that submits transfers.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Path to the accounts file (JSON array of publicKey/privateKey).
    #[arg(short, long)]
    pub accounts: PathBuf,

    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Emit logs as JSON regardless of configuration.
    #[arg(long)]
    pub json_logs: bool,

    /// Override the configured log level.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Operation applied to every account.
    #[arg(short, long)]
    pub operation: OperationKind,

    /// Only process the accounts listed in a previous failure file.
    #[arg(long, value_name = "PATH")]
    pub retry_from: Option<PathBuf>,

    /// With --retry-from, also retry accounts whose transfer was accepted
    /// but never seen committed.
    ///
    /// Such a transfer may still have committed after the previous run
    /// stopped waiting; check it on-chain before retrying.
    #[arg(long, requires = "retry_from")]
    pub include_expired: bool,

    #[command(flatten)]
    pub batch: BatchArgs,
}

/// Arguments for the `fund` subcommand.
#[derive(Args, Debug)]
pub struct FundArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_operation_and_retry_flags() {
        let cli = Cli::try_parse_from([
            "disburse",
            "run",
            "--operation",
            "close-out",
            "--accounts",
            "wallets.json",
            "--retry-from",
            "failed_close_out_wallets.json",
            "--include-expired",
            "--yes",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.operation, OperationKind::CloseOut);
        assert!(args.include_expired);
        assert!(args.batch.yes);
        assert_eq!(args.batch.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn unknown_operation_lists_the_choices() {
        let err = Cli::try_parse_from([
            "disburse",
            "run",
            "--operation",
            "drain",
            "--accounts",
            "w.json",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("fund-native"));
    }

    #[test]
    fn include_expired_requires_retry_file() {
        let result = Cli::try_parse_from([
            "disburse",
            "run",
            "--operation",
            "clawback",
            "--accounts",
            "w.json",
            "--include-expired",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["disburse", "check", "accounts", "-a", "w.json", "--json"])
            .unwrap();
        assert!(cli.json);
    }
}
