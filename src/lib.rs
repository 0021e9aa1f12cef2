//! disburse - rate-limited batch transfers against a ledger network.
//!
//! A batch applies one operation (fund, close out, claw back) to every
//! account in an accounts file. Transfers are admitted through a
//! rate-limited scheduler, confirmed within a bounded number of rounds, and
//! every account ends with exactly one outcome. Failures are written to a
//! JSON file that a later run can retry from.
//!
//! # Architecture
//!
//! - [`domain`] - Ledger-agnostic types: accounts, intents, outcomes
//! - [`port`] - Traits for the ledger node, signer and token contract
//! - [`runtime`] - Scheduler, confirmation waiter, executor, orchestrator
//!   and failure report
//! - [`adapter`] - algod REST client, external signing helper, accounts
//!   files and the CLI
//! - [`infrastructure`] - Configuration, logging and wiring
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use disburse::adapter::outbound::wallet_file::load_accounts;
//! use disburse::domain::OperationKind;
//! use disburse::infrastructure::bootstrap::build_orchestrator;
//! use disburse::infrastructure::config::Config;
//! use disburse::runtime::FailureReport;
//!
//! # async fn run() -> disburse::error::Result<()> {
//! let config = Config::load("disburse.toml")?;
//! let accounts = load_accounts("wallets.json".as_ref())?;
//! let operation = config.funding.operation(OperationKind::CloseOut)?;
//!
//! let result = build_orchestrator(&config)?.run(operation, &accounts).await?;
//! FailureReport::from_batch(&result).persist(&config.batch.output_dir)?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod runtime;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
