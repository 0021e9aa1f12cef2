//! Offline validation of configuration and accounts files.

use std::path::Path;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::wallet_file::load_accounts;
use crate::domain::{Operation, OperationKind};
use crate::error::Result;
use crate::infrastructure::config::settings::{Config, TREASURY_KEY_ENV};

/// Whether `config` has everything `kind` needs.
fn readiness(config: &Config, kind: OperationKind) -> std::result::Result<Operation, String> {
    let operation = config.funding.operation(kind).map_err(|e| e.to_string())?;
    let treasury = config
        .treasury
        .treasury()
        .ok_or_else(|| "treasury.address is not set".to_string())?;
    if !operation.signed_by_account() && treasury.account().is_none() {
        return Err(format!("{TREASURY_KEY_ENV} is not set"));
    }
    Ok(operation)
}

/// Validate a configuration file and report which operations it can run.
pub fn execute_config(path: &Path) -> Result<()> {
    let config = Config::load(path)?;

    output::section("Configuration Check");
    output::field("Config", path.display());
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("Algod", &config.ledger.algod_url);
    output::field(
        "Concurrency",
        format!(
            "{} in flight, {}ms between dispatches",
            config.scheduler.max_concurrent, config.scheduler.min_interval_ms
        ),
    );
    output::field("Rounds", config.confirmation.max_rounds);
    output::field("Output", config.batch.output_dir.display());
    if let Some(deadline) = config.batch.deadline_secs {
        output::field("Deadline", format!("{deadline}s"));
    }

    if config.signer.command.is_empty() {
        output::warning("Signer command not configured ([signer] command)");
    } else {
        output::field("Signer", config.signer.command.join(" "));
    }

    output::section("Operations");
    let mut runnable = 0;
    for kind in OperationKind::ALL {
        match readiness(&config, kind) {
            Ok(_) => {
                runnable += 1;
                output::success(kind.as_str());
                output::event("operation", json!({ "operation": kind, "ready": true }));
            }
            Err(reason) => {
                output::warning(&format!("{kind}: {reason}"));
                output::event(
                    "operation",
                    json!({ "operation": kind, "ready": false, "reason": reason }),
                );
            }
        }
    }

    if runnable == 0 {
        output::hint("set [funding], [treasury] and DISBURSE_TREASURY_KEY to enable operations");
    }
    output::success("Configuration check complete");
    Ok(())
}

/// Validate an accounts file.
pub fn execute_accounts(path: &Path) -> Result<()> {
    let accounts = load_accounts(path)?;

    output::section("Accounts Check");
    output::field("File", path.display());
    output::field("Accounts", accounts.len());
    if accounts.is_empty() {
        output::warning("Accounts file is empty");
    } else {
        output::success("Accounts file is valid");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_out_needs_only_a_treasury_address() {
        let config = Config::parse_toml("[treasury]\naddress = \"TREASURY\"\n").unwrap();
        assert!(readiness(&config, OperationKind::CloseOut).is_ok());
    }

    #[test]
    fn funding_without_amount_is_not_ready() {
        let config = Config::parse_toml("[treasury]\naddress = \"TREASURY\"\n").unwrap();
        let reason = readiness(&config, OperationKind::FundNative).unwrap_err();
        assert!(reason.contains("native_amount"));
    }

    #[test]
    fn clawback_needs_a_token_contract() {
        let config = Config::parse_toml("[treasury]\naddress = \"TREASURY\"\n").unwrap();
        let reason = readiness(&config, OperationKind::Clawback).unwrap_err();
        assert!(reason.contains("token_contract"));
    }
}
