//! Handlers for the `run` and `fund` commands.

use std::path::Path;
use std::sync::Arc;

use dialoguer::{theme::ColorfulTheme, Confirm};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::{BatchArgs, FundArgs, RunArgs};
use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::wallet_file::{load_accounts, select_for_retry, RetrySelection};
use crate::domain::{
    Account, BatchResult, FailureClass, Operation, OperationKind, Outcome, OutcomeRecord,
};
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::logging::LogFormat;
use crate::infrastructure::config::settings::Config;
use crate::runtime::{
    read_failure_file, FailureEntry, FailureReport, PersistOutcome, ProgressHook,
};

/// Execute `run`. Returns `true` when every account succeeded.
pub async fn execute(args: &RunArgs) -> Result<bool> {
    let config = load_config(&args.batch)?;
    let operation = config.funding.operation(args.operation)?;
    let mut accounts = load_accounts(&args.batch.accounts)?;
    let mut held_back = Vec::new();

    if let Some(retry_from) = &args.retry_from {
        let selection = retry_accounts(accounts, retry_from, args.include_expired)?;
        accounts = selection.accounts;
        held_back = selection.held_back;
    }

    run_batches(&config, &args.batch, vec![operation], &accounts, held_back).await
}

/// Execute `fund`: native funding, then token funding, as two batches.
pub async fn execute_fund(args: &FundArgs) -> Result<bool> {
    let config = load_config(&args.batch)?;
    let operations = vec![
        config.funding.operation(OperationKind::FundNative)?,
        config.funding.operation(OperationKind::FundToken)?,
    ];
    let accounts = load_accounts(&args.batch.accounts)?;

    run_batches(&config, &args.batch, operations, &accounts, Vec::new()).await
}

/// Load configuration and start logging with CLI overrides applied.
fn load_config(args: &BatchArgs) -> Result<Config> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs || output::is_json() {
        config.logging.format = LogFormat::Json;
    }
    config.init_logging();
    Ok(config)
}

fn retry_accounts(
    accounts: Vec<Account>,
    failure_file: &Path,
    include_expired: bool,
) -> Result<RetrySelection> {
    let failures = read_failure_file(failure_file)?;
    let selection = select_for_retry(accounts, &failures, include_expired);

    output::field("Retry from", failure_file.display());
    if !selection.held_back.is_empty() {
        output::warning(&format!(
            "{} accounts with accepted transfers held back; verify them on-chain, then pass --include-expired",
            selection.held_back.len()
        ));
    }
    if !selection.unknown.is_empty() {
        output::warning(&format!(
            "{} accounts in the failure file are missing from the accounts file",
            selection.unknown.len()
        ));
    }
    Ok(selection)
}

async fn run_batches(
    config: &Config,
    args: &BatchArgs,
    operations: Vec<Operation>,
    accounts: &[Account],
    mut held_back: Vec<FailureEntry>,
) -> Result<bool> {
    let kinds: Vec<String> = operations.iter().map(|op| op.kind().to_string()).collect();

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Operation", kinds.join(" → "));
    output::field("Accounts", accounts.len());
    output::field("Treasury", &config.treasury.address);
    output::field("Algod", &config.ledger.algod_url);

    if accounts.is_empty() {
        output::success("No accounts to process");
        return Ok(true);
    }
    if !args.yes && !output::is_json() && !confirm(&kinds, accounts.len())? {
        output::warning("Aborted");
        return Ok(true);
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight transfers");
            let _ = cancel_tx.send(true);
        }
    });

    let total = accounts.len() as u64 * operations.len() as u64;
    let bar = output::progress(total, "Processing");
    let hook_bar = bar.clone();
    let progress: ProgressHook = Arc::new(move |record: &OutcomeRecord| {
        hook_bar.inc(1);
        output::event("record", record_json(record));
    });

    let orchestrator = bootstrap::build_orchestrator(config)?
        .with_cancellation(cancel_rx)
        .with_progress(progress);
    let results = orchestrator.run_sequence(operations, accounts).await;
    bar.finish_and_clear();
    interrupt.abort();

    let mut clean = true;
    for (kind, result) in kinds.iter().zip(results) {
        match result {
            Ok(batch) => clean &= report(config, &batch, std::mem::take(&mut held_back))?,
            Err(err) => {
                clean = false;
                output::error(&format!("{kind}: {err}"));
            }
        }
    }
    info!(clean, "Run finished");
    Ok(clean)
}

fn confirm(kinds: &[String], accounts: usize) -> Result<bool> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Submit {} for {accounts} accounts?",
            kinds.join(" then ")
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

/// Persist the failure file and print the batch summary.
///
/// `held_back` entries were not retried and stay in the failure file.
fn report(config: &Config, batch: &BatchResult, held_back: Vec<FailureEntry>) -> Result<bool> {
    let report = FailureReport::from_batch(batch).carry_forward(held_back);
    let persisted = report.persist(&config.batch.output_dir)?;

    output::section(&format!("{} summary", report.operation()));
    output::field("Total", report.total());
    output::field("Confirmed", report.confirmed());
    output::field("Skipped", report.skipped());
    output::field("Failed", output::negative(report.failures().len() - report.carried()));
    if report.carried() > 0 {
        output::field("Held back", report.carried());
    }
    for class in [
        FailureClass::Transient,
        FailureClass::Rejection,
        FailureClass::Expired,
        FailureClass::Cancelled,
        FailureClass::Internal,
    ] {
        let count = report.count_of(class);
        if count > 0 && output::verbosity() > 0 {
            output::field(class.as_str(), count);
        }
    }

    let failure_file = match &persisted {
        PersistOutcome::AllSucceeded { count, cleared } => {
            output::success(&format!("All {count} transfers succeeded"));
            if let Some(path) = cleared {
                output::field("Removed", path.display());
            }
            None
        }
        PersistOutcome::FailuresWritten { path, count } => {
            output::warning(&format!(
                "{count} failures written to {}",
                output::highlight(path.display())
            ));
            output::hint(&format!("retry with --retry-from {}", path.display()));
            Some(path.display().to_string())
        }
    };
    if report.count_of(FailureClass::Expired) > 0 {
        output::warning("Expired transfers may still commit; check them on-chain before retrying");
    }

    output::event(
        "summary",
        json!({
            "batchId": batch.batch_id().to_string(),
            "operation": report.operation(),
            "total": report.total(),
            "confirmed": report.confirmed(),
            "skipped": report.skipped(),
            "failed": report.failures().len() - report.carried(),
            "heldBack": report.carried(),
            "failureFile": failure_file,
        }),
    );
    Ok(report.is_clean())
}

fn record_json(record: &OutcomeRecord) -> serde_json::Value {
    match record.outcome() {
        Outcome::Confirmed { tx_id, round } => json!({
            "publicKey": record.address(),
            "status": "confirmed",
            "txId": tx_id,
            "round": round,
        }),
        Outcome::Skipped { reason } => json!({
            "publicKey": record.address(),
            "status": "skipped",
            "reason": reason,
        }),
        Outcome::Failed {
            class,
            detail,
            tx_id,
        } => json!({
            "publicKey": record.address(),
            "status": "failed",
            "classification": class,
            "error": detail,
            "txId": tx_id,
        }),
    }
}
