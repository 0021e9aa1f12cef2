//! Batch orchestration.
//!
//! One batch applies one [`Operation`] to every account. Network parameters
//! are fetched once and shared read-only by every task; each account gets
//! one scheduled task; the batch returns only after every task has reached
//! a terminal state. Batches share no mutable state, so a sequence of
//! operations over the same accounts is just a sequence of independent
//! batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use crate::domain::{
    Account, BatchId, BatchResult, FailureClass, NetworkParameters, Operation, OutcomeRecord,
    Treasury,
};
use crate::error::BatchError;

use super::confirmation::{bounded, ConfirmationPolicy};
use super::executor::{LedgerPorts, TransferExecutor};
use super::scheduler::{RateLimitedScheduler, SchedulerLimits, ShutdownHandle, TaskOutcome};

/// Called once per account as its record becomes available.
pub type ProgressHook = Arc<dyn Fn(&OutcomeRecord) + Send + Sync>;

/// Drives a [`TransferExecutor`] over a collection of accounts.
pub struct BatchOrchestrator {
    ports: LedgerPorts,
    treasury: Treasury,
    limits: SchedulerLimits,
    policy: ConfirmationPolicy,
    deadline: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
    progress: Option<ProgressHook>,
}

impl BatchOrchestrator {
    pub fn new(
        ports: LedgerPorts,
        treasury: Treasury,
        limits: SchedulerLimits,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            ports,
            treasury,
            limits,
            policy,
            deadline: None,
            cancel: None,
            progress: None,
        }
    }

    /// Stop dispatching new transfers once `deadline` has elapsed.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Stop dispatching new transfers once `cancel` flips to `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressHook) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run `operation` over `accounts`.
    ///
    /// Returns one record per account, in input order. Only batch setup
    /// (treasury checks, the parameter fetch) can fail the whole batch.
    pub async fn run(
        &self,
        operation: Operation,
        accounts: &[Account],
    ) -> Result<BatchResult, BatchError> {
        let batch_id = BatchId::new();
        let span = info_span!("batch", batch_id = %batch_id, operation = %operation.kind());
        self.run_batch(batch_id, operation, accounts)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        batch_id: BatchId,
        operation: Operation,
        accounts: &[Account],
    ) -> Result<BatchResult, BatchError> {
        let kind = operation.kind();
        let started_at = Utc::now();
        let executor = Arc::new(TransferExecutor::new(
            self.ports.clone(),
            operation,
            self.treasury.clone(),
            self.policy,
        )?);

        if accounts.is_empty() {
            info!("No accounts to process");
            return Ok(BatchResult::new(batch_id, kind, Vec::new(), started_at));
        }

        let params = Arc::new(self.fetch_parameters().await?);
        info!(
            accounts = accounts.len(),
            ledger = self.ports.ledger.ledger_name(),
            first_valid = %params.first_valid,
            last_valid = %params.last_valid,
            "Batch started"
        );

        let scheduler = RateLimitedScheduler::new(self.limits);
        let watchdog = self.spawn_watchdog(scheduler.shutdown_handle());

        let tasks = accounts.iter().cloned().map(|account| {
            let executor = executor.clone();
            let params = params.clone();
            let progress = self.progress.clone();
            move || async move {
                let record = executor.execute(&account, &params).await;
                if let Some(progress) = progress {
                    progress(&record);
                }
                record
            }
        });
        let outcomes = scheduler.run_all(tasks).await;
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let records: Vec<OutcomeRecord> = outcomes
            .into_iter()
            .zip(accounts)
            .map(|(outcome, account)| self.settle(outcome, account))
            .collect();

        let result = BatchResult::new(batch_id, kind, records, started_at);
        info!(
            succeeded = result.success_count(),
            skipped = result.skipped_count(),
            failed = result.failure_count(),
            elapsed_ms = result.elapsed().num_milliseconds(),
            "Batch finished"
        );
        Ok(result)
    }

    /// Run each operation as its own batch over the same accounts.
    ///
    /// A setup failure in one batch does not prevent the next from running.
    pub async fn run_sequence(
        &self,
        operations: impl IntoIterator<Item = Operation>,
        accounts: &[Account],
    ) -> Vec<Result<BatchResult, BatchError>> {
        let mut results = Vec::new();
        for operation in operations {
            results.push(self.run(operation, accounts).await);
        }
        results
    }

    async fn fetch_parameters(&self) -> Result<NetworkParameters, BatchError> {
        bounded(
            self.policy.round_timeout,
            self.ports.ledger.network_parameters(),
        )
        .await
        .map_err(BatchError::NetworkParameters)
    }

    /// Turn a scheduler outcome into the account's record.
    fn settle(&self, outcome: TaskOutcome<OutcomeRecord>, account: &Account) -> OutcomeRecord {
        let address = account.address().clone();
        let record = match outcome {
            TaskOutcome::Completed(record) => return record,
            TaskOutcome::Panicked(message) => OutcomeRecord::failed(
                address,
                FailureClass::Internal,
                format!("task panicked: {message}"),
                None,
            ),
            TaskOutcome::Cancelled => OutcomeRecord::failed(
                address,
                FailureClass::Cancelled,
                "batch cancelled before transfer started",
                None,
            ),
        };
        if let Some(progress) = &self.progress {
            progress(&record);
        }
        record
    }

    fn spawn_watchdog(&self, shutdown: ShutdownHandle) -> Option<JoinHandle<()>> {
        if self.deadline.is_none() && self.cancel.is_none() {
            return None;
        }
        let deadline = self.deadline;
        let cancel = self.cancel.clone();

        Some(tokio::spawn(async move {
            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep(deadline).await,
                    None => std::future::pending().await,
                }
            };
            let requested = async {
                match cancel {
                    Some(mut cancel) => loop {
                        if *cancel.borrow_and_update() {
                            break;
                        }
                        if cancel.changed().await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    },
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = expired => warn!("Batch deadline reached, cancelling queued transfers"),
                () = requested => warn!("Cancellation requested, cancelling queued transfers"),
            }
            shutdown.shutdown();
        }))
    }
}
