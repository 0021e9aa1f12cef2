//! Failure aggregation and persistence.
//!
//! The failure file is the handoff to a later retry run: a JSON array of
//! `{ publicKey, error, classification, txId? }` entries written to
//! `<output_dir>/failed_<operation>_wallets.json`. It carries public
//! identities only. When nothing failed no file is left at that path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{Address, BatchResult, FailureClass, OperationKind, Outcome, TxId};
use crate::error::Result;

/// One failed account, as written to the failure file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    #[serde(rename = "publicKey")]
    pub public_key: Address,
    pub error: String,
    pub classification: FailureClass,
    #[serde(rename = "txId", default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<TxId>,
}

impl FailureEntry {
    /// True when the network accepted the transfer, so it may have committed
    /// after the run stopped watching it.
    #[must_use]
    pub fn may_have_committed(&self) -> bool {
        self.tx_id.is_some() || !self.classification.is_safe_to_retry()
    }
}

/// Partitioned view of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    operation: OperationKind,
    total: usize,
    confirmed: usize,
    skipped: usize,
    failures: Vec<FailureEntry>,
    carried: usize,
}

impl FailureReport {
    /// Partition `result` into successes and failure entries.
    pub fn from_batch(result: &BatchResult) -> Self {
        let failures = result
            .records()
            .iter()
            .filter_map(|record| match record.outcome() {
                Outcome::Failed {
                    class,
                    detail,
                    tx_id,
                } => Some(FailureEntry {
                    public_key: record.address().clone(),
                    error: detail.clone(),
                    classification: *class,
                    tx_id: tx_id.clone(),
                }),
                _ => None,
            })
            .collect();

        Self {
            operation: result.operation(),
            total: result.len(),
            confirmed: result.success_count() - result.skipped_count(),
            skipped: result.skipped_count(),
            failures,
            carried: 0,
        }
    }

    /// Keep failures from an earlier run that this batch did not process.
    ///
    /// Entries for accounts already present in the report are dropped.
    #[must_use]
    pub fn carry_forward(mut self, entries: impl IntoIterator<Item = FailureEntry>) -> Self {
        for entry in entries {
            if self
                .failures
                .iter()
                .all(|existing| existing.public_key != entry.public_key)
            {
                self.failures.push(entry);
                self.carried += 1;
            }
        }
        self
    }

    #[must_use]
    pub const fn operation(&self) -> OperationKind {
        self.operation
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub const fn confirmed(&self) -> usize {
        self.confirmed
    }

    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Failures taken over from an earlier run.
    #[must_use]
    pub const fn carried(&self) -> usize {
        self.carried
    }

    #[must_use]
    pub fn failures(&self) -> &[FailureEntry] {
        &self.failures
    }

    /// Number of failed entries of `class`.
    #[must_use]
    pub fn count_of(&self, class: FailureClass) -> usize {
        self.failures
            .iter()
            .filter(|entry| entry.classification == class)
            .count()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write the failure file under `output_dir`, if anything failed.
    ///
    /// A clean report removes a failure file left at the same path by an
    /// earlier run, since every account it lists has now succeeded.
    pub fn persist(&self, output_dir: &Path) -> Result<PersistOutcome> {
        let path = failure_file_path(output_dir, self.operation);

        if self.is_clean() {
            let cleared = match fs::remove_file(&path) {
                Ok(()) => Some(path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => None,
                Err(err) => return Err(err.into()),
            };
            info!(
                operation = %self.operation,
                total = self.total,
                confirmed = self.confirmed,
                skipped = self.skipped,
                cleared = cleared.is_some(),
                "All transfers succeeded"
            );
            return Ok(PersistOutcome::AllSucceeded {
                count: self.total,
                cleared,
            });
        }

        fs::create_dir_all(output_dir)?;
        let json = serde_json::to_string_pretty(&self.failures)?;
        fs::write(&path, json)?;

        warn!(
            operation = %self.operation,
            failed = self.failures.len(),
            expired = self.count_of(FailureClass::Expired),
            carried = self.carried,
            path = %path.display(),
            "Failures written"
        );
        Ok(PersistOutcome::FailuresWritten {
            path,
            count: self.failures.len(),
        })
    }
}

/// What [`FailureReport::persist`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// `cleared` is the stale failure file that was removed, if any.
    AllSucceeded {
        count: usize,
        cleared: Option<PathBuf>,
    },
    FailuresWritten { path: PathBuf, count: usize },
}

/// `<output_dir>/failed_<operation>_wallets.json`.
pub fn failure_file_path(output_dir: &Path, operation: OperationKind) -> PathBuf {
    output_dir.join(format!("failed_{}_wallets.json", operation.as_str().replace('-', "_")))
}

/// Read a failure file written by [`FailureReport::persist`].
pub fn read_failure_file(path: &Path) -> Result<Vec<FailureEntry>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchId, OutcomeRecord, Round};
    use chrono::Utc;
    use tempfile::tempdir;

    fn batch(records: Vec<OutcomeRecord>) -> BatchResult {
        BatchResult::new(BatchId::new(), OperationKind::CloseOut, records, Utc::now())
    }

    #[test]
    fn clean_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let report = FailureReport::from_batch(&batch(vec![
            OutcomeRecord::confirmed(Address::new("A"), TxId::new("T1"), Round::new(9)),
            OutcomeRecord::skipped(Address::new("B"), "native balance is zero"),
        ]));

        let outcome = report.persist(dir.path()).unwrap();

        assert_eq!(
            outcome,
            PersistOutcome::AllSucceeded {
                count: 2,
                cleared: None
            }
        );
        assert_eq!(report.confirmed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failure_file_holds_one_entry_per_failure() {
        let dir = tempdir().unwrap();
        let report = FailureReport::from_batch(&batch(vec![
            OutcomeRecord::confirmed(Address::new("A"), TxId::new("T1"), Round::new(9)),
            OutcomeRecord::failed(Address::new("B"), FailureClass::Rejection, "overspend", None),
            OutcomeRecord::failed(
                Address::new("C"),
                FailureClass::Expired,
                "not confirmed after 10 rounds",
                Some(TxId::new("T3")),
            ),
        ]));

        let outcome = report.persist(dir.path()).unwrap();

        let path = dir.path().join("failed_close_out_wallets.json");
        assert_eq!(
            outcome,
            PersistOutcome::FailuresWritten {
                path: path.clone(),
                count: 2
            }
        );
        let entries = read_failure_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].public_key, Address::new("B"));
        assert_eq!(entries[0].error, "overspend");
        assert_eq!(entries[1].tx_id, Some(TxId::new("T3")));
    }

    #[test]
    fn entries_use_wallet_file_field_names() {
        let entry = FailureEntry {
            public_key: Address::new("B"),
            error: "overspend".into(),
            classification: FailureClass::Rejection,
            tx_id: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["publicKey"], "B");
        assert_eq!(value["error"], "overspend");
        assert_eq!(value["classification"], "rejection");
        assert!(value.get("txId").is_none());
        assert!(value.get("privateKey").is_none());
    }

    #[test]
    fn file_name_is_derived_from_operation_tag() {
        assert_eq!(
            failure_file_path(Path::new("out"), OperationKind::FundNative),
            Path::new("out").join("failed_fund_native_wallets.json")
        );
    }

    #[test]
    fn clean_run_clears_an_earlier_failure_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed_close_out_wallets.json");
        FailureReport::from_batch(&batch(vec![OutcomeRecord::failed(
            Address::new("B"),
            FailureClass::Rejection,
            "overspend",
            None,
        )]))
        .persist(dir.path())
        .unwrap();
        assert!(path.exists());

        let retried = FailureReport::from_batch(&batch(vec![OutcomeRecord::confirmed(
            Address::new("B"),
            TxId::new("T2"),
            Round::new(12),
        )]));
        let outcome = retried.persist(dir.path()).unwrap();

        assert_eq!(
            outcome,
            PersistOutcome::AllSucceeded {
                count: 1,
                cleared: Some(path.clone())
            }
        );
        assert!(!path.exists());
    }

    #[test]
    fn carried_entries_keep_the_failure_file() {
        let dir = tempdir().unwrap();
        let held = FailureEntry {
            public_key: Address::new("C"),
            error: "not confirmed after 10 rounds".into(),
            classification: FailureClass::Expired,
            tx_id: Some(TxId::new("T3")),
        };
        let duplicate = FailureEntry {
            public_key: Address::new("B"),
            error: "old".into(),
            classification: FailureClass::Transient,
            tx_id: None,
        };

        let report = FailureReport::from_batch(&batch(vec![
            OutcomeRecord::confirmed(Address::new("A"), TxId::new("T1"), Round::new(9)),
            OutcomeRecord::failed(Address::new("B"), FailureClass::Rejection, "overspend", None),
        ]))
        .carry_forward([held.clone(), duplicate]);

        assert_eq!(report.carried(), 1);
        let PersistOutcome::FailuresWritten { path, count } = report.persist(dir.path()).unwrap()
        else {
            panic!("expected a failure file");
        };
        assert_eq!(count, 2);
        let entries = read_failure_file(&path).unwrap();
        assert_eq!(entries[0].error, "overspend");
        assert_eq!(entries[1], held);
    }
}
