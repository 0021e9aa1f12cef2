//! Per-account outcomes and batch results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{Address, BatchId, Round, TxId};
use super::transfer::OperationKind;

/// Confirmation progress of a submitted transfer.
///
/// Transitions are monotonic: `Pending` may become `Confirmed` or
/// `Expired`; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed(Round),
    Expired,
}

impl ConfirmationStatus {
    /// True for `Confirmed` and `Expired`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Apply an observed status, ignoring anything that would leave a
    /// terminal state.
    #[must_use]
    pub const fn advance(self, observed: Self) -> Self {
        if self.is_terminal() {
            self
        } else {
            observed
        }
    }
}

/// Classification of a per-account failure.
///
/// Determines whether a later retry invocation may safely resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Timeout or connection failure.
    ///
    /// Nothing is on-chain unless the network had already accepted the
    /// transfer, in which case the record carries its tx id.
    Transient,
    /// The network refused the transfer.
    Rejection,
    /// Accepted but not observed committed within the round budget.
    ///
    /// It may still commit; resubmitting risks a double spend.
    Expired,
    /// Never dispatched because the batch was cancelled.
    Cancelled,
    /// The executor itself failed (panicked).
    Internal,
}

impl FailureClass {
    /// Stable lowercase tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Rejection => "rejection",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }

    /// True when no failure of this class can leave a pending transfer.
    ///
    /// A failure that carries a tx id may still commit whatever its class.
    #[must_use]
    pub const fn is_safe_to_retry(self) -> bool {
        !matches!(self, Self::Expired)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Transfer committed.
    Confirmed { tx_id: TxId, round: Round },
    /// Precondition not met (e.g. balance already zero). Not an error.
    Skipped { reason: String },
    /// Anything else.
    Failed {
        class: FailureClass,
        detail: String,
        tx_id: Option<TxId>,
    },
}

/// Outcome for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    address: Address,
    outcome: Outcome,
}

impl OutcomeRecord {
    pub fn confirmed(address: Address, tx_id: TxId, round: Round) -> Self {
        Self {
            address,
            outcome: Outcome::Confirmed { tx_id, round },
        }
    }

    pub fn skipped(address: Address, reason: impl Into<String>) -> Self {
        Self {
            address,
            outcome: Outcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(
        address: Address,
        class: FailureClass,
        detail: impl Into<String>,
        tx_id: Option<TxId>,
    ) -> Self {
        Self {
            address,
            outcome: Outcome::Failed {
                class,
                detail: detail.into(),
                tx_id,
            },
        }
    }

    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    #[must_use]
    pub const fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Confirmed and skipped records both count as success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }

    /// Failure classification, if this record is a failure.
    #[must_use]
    pub const fn failure_class(&self) -> Option<FailureClass> {
        match &self.outcome {
            Outcome::Failed { class, .. } => Some(*class),
            _ => None,
        }
    }
}

/// All outcomes of one batch invocation.
///
/// Holds exactly one record per input account. The success/failure split is
/// computed on demand.
#[derive(Debug, Clone)]
pub struct BatchResult {
    batch_id: BatchId,
    operation: OperationKind,
    records: Vec<OutcomeRecord>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn new(
        batch_id: BatchId,
        operation: OperationKind,
        records: Vec<OutcomeRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id,
            operation,
            records,
            started_at,
            finished_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    #[must_use]
    pub const fn operation(&self) -> OperationKind {
        self.operation
    }

    #[must_use]
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome(), Outcome::Skipped { .. }))
            .count()
    }

    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_never_reverts() {
        let confirmed = ConfirmationStatus::Confirmed(Round::new(5));
        assert_eq!(confirmed.advance(ConfirmationStatus::Pending), confirmed);
        assert_eq!(
            ConfirmationStatus::Expired.advance(ConfirmationStatus::Confirmed(Round::new(9))),
            ConfirmationStatus::Expired
        );
        assert_eq!(
            ConfirmationStatus::Pending.advance(ConfirmationStatus::Expired),
            ConfirmationStatus::Expired
        );
    }

    #[test]
    fn skipped_counts_as_success() {
        let record = OutcomeRecord::skipped(Address::new("A"), "already empty");
        assert!(record.is_success());
        assert_eq!(record.failure_class(), None);
    }

    #[test]
    fn partition_is_derived_from_records() {
        let result = BatchResult::new(
            BatchId::new(),
            OperationKind::CloseOut,
            vec![
                OutcomeRecord::skipped(Address::new("A"), "already empty"),
                OutcomeRecord::confirmed(Address::new("B"), TxId::new("TX"), Round::new(12)),
                OutcomeRecord::failed(
                    Address::new("C"),
                    FailureClass::Rejection,
                    "overspend",
                    None,
                ),
            ],
            Utc::now(),
        );

        assert_eq!(result.len(), 3);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failures().next().unwrap().address().as_str(), "C");
    }

    #[test]
    fn only_expired_is_unsafe_to_retry() {
        assert!(!FailureClass::Expired.is_safe_to_retry());
        assert!(FailureClass::Transient.is_safe_to_retry());
        assert!(FailureClass::Cancelled.is_safe_to_retry());
    }
}
