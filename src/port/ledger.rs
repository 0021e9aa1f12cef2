//! Ledger node port.

use async_trait::async_trait;

use crate::domain::{Address, NetworkParameters, Round, SignedTransfer, SubmissionResult, TxId};
use crate::error::LedgerError;

/// Status of a submitted transaction as reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingStatus {
    /// Round in which the transaction committed, if it has.
    pub confirmed_round: Option<Round>,
    /// Non-empty when the node dropped the transaction from its pool.
    pub pool_error: Option<String>,
}

impl PendingStatus {
    /// Still waiting in the pool.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            confirmed_round: None,
            pool_error: None,
        }
    }

    /// Committed in `round`.
    #[must_use]
    pub const fn confirmed(round: Round) -> Self {
        Self {
            confirmed_round: Some(round),
            pool_error: None,
        }
    }

    /// Committed round, treating round zero as not committed.
    #[must_use]
    pub fn committed_round(&self) -> Option<Round> {
        self.confirmed_round.filter(|round| round.get() > 0)
    }
}

/// Access to a ledger node.
///
/// Every method may fail or time out; callers turn errors into outcome
/// records rather than propagating them.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Snapshot of the parameters needed to build transfers.
    async fn network_parameters(&self) -> Result<NetworkParameters, LedgerError>;

    /// Native balance of `address` in base units.
    async fn balance(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Hand signed bytes to the network.
    async fn submit(&self, signed: &SignedTransfer) -> Result<SubmissionResult, LedgerError>;

    /// Pool/commit status of a transaction.
    async fn pending_status(&self, tx_id: &TxId) -> Result<PendingStatus, LedgerError>;

    /// Latest round known to the node.
    async fn current_round(&self) -> Result<Round, LedgerError>;

    /// Block until the node has seen a round after `round`; returns the new
    /// latest round.
    async fn wait_for_round_after(&self, round: Round) -> Result<Round, LedgerError>;

    /// Name for logs.
    fn ledger_name(&self) -> &'static str;
}
