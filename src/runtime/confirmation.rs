//! Bounded confirmation polling.
//!
//! After a transfer is accepted the waiter alternates between querying its
//! status and blocking until the network passes the next round. The round
//! budget turns a network that never confirms into a typed `Expired` state
//! instead of an endless wait, and every network call is bounded by a
//! wall-clock timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::{ConfirmationStatus, Round, TxId};
use crate::error::LedgerError;
use crate::infrastructure::config::batch::ConfirmationConfig;
use crate::port::LedgerClient;

/// Limits applied while waiting for a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Round waits allowed before giving up.
    pub max_rounds: u64,
    /// Wall-clock bound on each network call.
    pub round_timeout: Duration,
}

impl ConfirmationPolicy {
    #[must_use]
    pub const fn new(max_rounds: u64, round_timeout: Duration) -> Self {
        Self {
            max_rounds,
            round_timeout,
        }
    }
}

impl From<&ConfirmationConfig> for ConfirmationPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self::new(config.max_rounds, config.round_timeout())
    }
}

/// Terminal result of one confirmation wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    Confirmed(Round),
    Expired { rounds_waited: u64 },
    Failed(LedgerError),
}

/// Polls a ledger until a transaction commits or the budget is spent.
pub struct ConfirmationWaiter<'a> {
    ledger: &'a dyn LedgerClient,
    policy: ConfirmationPolicy,
}

impl<'a> ConfirmationWaiter<'a> {
    pub fn new(ledger: &'a dyn LedgerClient, policy: ConfirmationPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Drive `tx_id` to a terminal [`WaitState`].
    ///
    /// The status is queried at most `max_rounds + 1` times and the network
    /// is waited on at most `max_rounds` times.
    pub async fn wait(&self, tx_id: &TxId) -> WaitState {
        let mut round = match self.bounded(self.ledger.current_round()).await {
            Ok(round) => round,
            Err(err) => return WaitState::Failed(err),
        };
        let mut status = ConfirmationStatus::Pending;
        let mut rounds_waited = 0;

        let state = loop {
            let observed = match self.bounded(self.ledger.pending_status(tx_id)).await {
                Err(err) => break WaitState::Failed(err),
                Ok(pending) => {
                    if let Some(committed) = pending.committed_round() {
                        ConfirmationStatus::Confirmed(committed)
                    } else if let Some(reason) = pending.pool_error.filter(|e| !e.is_empty()) {
                        // The node evicted the transaction from its pool.
                        break WaitState::Failed(LedgerError::Rejected(reason));
                    } else if rounds_waited >= self.policy.max_rounds {
                        ConfirmationStatus::Expired
                    } else {
                        ConfirmationStatus::Pending
                    }
                }
            };

            status = status.advance(observed);
            match status {
                ConfirmationStatus::Confirmed(committed) => break WaitState::Confirmed(committed),
                ConfirmationStatus::Expired => break WaitState::Expired { rounds_waited },
                ConfirmationStatus::Pending => {}
            }

            debug!(tx_id = %tx_id, round = %round, rounds_waited, "Transaction pending");
            match self.bounded(self.ledger.wait_for_round_after(round)).await {
                Ok(latest) => {
                    round = latest.max(round.next());
                    rounds_waited += 1;
                }
                Err(err) => break WaitState::Failed(err),
            }
        };

        match &state {
            WaitState::Confirmed(committed) => {
                debug!(tx_id = %tx_id, round = %committed, "Transaction confirmed");
            }
            WaitState::Expired { rounds_waited } => {
                warn!(tx_id = %tx_id, rounds_waited, "Transaction not confirmed within round budget");
            }
            WaitState::Failed(err) => {
                warn!(tx_id = %tx_id, error = %err, "Confirmation polling failed");
            }
        }
        state
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        bounded(self.policy.round_timeout, call).await
    }
}

/// Run a port call with a wall-clock limit, mapping expiry to
/// [`LedgerError::Timeout`].
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, LedgerError>>,
) -> Result<T, LedgerError> {
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(limit)),
    }
}
