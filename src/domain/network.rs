//! Network state snapshot used to build transfers.

use serde::{Deserialize, Serialize};

use super::id::Round;

/// Snapshot of the network state required to build a valid transfer.
///
/// Fetched once per batch and shared read-only by every task of that batch.
/// A long batch can outlive the validity window; transfers built after
/// `last_valid` are rejected by the network and recorded as failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParameters {
    /// Fee per byte suggested by the node.
    pub fee: u64,
    /// Minimum fee per transaction.
    pub min_fee: u64,
    /// When true, `fee` is the total fee rather than a per-byte rate.
    pub flat_fee: bool,
    /// First round in which the transfer is valid.
    pub first_valid: Round,
    /// Last round in which the transfer is valid.
    pub last_valid: Round,
    /// Network identifier.
    pub genesis_id: String,
    /// Genesis block hash (base64, as reported by the node).
    pub genesis_hash: String,
}

impl NetworkParameters {
    /// Copy of these parameters with a flat total fee.
    #[must_use]
    pub fn with_flat_fee(&self, fee: u64) -> Self {
        Self {
            fee,
            flat_fee: true,
            ..self.clone()
        }
    }

    /// Number of rounds in the validity window.
    #[must_use]
    pub fn window_len(&self) -> u64 {
        self.last_valid.get().saturating_sub(self.first_valid.get())
    }

    /// True when `round` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, round: Round) -> bool {
        round >= self.first_valid && round <= self.last_valid
    }
}
