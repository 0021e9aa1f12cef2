//! Transfer intents and batch operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{Address, ContractId, TxId};

/// What a single transfer does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransferKind {
    /// Pay a fixed amount of native currency.
    Payment,
    /// Empty the source's whole native balance and deactivate it.
    CloseOut,
    /// Transfer a token governed by a contract.
    Token {
        /// Token contract.
        contract: ContractId,
    },
}

/// One transfer to be built and signed. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    pub source: Address,
    pub destination: Address,
    pub amount: u64,
    pub kind: TransferKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_to: Option<Address>,
}

impl TransferIntent {
    /// Native payment of `amount`.
    pub fn payment(source: Address, destination: Address, amount: u64) -> Self {
        Self {
            source,
            destination,
            amount,
            kind: TransferKind::Payment,
            close_to: None,
        }
    }

    /// Close-out of `source` into `destination`.
    ///
    /// The amount is zero; the remainder goes to `close_to`.
    pub fn close_out(source: Address, destination: Address) -> Self {
        Self {
            source,
            close_to: Some(destination.clone()),
            destination,
            amount: 0,
            kind: TransferKind::CloseOut,
        }
    }

    /// Token transfer of `amount` units of `contract`.
    pub fn token(source: Address, destination: Address, contract: ContractId, amount: u64) -> Self {
        Self {
            source,
            destination,
            amount,
            kind: TransferKind::Token { contract },
            close_to: None,
        }
    }
}

/// Signed transfer bytes, ready for submission.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransfer(Vec<u8>);

impl SignedTransfer {
    /// Wrap signed bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no bytes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SignedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedTransfer({} bytes)", self.0.len())
    }
}

/// Result of handing a signed transfer to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// Accepted into the pool.
    Accepted(TxId),
    /// Refused immediately (malformed, overspend, stale validity window).
    Rejected {
        /// Reason reported by the node.
        reason: String,
    },
}

/// Explicit tag naming a batch operation.
///
/// Used for log fields and failure file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    FundNative,
    FundToken,
    CloseOut,
    Clawback,
}

impl OperationKind {
    /// All operation kinds.
    pub const ALL: [Self; 4] = [
        Self::FundNative,
        Self::FundToken,
        Self::CloseOut,
        Self::Clawback,
    ];

    /// Stable tag (`fund-native`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FundNative => "fund-native",
            Self::FundToken => "fund-token",
            Self::CloseOut => "close-out",
            Self::Clawback => "clawback",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "unknown operation '{s}' (expected one of: fund-native, fund-token, close-out, clawback)"
                )
            })
    }
}

/// A batch action applied to every account.
///
/// The treasury is the source of funding operations and the destination of
/// close-out and clawback operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Treasury pays `amount` native units to each account.
    FundNative { amount: u64 },
    /// Treasury sends `amount` tokens of `contract` to each account.
    FundToken { contract: ContractId, amount: u64 },
    /// Each account closes its native balance into the treasury.
    CloseOut { fee: u64 },
    /// Each account returns its whole token balance, then closes out.
    Clawback { contract: ContractId, fee: u64 },
}

impl Operation {
    /// Tag for this operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::FundNative { .. } => OperationKind::FundNative,
            Self::FundToken { .. } => OperationKind::FundToken,
            Self::CloseOut { .. } => OperationKind::CloseOut,
            Self::Clawback { .. } => OperationKind::Clawback,
        }
    }

    /// True when each account signs its own transfers (treasury signs otherwise).
    #[must_use]
    pub const fn signed_by_account(&self) -> bool {
        matches!(self, Self::CloseOut { .. } | Self::Clawback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_out_sets_close_to_and_zero_amount() {
        let intent = TransferIntent::close_out(Address::new("SRC"), Address::new("TREASURY"));
        assert_eq!(intent.amount, 0);
        assert_eq!(intent.close_to, Some(Address::new("TREASURY")));
        assert_eq!(intent.kind, TransferKind::CloseOut);
    }

    #[test]
    fn intent_serializes_with_tagged_kind() {
        let intent = TransferIntent::token(
            Address::new("A"),
            Address::new("B"),
            ContractId::new(6779767),
            5,
        );
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["kind"]["type"], "token");
        assert_eq!(value["kind"]["contract"], 6779767);
        assert!(value.get("closeTo").is_none());
    }

    #[test]
    fn operation_kind_round_trips_through_str() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert!("fund".parse::<OperationKind>().is_err());
    }

    #[test]
    fn signed_transfer_debug_hides_bytes() {
        let signed = SignedTransfer::new(vec![1, 2, 3]);
        assert_eq!(format!("{signed:?}"), "SignedTransfer(3 bytes)");
    }

    #[test]
    fn signer_depends_on_operation() {
        assert!(!Operation::FundNative { amount: 1 }.signed_by_account());
        assert!(Operation::CloseOut { fee: 1000 }.signed_by_account());
        assert!(Operation::Clawback {
            contract: ContractId::new(1),
            fee: 1000
        }
        .signed_by_account());
    }
}
