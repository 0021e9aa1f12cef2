//! algod REST response bodies.
//!
//! Field names follow the node's kebab-case JSON. Only the fields the
//! runtime needs are modelled; everything else is ignored.

use serde::Deserialize;

use crate::domain::{NetworkParameters, Round};

/// Validity window length applied to every transfer, in rounds.
pub const VALIDITY_WINDOW: u64 = 1000;

/// `GET /v2/transactions/params`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionParams {
    pub fee: u64,
    pub min_fee: u64,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: String,
}

impl TransactionParams {
    /// Snapshot valid from the node's last round for [`VALIDITY_WINDOW`]
    /// rounds.
    #[must_use]
    pub fn into_network_parameters(self) -> NetworkParameters {
        NetworkParameters {
            fee: self.fee,
            min_fee: self.min_fee,
            flat_fee: false,
            first_valid: Round::new(self.last_round),
            last_valid: Round::new(self.last_round.saturating_add(VALIDITY_WINDOW)),
            genesis_id: self.genesis_id,
            genesis_hash: self.genesis_hash,
        }
    }
}

/// `GET /v2/accounts/{address}`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInformation {
    pub amount: u64,
}

/// `POST /v2/transactions`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "txId")]
    pub tx_id: String,
}

/// `GET /v2/transactions/pending/{txid}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PendingTransaction {
    #[serde(default)]
    pub confirmed_round: Option<u64>,
    #[serde(default)]
    pub pool_error: Option<String>,
}

/// `GET /v2/status` and `GET /v2/status/wait-for-block-after/{round}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeStatus {
    pub last_round: u64,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_open_a_window_at_last_round() {
        let body = r#"{
            "consensus-version": "https://github.com/algorandfoundation/specs/tree/925a46433742afb0b51bb939354bd907fa88bf95",
            "fee": 0,
            "genesis-hash": "IXnoWtviVVJW5LGivNFc0Dq14V3kqaXuK2u5OQrdVZo=",
            "genesis-id": "voimain-v1.0",
            "last-round": 5000000,
            "min-fee": 1000
        }"#;
        let params: TransactionParams = serde_json::from_str(body).unwrap();
        let params = params.into_network_parameters();

        assert_eq!(params.first_valid, Round::new(5_000_000));
        assert_eq!(params.last_valid, Round::new(5_001_000));
        assert_eq!(params.min_fee, 1000);
        assert_eq!(params.genesis_id, "voimain-v1.0");
        assert!(!params.flat_fee);
    }

    #[test]
    fn pending_transaction_tolerates_missing_fields() {
        let pending: PendingTransaction = serde_json::from_str(r#"{"pool-error": ""}"#).unwrap();
        assert_eq!(pending.confirmed_round, None);

        let pending: PendingTransaction =
            serde_json::from_str(r#"{"confirmed-round": 42, "pool-error": "", "txn": {}}"#).unwrap();
        assert_eq!(pending.confirmed_round, Some(42));
    }
}
