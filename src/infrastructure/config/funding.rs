//! Treasury, funding amounts and signer configuration.

use serde::Deserialize;

use crate::domain::{Account, Address, ContractId, KeyHandle, Operation, OperationKind, Treasury};
use crate::error::ConfigError;

const fn default_close_out_fee() -> u64 {
    1000 // network minimum fee
}

/// Amounts and contract used by the batch operations.
///
/// Native and token amounts are configured independently.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingConfig {
    /// Native base units paid per account by `fund-native`.
    #[serde(default)]
    pub native_amount: u64,

    /// Token units sent per account by `fund-token`.
    #[serde(default)]
    pub token_amount: u64,

    /// Token contract (application id) for `fund-token` and `clawback`.
    #[serde(default)]
    pub token_contract: Option<u64>,

    /// Flat fee for close-out transfers.
    #[serde(default = "default_close_out_fee")]
    pub close_out_fee: u64,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            native_amount: 0,
            token_amount: 0,
            token_contract: None,
            close_out_fee: default_close_out_fee(),
        }
    }
}

impl FundingConfig {
    /// Build the operation for `kind` from these settings.
    ///
    /// # Errors
    ///
    /// Fails when the settings that `kind` needs are missing or zero.
    pub fn operation(&self, kind: OperationKind) -> Result<Operation, ConfigError> {
        match kind {
            OperationKind::FundNative => {
                if self.native_amount == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "native_amount",
                        reason: "must be greater than 0 for fund-native".to_string(),
                    });
                }
                Ok(Operation::FundNative {
                    amount: self.native_amount,
                })
            }
            OperationKind::FundToken => {
                if self.token_amount == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "token_amount",
                        reason: "must be greater than 0 for fund-token".to_string(),
                    });
                }
                Ok(Operation::FundToken {
                    contract: self.contract()?,
                    amount: self.token_amount,
                })
            }
            OperationKind::CloseOut => Ok(Operation::CloseOut {
                fee: self.close_out_fee,
            }),
            OperationKind::Clawback => Ok(Operation::Clawback {
                contract: self.contract()?,
                fee: self.close_out_fee,
            }),
        }
    }

    fn contract(&self) -> Result<ContractId, ConfigError> {
        self.token_contract
            .map(ContractId::new)
            .ok_or(ConfigError::MissingField {
                field: "token_contract",
            })
    }
}

/// The treasury account that funds and receives clawbacks.
///
/// Key handle is loaded from `DISBURSE_TREASURY_KEY` at runtime (never from
/// the config file).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreasuryConfig {
    /// Treasury public address.
    #[serde(default)]
    pub address: String,

    /// Key handle from `DISBURSE_TREASURY_KEY`.
    #[serde(skip)]
    pub key: Option<KeyHandle>,
}

impl TreasuryConfig {
    /// Treasury described by this section; `None` without an address.
    ///
    /// Without a key the treasury can only receive.
    #[must_use]
    pub fn treasury(&self) -> Option<Treasury> {
        let address = self.address.trim();
        if address.is_empty() {
            return None;
        }
        Some(match self.key.clone().filter(|key| !key.is_empty()) {
            Some(key) => Treasury::signing(Account::new(Address::new(address), key)),
            None => Treasury::receive_only(address),
        })
    }
}

/// External signing helper.
///
/// The helper receives one JSON request on stdin per invocation and writes
/// signed bytes (or a JSON answer) to stdout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignerConfig {
    /// Program and arguments, e.g. `["voi-sign", "--network", "mainnet"]`.
    #[serde(default)]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fund_token_requires_contract() {
        let funding = FundingConfig {
            token_amount: 5,
            ..FundingConfig::default()
        };
        assert!(matches!(
            funding.operation(OperationKind::FundToken),
            Err(ConfigError::MissingField {
                field: "token_contract"
            })
        ));
    }

    #[test]
    fn amounts_are_independent() {
        let funding = FundingConfig {
            native_amount: 100_000,
            token_amount: 7,
            token_contract: Some(42),
            close_out_fee: 1000,
        };
        assert_eq!(
            funding.operation(OperationKind::FundNative).unwrap(),
            Operation::FundNative { amount: 100_000 }
        );
        assert_eq!(
            funding.operation(OperationKind::FundToken).unwrap(),
            Operation::FundToken {
                contract: ContractId::new(42),
                amount: 7
            }
        );
    }

    #[test]
    fn zero_native_amount_is_rejected() {
        let funding = FundingConfig::default();
        assert!(funding.operation(OperationKind::FundNative).is_err());
        assert!(funding.operation(OperationKind::CloseOut).is_ok());
    }

    #[test]
    fn treasury_key_is_optional() {
        let mut treasury = TreasuryConfig {
            address: " TREASURY ".into(),
            key: None,
        };
        let receive_only = treasury.treasury().unwrap();
        assert_eq!(receive_only.address().as_str(), "TREASURY");
        assert!(receive_only.account().is_none());

        treasury.key = Some(KeyHandle::new("secret"));
        assert!(treasury.treasury().unwrap().account().is_some());

        treasury.address = String::new();
        assert!(treasury.treasury().is_none());
    }
}
