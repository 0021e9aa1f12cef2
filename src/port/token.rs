//! Token contract port.

use async_trait::async_trait;

use crate::domain::{Account, Address, ContractId, NetworkParameters, SubmissionResult};
use crate::error::LedgerError;

/// Calls against a token contract distinct from the native currency.
#[async_trait]
pub trait TokenContract: Send + Sync {
    /// Token balance of `address`.
    async fn balance_of(&self, contract: ContractId, address: &Address)
        -> Result<u64, LedgerError>;

    /// Send `amount` tokens from `from` to `to`.
    ///
    /// Returns once the transfer is submitted; confirmation is the caller's
    /// job.
    async fn transfer(
        &self,
        contract: ContractId,
        from: &Account,
        to: &Address,
        amount: u64,
        params: &NetworkParameters,
    ) -> Result<SubmissionResult, LedgerError>;
}
