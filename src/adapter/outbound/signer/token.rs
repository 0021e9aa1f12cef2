//! Token contract calls routed through the signing helper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::command::CommandSigner;
use crate::domain::{Account, Address, ContractId, NetworkParameters, SubmissionResult};
use crate::error::LedgerError;
use crate::port::{LedgerClient, TokenContract};

/// [`TokenContract`] whose calls are built and signed by the helper and
/// submitted through a [`LedgerClient`].
pub struct HelperTokenContract {
    signer: Arc<CommandSigner>,
    ledger: Arc<dyn LedgerClient>,
}

impl HelperTokenContract {
    pub fn new(signer: Arc<CommandSigner>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { signer, ledger }
    }
}

#[async_trait]
impl TokenContract for HelperTokenContract {
    async fn balance_of(
        &self,
        contract: ContractId,
        address: &Address,
    ) -> Result<u64, LedgerError> {
        self.signer.token_balance(contract, address).await
    }

    async fn transfer(
        &self,
        contract: ContractId,
        from: &Account,
        to: &Address,
        amount: u64,
        params: &NetworkParameters,
    ) -> Result<SubmissionResult, LedgerError> {
        let signed = self
            .signer
            .sign_token_transfer(contract, from.address(), from.key(), to, amount, params)
            .await?;
        debug!(contract = %contract, from = %from.address(), to = %to, amount, "Token transfer signed");
        self.ledger.submit(&signed).await
    }
}
