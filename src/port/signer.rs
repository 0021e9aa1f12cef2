//! Signing port.

use async_trait::async_trait;

use crate::domain::{KeyHandle, NetworkParameters, SignedTransfer, TransferIntent};
use crate::error::LedgerError;

/// Builds the ledger-specific encoding of an intent and signs it.
///
/// Key custody and signature algorithms live behind this trait.
#[async_trait]
pub trait TransferSigner: Send + Sync {
    async fn build_and_sign(
        &self,
        intent: &TransferIntent,
        key: &KeyHandle,
        params: &NetworkParameters,
    ) -> Result<SignedTransfer, LedgerError>;
}
