//! Composition root: wires outbound adapters into the batch runtime.

use std::sync::Arc;

use tracing::info;

use crate::adapter::outbound::algod::AlgodClient;
use crate::adapter::outbound::signer::{CommandSigner, HelperTokenContract};
use crate::domain::Treasury;
use crate::error::{BatchError, Result};
use crate::infrastructure::config::settings::Config;
use crate::port::LedgerClient;
use crate::runtime::{
    BatchOrchestrator, ConfirmationPolicy, LedgerPorts, SchedulerLimits,
};

/// Build the ledger, signer and token ports from configuration.
#[allow(clippy::result_large_err)]
pub fn build_ports(config: &Config) -> Result<LedgerPorts> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(AlgodClient::from_config(
        &config.ledger,
        config.confirmation.round_timeout(),
    )?);
    let signer = Arc::new(CommandSigner::from_config(&config.signer)?);
    let token = Arc::new(HelperTokenContract::new(signer.clone(), ledger.clone()));

    info!(
        algod_url = %config.ledger.algod_url,
        signer = signer.program(),
        "Ledger ports ready"
    );
    Ok(LedgerPorts::new(ledger, signer, token))
}

/// The configured treasury.
#[allow(clippy::result_large_err)]
pub fn build_treasury(config: &Config) -> Result<Treasury> {
    let treasury = config
        .treasury
        .treasury()
        .ok_or_else(|| BatchError::Treasury("treasury.address is not set".to_string()))?;
    info!(
        address = %treasury.address(),
        can_sign = treasury.account().is_some(),
        "Treasury loaded"
    );
    Ok(treasury)
}

/// Build a [`BatchOrchestrator`] with every limit taken from `config`.
#[allow(clippy::result_large_err)]
pub fn build_orchestrator(config: &Config) -> Result<BatchOrchestrator> {
    let ports = build_ports(config)?;
    let treasury = build_treasury(config)?;
    Ok(BatchOrchestrator::new(
        ports,
        treasury,
        SchedulerLimits::from(&config.scheduler),
        ConfirmationPolicy::from(&config.confirmation),
    )
    .with_deadline(config.batch.deadline()))
}
