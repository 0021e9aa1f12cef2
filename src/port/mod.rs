//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the capabilities the batch runtime consumes but does not
//! implement: talking to a ledger node, turning an intent into signed
//! bytes, and calling a token contract.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │  runtime (scheduler,     │
//!                 │  executor, orchestrator) │
//!                 └────────────┬─────────────┘
//!        ┌─────────────────────┼──────────────────────┐
//!        ▼                     ▼                      ▼
//! ┌──────────────┐    ┌────────────────┐    ┌────────────────┐
//! │ LedgerClient │    │ TransferSigner │    │ TokenContract  │
//! │ (algod REST) │    │ (helper cmd)   │    │ (helper cmd)   │
//! └──────────────┘    └────────────────┘    └────────────────┘
//! ```

mod ledger;
mod signer;
mod token;

pub use ledger::{LedgerClient, PendingStatus};
pub use signer::TransferSigner;
pub use token::TokenContract;
