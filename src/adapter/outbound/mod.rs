//! Outbound adapters (driven side).

pub mod algod;
pub mod signer;
pub mod wallet_file;
