//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`] - the command-line driver
//! - [`outbound`] - algod client, signing helper and accounts files

pub mod inbound;
pub mod outbound;
