//! algod REST integration.

pub mod client;
pub mod dto;

pub use client::AlgodClient;
