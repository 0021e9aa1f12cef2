//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`ledger`] - `ScriptedLedger`, an in-memory implementation of every
//!   outbound port with per-account submit scripts.
//! - [`domain`] - Builders for accounts and network parameters.
//! - [`config`] - Canonical test configurations.

pub mod config;
pub mod domain;
pub mod ledger;
