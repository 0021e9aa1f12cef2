//! Infrastructure layer.
//!
//! Technical concerns that support the batch runtime without containing
//! transfer logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root wiring adapters into the runtime
//! - [`config`] - Configuration loading and validation

pub mod bootstrap;
pub mod config;
