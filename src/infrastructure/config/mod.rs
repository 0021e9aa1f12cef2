//! Infrastructure configuration modules.

pub mod batch;
pub mod funding;
pub mod ledger;
pub mod logging;
pub mod settings;

pub use settings::Config;
