//! Inbound adapters driving the runtime.

pub mod cli;
