//! Ledger node connection settings.

use serde::Deserialize;

fn default_algod_url() -> String {
    "http://localhost:4001".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Connection to the algod REST API.
///
/// The API token is read from `DISBURSE_ALGOD_TOKEN` at load time, never
/// from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the node (e.g. `https://mainnet-api.voi.nodely.dev`).
    #[serde(default = "default_algod_url")]
    pub algod_url: String,

    /// Total timeout for one HTTP request (milliseconds).
    ///
    /// Round waits use the confirmation `round_timeout_secs` instead.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// TCP connect timeout (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// API token, from `DISBURSE_ALGOD_TOKEN`.
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            algod_url: default_algod_url(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            api_token: None,
        }
    }
}
