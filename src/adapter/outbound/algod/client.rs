//! algod REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::dto::{
    AccountInformation, ErrorResponse, NodeStatus, PendingTransaction, SubmitResponse,
    TransactionParams,
};
use crate::domain::{Address, NetworkParameters, Round, SignedTransfer, SubmissionResult, TxId};
use crate::error::{ConfigError, LedgerError};
use crate::infrastructure::config::ledger::LedgerConfig;
use crate::port::{LedgerClient, PendingStatus};

const API_KEY_HEADER: &str = "X-API-Key";

/// [`LedgerClient`] backed by an algod node.
pub struct AlgodClient {
    http: HttpClient,
    base_url: Url,
    api_token: Option<String>,
    /// Per-request timeout for `wait-for-block-after`, which legitimately
    /// blocks until the next round.
    round_wait_timeout: Duration,
}

impl AlgodClient {
    /// Create a client with default HTTP settings.
    #[must_use]
    pub fn new(base_url: Url, api_token: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url,
            api_token,
            round_wait_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &LedgerConfig, round_wait_timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.algod_url).map_err(|e| ConfigError::InvalidValue {
            field: "algod_url",
            reason: e.to_string(),
        })?;

        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Ok(Self {
            http,
            base_url,
            api_token: config.api_token.clone(),
            round_wait_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.header(API_KEY_HEADER, token),
            None => request,
        }
    }

    async fn get_json<T>(&self, path: &str, timeout: Option<Duration>) -> Result<T, LedgerError>
    where
        T: DeserializeOwned,
    {
        let mut request = self.authorize(self.http.get(self.endpoint(path)));
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(classify_status(status, message));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for AlgodClient {
    async fn network_parameters(&self) -> Result<NetworkParameters, LedgerError> {
        let params: TransactionParams = self.get_json("v2/transactions/params", None).await?;
        Ok(params.into_network_parameters())
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let info: AccountInformation = self
            .get_json(&format!("v2/accounts/{address}?exclude=all"), None)
            .await?;
        Ok(info.amount)
    }

    async fn submit(&self, signed: &SignedTransfer) -> Result<SubmissionResult, LedgerError> {
        let request = self
            .http
            .post(self.endpoint("v2/transactions"))
            .header(CONTENT_TYPE, "application/x-binary")
            .body(signed.as_bytes().to_vec());
        let response = self.authorize(request).send().await.map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() {
            let reason = error_message(response).await;
            debug!(status = %status, reason = %reason, "Transaction rejected");
            return Ok(SubmissionResult::Rejected { reason });
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(classify_status(status, message));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        Ok(SubmissionResult::Accepted(TxId::new(body.tx_id)))
    }

    async fn pending_status(&self, tx_id: &TxId) -> Result<PendingStatus, LedgerError> {
        let pending: PendingTransaction = self
            .get_json(&format!("v2/transactions/pending/{tx_id}?format=json"), None)
            .await?;
        Ok(PendingStatus {
            confirmed_round: pending.confirmed_round.map(Round::new),
            pool_error: pending.pool_error.filter(|e| !e.is_empty()),
        })
    }

    async fn current_round(&self) -> Result<Round, LedgerError> {
        let status: NodeStatus = self.get_json("v2/status", None).await?;
        Ok(Round::new(status.last_round))
    }

    async fn wait_for_round_after(&self, round: Round) -> Result<Round, LedgerError> {
        let status: NodeStatus = self
            .get_json(
                &format!("v2/status/wait-for-block-after/{round}"),
                Some(self.round_wait_timeout),
            )
            .await?;
        Ok(Round::new(status.last_round))
    }

    fn ledger_name(&self) -> &'static str {
        "algod"
    }
}

fn transport_error(err: reqwest::Error) -> LedgerError {
    if err.is_timeout() {
        LedgerError::Transport(format!("request timed out: {err}"))
    } else {
        LedgerError::Transport(err.to_string())
    }
}

/// Map a non-success status outside of submission.
fn classify_status(status: StatusCode, message: String) -> LedgerError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        LedgerError::Transport(format!("{status}: {message}"))
    } else {
        LedgerError::InvalidResponse(format!("{status}: {message}"))
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| if body.is_empty() { status.to_string() } else { body }),
        Err(_) => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureClass;

    #[test]
    fn server_errors_are_transient() {
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, "catching up".into());
        assert_eq!(err.classification(), FailureClass::Transient);
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert_eq!(err.classification(), FailureClass::Transient);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = AlgodClient::new(Url::parse("http://localhost:4001/").unwrap(), None);
        assert_eq!(
            client.endpoint("v2/status"),
            "http://localhost:4001/v2/status"
        );
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = AlgodClient::new(Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(), None);
        let err = client.current_round().await.unwrap_err();

        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[test]
    fn invalid_url_is_a_config_error() {
        let config = LedgerConfig {
            algod_url: "not a url".into(),
            ..LedgerConfig::default()
        };
        let result = AlgodClient::from_config(&config, Duration::from_secs(1));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "algod_url", .. })
        ));
    }
}
