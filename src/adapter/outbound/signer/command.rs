//! Signing through an external helper process.
//!
//! Key custody and transaction encoding stay outside this process. For each
//! call the configured command is spawned, one JSON request is written to
//! its stdin, and its stdout is read back:
//!
//! | `action`         | stdout                         |
//! |------------------|--------------------------------|
//! | `sign`           | raw signed transaction bytes   |
//! | `token-transfer` | raw signed transaction bytes   |
//! | `token-balance`  | `{"balance": <u64>}`           |
//!
//! A non-zero exit status is a signing failure; the helper's stderr becomes
//! the error detail. Secrets travel on stdin only, never in argv.

use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{
    Address, ContractId, KeyHandle, NetworkParameters, SignedTransfer, TransferIntent,
};
use crate::error::{ConfigError, LedgerError};
use crate::infrastructure::config::funding::SignerConfig;
use crate::port::TransferSigner;

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub(super) enum HelperRequest<'a> {
    Sign {
        intent: &'a TransferIntent,
        key: &'a str,
        params: &'a NetworkParameters,
    },
    #[serde(rename_all = "camelCase")]
    TokenTransfer {
        contract: ContractId,
        from: &'a Address,
        key: &'a str,
        to: &'a Address,
        amount: u64,
        params: &'a NetworkParameters,
    },
    TokenBalance {
        contract: ContractId,
        address: &'a Address,
    },
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: u64,
}

/// Runs the configured helper command.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &SignerConfig) -> Result<Self, ConfigError> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or(ConfigError::MissingField {
                field: "signer.command",
            })?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Send one request and return the helper's stdout.
    pub(super) async fn call(&self, request: &HelperRequest<'_>) -> Result<Vec<u8>, LedgerError> {
        let payload =
            serde_json::to_vec(request).map_err(|e| LedgerError::Signing(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LedgerError::Signing(format!("failed to start {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                // The helper may exit before reading; its status says why.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(LedgerError::Signing(format!("failed to write request: {e}"))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LedgerError::Signing(format!("helper did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(LedgerError::Signing(detail));
        }
        if output.stdout.is_empty() {
            return Err(LedgerError::Signing(format!("{} produced no output", self.program)));
        }
        Ok(output.stdout)
    }

    /// Token balance as reported by the helper.
    pub(super) async fn token_balance(
        &self,
        contract: ContractId,
        address: &Address,
    ) -> Result<u64, LedgerError> {
        let stdout = self
            .call(&HelperRequest::TokenBalance { contract, address })
            .await?;
        let response: BalanceResponse = serde_json::from_slice(&stdout)
            .map_err(|e| LedgerError::InvalidResponse(format!("token balance: {e}")))?;
        Ok(response.balance)
    }

    /// Signed token transfer produced by the helper.
    pub(super) async fn sign_token_transfer(
        &self,
        contract: ContractId,
        from: &Address,
        key: &KeyHandle,
        to: &Address,
        amount: u64,
        params: &NetworkParameters,
    ) -> Result<SignedTransfer, LedgerError> {
        let stdout = self
            .call(&HelperRequest::TokenTransfer {
                contract,
                from,
                key: key.expose(),
                to,
                amount,
                params,
            })
            .await?;
        Ok(SignedTransfer::new(stdout))
    }
}

#[async_trait]
impl TransferSigner for CommandSigner {
    async fn build_and_sign(
        &self,
        intent: &TransferIntent,
        key: &KeyHandle,
        params: &NetworkParameters,
    ) -> Result<SignedTransfer, LedgerError> {
        let stdout = self
            .call(&HelperRequest::Sign {
                intent,
                key: key.expose(),
                params,
            })
            .await?;
        debug!(source = %intent.source, bytes = stdout.len(), "Transfer signed");
        Ok(SignedTransfer::new(stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{account, params};

    fn sh(script: &str) -> CommandSigner {
        CommandSigner::new("sh", vec!["-c".into(), script.into()])
    }

    #[tokio::test]
    async fn stdout_becomes_signed_bytes() {
        let signer = sh("cat >/dev/null; printf 'signed-bytes'");
        let acct = account(0);
        let intent = TransferIntent::payment(acct.address().clone(), Address::new("B"), 5);

        let signed = signer.build_and_sign(&intent, acct.key(), &params()).await.unwrap();

        assert_eq!(signed.as_bytes(), b"signed-bytes");
    }

    #[tokio::test]
    async fn request_is_tagged_and_carries_the_intent() {
        let signer = sh("cat");
        let acct = account(0);
        let intent = TransferIntent::close_out(acct.address().clone(), Address::new("T"));

        let signed = signer.build_and_sign(&intent, acct.key(), &params()).await.unwrap();

        let request: serde_json::Value = serde_json::from_slice(signed.as_bytes()).unwrap();
        assert_eq!(request["action"], "sign");
        assert_eq!(request["intent"]["closeTo"], "T");
        assert_eq!(request["key"], "key-0");
    }

    #[tokio::test]
    async fn failing_helper_reports_stderr() {
        let signer = sh("cat >/dev/null; echo 'unknown key format' >&2; exit 3");
        let acct = account(0);
        let intent = TransferIntent::payment(acct.address().clone(), Address::new("B"), 5);

        let err = signer.build_and_sign(&intent, acct.key(), &params()).await.unwrap_err();

        assert_eq!(err, LedgerError::Signing("unknown key format".into()));
    }

    #[tokio::test]
    async fn missing_program_is_a_signing_error() {
        let signer = CommandSigner::new("/nonexistent/disburse-signer", Vec::new());
        let acct = account(0);
        let intent = TransferIntent::payment(acct.address().clone(), Address::new("B"), 5);

        let err = signer.build_and_sign(&intent, acct.key(), &params()).await.unwrap_err();

        assert!(matches!(err, LedgerError::Signing(_)));
    }

    #[tokio::test]
    async fn token_balance_is_parsed_from_json() {
        let signer = sh(r#"cat >/dev/null; echo '{"balance": 42}'"#);
        let balance = signer
            .token_balance(ContractId::new(7), &Address::new("A"))
            .await
            .unwrap();
        assert_eq!(balance, 42);
    }

    #[test]
    fn empty_command_is_rejected() {
        let result = CommandSigner::from_config(&SignerConfig { command: Vec::new() });
        assert!(matches!(
            result,
            Err(ConfigError::MissingField {
                field: "signer.command"
            })
        ));
    }
}
