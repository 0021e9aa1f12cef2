//! Per-account transfer execution.
//!
//! A [`TransferExecutor`] turns one account plus the batch's network
//! parameters into exactly one [`OutcomeRecord`]. It never returns an error:
//! every failure is classified and recorded so the batch can keep going.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    Account, Address, ContractId, FailureClass, KeyHandle, NetworkParameters, Operation,
    OutcomeRecord, Round, SignedTransfer, SubmissionResult, Treasury, TransferIntent, TxId,
};
use crate::error::{BatchError, LedgerError};
use crate::port::{LedgerClient, TokenContract, TransferSigner};

use super::confirmation::{bounded, ConfirmationPolicy, ConfirmationWaiter, WaitState};

/// Outbound ports shared by every task of a batch.
#[derive(Clone)]
pub struct LedgerPorts {
    pub ledger: Arc<dyn LedgerClient>,
    pub signer: Arc<dyn TransferSigner>,
    pub token: Arc<dyn TokenContract>,
}

impl LedgerPorts {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransferSigner>,
        token: Arc<dyn TokenContract>,
    ) -> Self {
        Self {
            ledger,
            signer,
            token,
        }
    }

    /// Use one value for all three ports.
    pub fn shared<T>(backend: Arc<T>) -> Self
    where
        T: LedgerClient + TransferSigner + TokenContract + 'static,
    {
        Self {
            ledger: backend.clone(),
            signer: backend.clone(),
            token: backend,
        }
    }
}

/// How a successful execution ended.
#[derive(Debug)]
enum Settled {
    Confirmed { tx_id: TxId, round: Round },
    Skipped(String),
}

/// A classified failure, carried up with `?` until it becomes a record.
#[derive(Debug)]
struct TransferFailure {
    class: FailureClass,
    detail: String,
    tx_id: Option<TxId>,
}

impl TransferFailure {
    fn new(class: FailureClass, detail: impl Into<String>, tx_id: Option<TxId>) -> Self {
        Self {
            class,
            detail: detail.into(),
            tx_id,
        }
    }

    fn context(mut self, step: &str) -> Self {
        self.detail = format!("{step}: {}", self.detail);
        self
    }
}

impl From<LedgerError> for TransferFailure {
    fn from(err: LedgerError) -> Self {
        Self::new(err.classification(), err.to_string(), None)
    }
}

/// Runs one batch operation for one account at a time.
pub struct TransferExecutor {
    ports: LedgerPorts,
    operation: Operation,
    treasury: Treasury,
    policy: ConfirmationPolicy,
}

impl TransferExecutor {
    /// Build an executor for `operation`.
    ///
    /// Funding operations are signed by the treasury, so they require its
    /// key.
    pub fn new(
        ports: LedgerPorts,
        operation: Operation,
        treasury: Treasury,
        policy: ConfirmationPolicy,
    ) -> Result<Self, BatchError> {
        if !operation.signed_by_account() && treasury.account().is_none() {
            return Err(BatchError::Treasury(format!(
                "{} requires a treasury signing key",
                operation.kind()
            )));
        }
        Ok(Self {
            ports,
            operation,
            treasury,
            policy,
        })
    }

    #[must_use]
    pub const fn operation(&self) -> &Operation {
        &self.operation
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ports.ledger
    }

    /// Execute the operation for `account`, always producing a record.
    pub async fn execute(&self, account: &Account, params: &NetworkParameters) -> OutcomeRecord {
        let kind = self.operation.kind();
        let address = account.address().clone();

        match self.run(account, params).await {
            Ok(Settled::Confirmed { tx_id, round }) => {
                info!(operation = %kind, address = %address, tx_id = %tx_id, round = %round, "Transfer confirmed");
                OutcomeRecord::confirmed(address, tx_id, round)
            }
            Ok(Settled::Skipped(reason)) => {
                debug!(operation = %kind, address = %address, reason = %reason, "Account skipped");
                OutcomeRecord::skipped(address, reason)
            }
            Err(failure) => {
                warn!(
                    operation = %kind,
                    address = %address,
                    class = %failure.class,
                    tx_id = ?failure.tx_id.as_ref().map(TxId::as_str),
                    error = %failure.detail,
                    "Transfer failed"
                );
                OutcomeRecord::failed(address, failure.class, failure.detail, failure.tx_id)
            }
        }
    }

    async fn run(
        &self,
        account: &Account,
        params: &NetworkParameters,
    ) -> Result<Settled, TransferFailure> {
        match &self.operation {
            Operation::FundNative { amount } => {
                let treasury = self.treasury_account()?;
                let intent = TransferIntent::payment(
                    treasury.address().clone(),
                    account.address().clone(),
                    *amount,
                );
                let signed = self.sign(&intent, treasury.key(), params).await?;
                self.submit_and_confirm(&signed).await
            }
            Operation::FundToken { contract, amount } => {
                let treasury = self.treasury_account()?;
                let submission = self
                    .bounded(self.ports.token.transfer(
                        *contract,
                        &treasury,
                        account.address(),
                        *amount,
                        params,
                    ))
                    .await?;
                self.confirm(submission).await
            }
            Operation::CloseOut { fee } => self.close_out(account, params, *fee).await,
            Operation::Clawback { contract, fee } => {
                self.clawback(account, params, *contract, *fee).await
            }
        }
    }

    async fn close_out(
        &self,
        account: &Account,
        params: &NetworkParameters,
        fee: u64,
    ) -> Result<Settled, TransferFailure> {
        let balance = self.bounded(self.ports.ledger.balance(account.address())).await?;
        if balance == 0 {
            return Ok(Settled::Skipped("native balance is zero".into()));
        }

        let intent = TransferIntent::close_out(account.address().clone(), self.treasury_address());
        let params = params.with_flat_fee(fee);
        let signed = self.sign(&intent, account.key(), &params).await?;
        self.submit_and_confirm(&signed).await
    }

    async fn clawback(
        &self,
        account: &Account,
        params: &NetworkParameters,
        contract: ContractId,
        fee: u64,
    ) -> Result<Settled, TransferFailure> {
        let tokens = self
            .bounded(self.ports.token.balance_of(contract, account.address()))
            .await?;

        let swept = if tokens > 0 {
            let submission = self
                .bounded(self.ports.token.transfer(
                    contract,
                    account,
                    self.treasury.address(),
                    tokens,
                    params,
                ))
                .await
                .map_err(|err| TransferFailure::from(err).context("token sweep"))?;
            let settled = self
                .confirm(submission)
                .await
                .map_err(|failure| failure.context("token sweep"))?;
            debug!(address = %account.address(), tokens, "Token balance swept");
            Some(settled)
        } else {
            None
        };

        match self.close_out(account, params, fee).await {
            Ok(Settled::Skipped(_)) => Ok(swept.unwrap_or_else(|| {
                Settled::Skipped("token and native balances are zero".into())
            })),
            Ok(confirmed) => Ok(confirmed),
            Err(failure) => Err(failure.context("close-out")),
        }
    }

    async fn sign(
        &self,
        intent: &TransferIntent,
        key: &KeyHandle,
        params: &NetworkParameters,
    ) -> Result<SignedTransfer, TransferFailure> {
        Ok(self
            .bounded(self.ports.signer.build_and_sign(intent, key, params))
            .await?)
    }

    async fn submit_and_confirm(
        &self,
        signed: &SignedTransfer,
    ) -> Result<Settled, TransferFailure> {
        let submission = self.bounded(self.ports.ledger.submit(signed)).await?;
        self.confirm(submission).await
    }

    async fn confirm(&self, submission: SubmissionResult) -> Result<Settled, TransferFailure> {
        let tx_id = match submission {
            SubmissionResult::Accepted(tx_id) => tx_id,
            SubmissionResult::Rejected { reason } => {
                return Err(TransferFailure::new(FailureClass::Rejection, reason, None));
            }
        };

        let waiter = ConfirmationWaiter::new(self.ports.ledger.as_ref(), self.policy);
        match waiter.wait(&tx_id).await {
            WaitState::Confirmed(round) => Ok(Settled::Confirmed { tx_id, round }),
            WaitState::Expired { rounds_waited } => Err(TransferFailure::new(
                FailureClass::Expired,
                format!("not confirmed after {rounds_waited} rounds"),
                Some(tx_id),
            )),
            WaitState::Failed(err) => Err(TransferFailure::new(
                err.classification(),
                err.to_string(),
                Some(tx_id),
            )),
        }
    }

    fn treasury_account(&self) -> Result<Account, TransferFailure> {
        self.treasury.account().ok_or_else(|| {
            TransferFailure::new(FailureClass::Internal, "treasury key not configured", None)
        })
    }

    fn treasury_address(&self) -> Address {
        self.treasury.address().clone()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        bounded(self.policy.round_timeout, call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, TransferKind};
    use crate::testkit::config::policy;
    use crate::testkit::domain::{account, params, treasury, treasury_address};
    use crate::testkit::ledger::{ScriptedLedger, SubmitScript};

    const CONTRACT: ContractId = ContractId::new(31566704);

    fn executor(ledger: &Arc<ScriptedLedger>, operation: Operation) -> TransferExecutor {
        TransferExecutor::new(
            LedgerPorts::shared(ledger.clone()),
            operation,
            Treasury::signing(treasury()),
            policy(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fund_native_pays_from_treasury() {
        let ledger = Arc::new(ScriptedLedger::new(Round::new(100)));
        let acct = account(0);

        let record = executor(&ledger, Operation::FundNative { amount: 250_000 })
            .execute(&acct, &params())
            .await;

        assert!(matches!(record.outcome(), Outcome::Confirmed { round, .. } if *round == Round::new(101)));
        let accepted = ledger.accepted();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].source, treasury_address());
        assert_eq!(&accepted[0].destination, acct.address());
        assert_eq!(accepted[0].amount, 250_000);
        assert_eq!(ledger.signing_keys(), vec!["treasury-key".to_string()]);
    }

    #[tokio::test]
    async fn fund_token_goes_through_token_contract() {
        let ledger = Arc::new(ScriptedLedger::new(Round::new(100)));

        let record = executor(
            &ledger,
            Operation::FundToken {
                contract: CONTRACT,
                amount: 10,
            },
        )
        .execute(&account(0), &params())
        .await;

        assert!(record.is_success());
        assert_eq!(
            ledger.accepted()[0].kind,
            TransferKind::Token { contract: CONTRACT }
        );
    }

    #[tokio::test]
    async fn close_out_skips_empty_account() {
        let ledger = Arc::new(ScriptedLedger::new(Round::new(100)));

        let record = executor(&ledger, Operation::CloseOut { fee: 1000 })
            .execute(&account(0), &params())
            .await;

        assert!(matches!(record.outcome(), Outcome::Skipped { .. }));
        assert!(record.is_success());
        assert_eq!(ledger.submit_calls(), 0);
    }

    #[tokio::test]
    async fn close_out_signs_with_account_key_and_flat_fee() {
        let acct = account(3);
        let ledger = Arc::new(ScriptedLedger::new(Round::new(100)).with_balance(acct.address(), 5_000));

        let record = executor(&ledger, Operation::CloseOut { fee: 1000 })
            .execute(&acct, &params())
            .await;

        assert!(matches!(record.outcome(), Outcome::Confirmed { .. }));
        assert_eq!(ledger.signing_keys(), vec!["key-3".to_string()]);
        let signed_with = &ledger.signing_params()[0];
        assert!(signed_with.flat_fee);
        assert_eq!(signed_with.fee, 1000);
        let intent = &ledger.accepted()[0];
        assert_eq!(intent.close_to, Some(treasury_address()));
        assert_eq!(intent.amount, 0);
    }

    #[tokio::test]
    async fn rejection_has_no_transaction_id() {
        let acct = account(0);
        let ledger = Arc::new(
            ScriptedLedger::new(Round::new(100))
                .with_script(acct.address(), SubmitScript::Reject("overspend".into())),
        );

        let record = executor(&ledger, Operation::FundNative { amount: 1 })
            .execute(&acct, &params())
            .await;

        assert_eq!(
            record.outcome(),
            &Outcome::Failed {
                class: FailureClass::Rejection,
                detail: "overspend".into(),
                tx_id: None,
            }
        );
    }

    #[tokio::test]
    async fn unconfirmed_transfer_expires_with_its_transaction_id() {
        let acct = account(0);
        let ledger = Arc::new(
            ScriptedLedger::new(Round::new(100)).with_script(acct.address(), SubmitScript::NeverConfirm),
        );

        let record = executor(&ledger, Operation::FundNative { amount: 1 })
            .execute(&acct, &params())
            .await;

        match record.outcome() {
            Outcome::Failed { class, tx_id, .. } => {
                assert_eq!(*class, FailureClass::Expired);
                assert!(tx_id.is_some());
            }
            other => panic!("expected expiry, got {other:?}"),
        }
        assert_eq!(ledger.round_waits(), 5);
    }

    #[tokio::test]
    async fn transport_error_is_transient() {
        let acct = account(0);
        let ledger = Arc::new(
            ScriptedLedger::new(Round::new(100)).with_balance_error(acct.address()),
        );

        let record = executor(&ledger, Operation::CloseOut { fee: 1000 })
            .execute(&acct, &params())
            .await;

        assert_eq!(record.failure_class(), Some(FailureClass::Transient));
    }

    #[tokio::test]
    async fn clawback_sweeps_tokens_then_closes_out() {
        let acct = account(1);
        let ledger = Arc::new(
            ScriptedLedger::new(Round::new(100))
                .with_token_balance(acct.address(), 42)
                .with_balance(acct.address(), 7_000),
        );

        let record = executor(
            &ledger,
            Operation::Clawback {
                contract: CONTRACT,
                fee: 1000,
            },
        )
        .execute(&acct, &params())
        .await;

        assert!(matches!(record.outcome(), Outcome::Confirmed { .. }));
        let accepted = ledger.accepted();
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].kind, TransferKind::Token { contract: CONTRACT });
        assert_eq!(accepted[0].amount, 42);
        assert_eq!(accepted[0].destination, treasury_address());
        assert_eq!(accepted[1].kind, TransferKind::CloseOut);
    }

    #[tokio::test]
    async fn clawback_of_empty_account_is_skipped() {
        let ledger = Arc::new(ScriptedLedger::new(Round::new(100)));

        let record = executor(
            &ledger,
            Operation::Clawback {
                contract: CONTRACT,
                fee: 1000,
            },
        )
        .execute(&account(0), &params())
        .await;

        assert!(matches!(record.outcome(), Outcome::Skipped { .. }));
        assert_eq!(ledger.submit_calls(), 0);
    }

    #[tokio::test]
    async fn clawback_reports_failed_close_out_after_sweep() {
        let acct = account(1);
        let ledger = Arc::new(
            ScriptedLedger::new(Round::new(100))
                .with_token_balance(acct.address(), 42)
                .with_balance(acct.address(), 7_000)
                .with_script(acct.address(), SubmitScript::ConfirmAfter(1))
                .with_script(acct.address(), SubmitScript::Reject("below min balance".into())),
        );

        let record = executor(
            &ledger,
            Operation::Clawback {
                contract: CONTRACT,
                fee: 1000,
            },
        )
        .execute(&acct, &params())
        .await;

        match record.outcome() {
            Outcome::Failed { class, detail, .. } => {
                assert_eq!(*class, FailureClass::Rejection);
                assert_eq!(detail, "close-out: below min balance");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn funding_without_treasury_key_is_refused() {
        let ledger = Arc::new(ScriptedLedger::new(Round::new(1)));
        let result = TransferExecutor::new(
            LedgerPorts::shared(ledger),
            Operation::FundNative { amount: 1 },
            Treasury::receive_only("TREASURY"),
            policy(1),
        );
        assert!(matches!(result, Err(BatchError::Treasury(_))));
    }

    #[test]
    fn close_out_needs_only_treasury_address() {
        let ledger = Arc::new(ScriptedLedger::new(Round::new(1)));
        let result = TransferExecutor::new(
            LedgerPorts::shared(ledger),
            Operation::CloseOut { fee: 1000 },
            Treasury::receive_only("TREASURY"),
            policy(1),
        );
        assert!(result.is_ok());
    }
}
