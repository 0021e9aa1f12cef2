//! Scripted in-memory ledger.
//!
//! [`ScriptedLedger`] implements [`LedgerClient`], [`TransferSigner`] and
//! [`TokenContract`] against in-memory state, so executor and batch tests
//! can script what happens to each account's transfers.
//!
//! Signed bytes are the JSON encoding of the [`TransferIntent`]; `submit`
//! decodes them to find the script to apply. A script queued for the
//! intent's source wins over one queued for its destination, so funding
//! tests script the receiving account and close-out tests script the
//! sending account. Without a queued script the default script applies.
//!
//! A transfer is open from the moment it is signed until the ledger hands
//! out its terminal result: a refused or failed submission, a committed
//! round, a pool eviction, or a failed status query. Transfers that never
//! commit stay open. [`ScriptedLedger::peak_in_flight`] reports the most
//! transfers open at once, which covers the whole sign, submit and confirm
//! span of every executor task.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    Account, Address, ContractId, KeyHandle, NetworkParameters, Round, SignedTransfer,
    SubmissionResult, TransferIntent, TxId,
};
use crate::error::LedgerError;
use crate::port::{LedgerClient, PendingStatus, TokenContract, TransferSigner};

use super::domain::params_at;

/// What happens to one submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitScript {
    /// Accepted; commits `n` rounds after the round it was submitted in.
    ConfirmAfter(u64),
    /// Accepted; never commits.
    NeverConfirm,
    /// Accepted; every status query fails with a transport error.
    StatusError(String),
    /// Accepted; the node reports it evicted from the pool.
    PoolError(String),
    /// Refused at submission.
    Reject(String),
    /// Submission fails with a transport error.
    SubmitError(String),
    /// Submission panics.
    Panic,
}

struct TxRecord {
    script: SubmitScript,
    submitted_at: Round,
    status_queries: u64,
    open: bool,
}

struct State {
    round: Round,
    native: HashMap<Address, u64>,
    tokens: HashMap<Address, u64>,
    scripts: HashMap<Address, VecDeque<SubmitScript>>,
    failing_balances: HashSet<Address>,
    params_error: Option<LedgerError>,
    txs: HashMap<TxId, TxRecord>,
    accepted: Vec<TransferIntent>,
    signatures: Vec<(String, NetworkParameters)>,
    next_tx: u64,
}

/// In-memory ledger with per-account scripted behaviour.
pub struct ScriptedLedger {
    state: Mutex<State>,
    default_script: SubmitScript,
    stalled_rounds: bool,
    submit_latency: Duration,
    params_calls: AtomicU64,
    submit_calls: AtomicU64,
    round_waits: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedLedger {
    /// Ledger positioned at `round` where every transfer commits one round
    /// after submission.
    pub fn new(round: Round) -> Self {
        Self {
            state: Mutex::new(State {
                round,
                native: HashMap::new(),
                tokens: HashMap::new(),
                scripts: HashMap::new(),
                failing_balances: HashSet::new(),
                params_error: None,
                txs: HashMap::new(),
                accepted: Vec::new(),
                signatures: Vec::new(),
                next_tx: 0,
            }),
            default_script: SubmitScript::ConfirmAfter(1),
            stalled_rounds: false,
            submit_latency: Duration::ZERO,
            params_calls: AtomicU64::new(0),
            submit_calls: AtomicU64::new(0),
            round_waits: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Round waits never return.
    #[must_use]
    pub fn with_stalled_rounds(mut self) -> Self {
        self.stalled_rounds = true;
        self
    }

    /// Every submission sleeps for `latency` before it is processed.
    #[must_use]
    pub fn with_submit_latency(mut self, latency: Duration) -> Self {
        self.submit_latency = latency;
        self
    }

    /// Script applied when no per-address script is queued.
    #[must_use]
    pub fn with_default_script(mut self, script: SubmitScript) -> Self {
        self.default_script = script;
        self
    }

    /// Native balance of `address`.
    #[must_use]
    pub fn with_balance(mut self, address: &Address, amount: u64) -> Self {
        self.state.get_mut().native.insert(address.clone(), amount);
        self
    }

    /// Token balance of `address`.
    #[must_use]
    pub fn with_token_balance(mut self, address: &Address, amount: u64) -> Self {
        self.state.get_mut().tokens.insert(address.clone(), amount);
        self
    }

    /// Queue `script` for the next transfer involving `address`.
    #[must_use]
    pub fn with_script(mut self, address: &Address, script: SubmitScript) -> Self {
        self.state
            .get_mut()
            .scripts
            .entry(address.clone())
            .or_default()
            .push_back(script);
        self
    }

    /// Balance lookups for `address` fail with a transport error.
    #[must_use]
    pub fn with_balance_error(mut self, address: &Address) -> Self {
        self.state.get_mut().failing_balances.insert(address.clone());
        self
    }

    /// Parameter fetches fail with `error`.
    #[must_use]
    pub fn with_params_error(mut self, error: LedgerError) -> Self {
        self.state.get_mut().params_error = Some(error);
        self
    }

    /// Record an already-accepted transaction at the current round.
    pub fn register_tx(&self, script: SubmitScript) -> TxId {
        let mut state = self.state.lock();
        let tx_id = next_tx_id(&mut state);
        let submitted_at = state.round;
        state.txs.insert(
            tx_id.clone(),
            TxRecord {
                script,
                submitted_at,
                status_queries: 0,
                open: false,
            },
        );
        tx_id
    }

    /// Number of `wait_for_round_after` calls.
    pub fn round_waits(&self) -> u64 {
        self.round_waits.load(Ordering::SeqCst)
    }

    /// Number of status queries made for `tx_id`.
    pub fn status_queries(&self, tx_id: &TxId) -> u64 {
        self.state
            .lock()
            .txs
            .get(tx_id)
            .map_or(0, |record| record.status_queries)
    }

    /// Number of parameter fetches.
    pub fn params_calls(&self) -> u64 {
        self.params_calls.load(Ordering::SeqCst)
    }

    /// Number of `submit` calls, accepted or not.
    pub fn submit_calls(&self) -> u64 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Intents accepted into the pool, in submission order.
    pub fn accepted(&self) -> Vec<TransferIntent> {
        self.state.lock().accepted.clone()
    }

    /// Keys used for signing, in signing order.
    pub fn signing_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .signatures
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Parameters each transfer was signed with, in signing order.
    pub fn signing_params(&self) -> Vec<NetworkParameters> {
        self.state
            .lock()
            .signatures
            .iter()
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Highest number of transfers open at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Current round.
    pub fn round(&self) -> Round {
        self.state.lock().round
    }

    fn open_transfer(&self) {
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(open, Ordering::SeqCst);
    }

    fn close_transfer(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                Some(open.saturating_sub(1))
            });
    }

    fn take_script(&self, state: &mut State, intent: &TransferIntent) -> SubmitScript {
        for address in [&intent.source, &intent.destination] {
            if let Some(script) = state.scripts.get_mut(address).and_then(VecDeque::pop_front) {
                return script;
            }
        }
        self.default_script.clone()
    }
}

fn next_tx_id(state: &mut State) -> TxId {
    state.next_tx += 1;
    TxId::new(format!("TX{:04}", state.next_tx))
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn network_parameters(&self) -> Result<NetworkParameters, LedgerError> {
        self.params_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        match &state.params_error {
            Some(err) => Err(err.clone()),
            None => Ok(params_at(state.round)),
        }
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let state = self.state.lock();
        if state.failing_balances.contains(address) {
            return Err(LedgerError::Transport(format!("balance lookup failed for {address}")));
        }
        Ok(state.native.get(address).copied().unwrap_or(0))
    }

    async fn submit(&self, signed: &SignedTransfer) -> Result<SubmissionResult, LedgerError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !self.submit_latency.is_zero() {
            tokio::time::sleep(self.submit_latency).await;
        }

        let Ok(intent) = serde_json::from_slice::<TransferIntent>(signed.as_bytes()) else {
            self.close_transfer();
            return Ok(SubmissionResult::Rejected {
                reason: "malformed transaction".into(),
            });
        };

        let mut state = self.state.lock();
        let script = self.take_script(&mut state, &intent);
        match script {
            SubmitScript::Panic => {
                drop(state);
                self.close_transfer();
                panic!("scripted submit panic for {}", intent.source);
            }
            SubmitScript::SubmitError(message) => {
                self.close_transfer();
                Err(LedgerError::Transport(message))
            }
            SubmitScript::Reject(reason) => {
                self.close_transfer();
                Ok(SubmissionResult::Rejected { reason })
            }
            script => {
                let tx_id = next_tx_id(&mut state);
                let submitted_at = state.round;
                state.txs.insert(
                    tx_id.clone(),
                    TxRecord {
                        script,
                        submitted_at,
                        status_queries: 0,
                        open: true,
                    },
                );
                state.accepted.push(intent);
                Ok(SubmissionResult::Accepted(tx_id))
            }
        }
    }

    async fn pending_status(&self, tx_id: &TxId) -> Result<PendingStatus, LedgerError> {
        let mut state = self.state.lock();
        let round = state.round;
        let Some(record) = state.txs.get_mut(tx_id) else {
            return Err(LedgerError::InvalidResponse(format!("unknown transaction {tx_id}")));
        };
        record.status_queries += 1;

        let status = match &record.script {
            SubmitScript::ConfirmAfter(rounds) => {
                let committed = Round::new(record.submitted_at.get() + rounds);
                if round >= committed {
                    Ok(PendingStatus::confirmed(committed))
                } else {
                    Ok(PendingStatus::pending())
                }
            }
            SubmitScript::StatusError(message) => Err(LedgerError::Transport(message.clone())),
            SubmitScript::PoolError(message) => Ok(PendingStatus {
                confirmed_round: None,
                pool_error: Some(message.clone()),
            }),
            _ => Ok(PendingStatus::pending()),
        };

        let terminal = match &status {
            Ok(pending) => pending.committed_round().is_some() || pending.pool_error.is_some(),
            Err(_) => true,
        };
        if terminal && record.open {
            record.open = false;
            drop(state);
            self.close_transfer();
        }
        status
    }

    async fn current_round(&self) -> Result<Round, LedgerError> {
        Ok(self.state.lock().round)
    }

    async fn wait_for_round_after(&self, round: Round) -> Result<Round, LedgerError> {
        self.round_waits.fetch_add(1, Ordering::SeqCst);
        if self.stalled_rounds {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock();
        if state.round <= round {
            state.round = round.next();
        }
        Ok(state.round)
    }

    fn ledger_name(&self) -> &'static str {
        "scripted"
    }
}

#[async_trait]
impl TransferSigner for ScriptedLedger {
    async fn build_and_sign(
        &self,
        intent: &TransferIntent,
        key: &KeyHandle,
        params: &NetworkParameters,
    ) -> Result<SignedTransfer, LedgerError> {
        if key.is_empty() {
            return Err(LedgerError::Signing("empty signing key".into()));
        }
        let signed = serde_json::to_vec(intent)
            .map(SignedTransfer::new)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        self.state
            .lock()
            .signatures
            .push((key.expose().to_string(), params.clone()));
        self.open_transfer();
        Ok(signed)
    }
}

#[async_trait]
impl TokenContract for ScriptedLedger {
    async fn balance_of(
        &self,
        _contract: ContractId,
        address: &Address,
    ) -> Result<u64, LedgerError> {
        let state = self.state.lock();
        if state.failing_balances.contains(address) {
            return Err(LedgerError::Transport(format!("token balance lookup failed for {address}")));
        }
        Ok(state.tokens.get(address).copied().unwrap_or(0))
    }

    async fn transfer(
        &self,
        contract: ContractId,
        from: &Account,
        to: &Address,
        amount: u64,
        params: &NetworkParameters,
    ) -> Result<SubmissionResult, LedgerError> {
        let intent = TransferIntent::token(from.address().clone(), to.clone(), contract, amount);
        let signed = self.build_and_sign(&intent, from.key(), params).await?;
        self.submit(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{account, params, treasury_address};

    #[tokio::test]
    async fn source_script_wins_over_destination_script() {
        let a = account(0);
        let b = account(1);
        let ledger = ScriptedLedger::new(Round::new(10))
            .with_script(a.address(), SubmitScript::Reject("from source".into()))
            .with_script(b.address(), SubmitScript::Reject("from destination".into()));

        let intent = TransferIntent::payment(a.address().clone(), b.address().clone(), 5);
        let signed = ledger.build_and_sign(&intent, a.key(), &params()).await.unwrap();

        assert_eq!(
            ledger.submit(&signed).await.unwrap(),
            SubmissionResult::Rejected {
                reason: "from source".into()
            }
        );
        assert!(matches!(
            ledger.submit(&signed).await.unwrap(),
            SubmissionResult::Rejected { .. }
        ));
        assert!(matches!(
            ledger.submit(&signed).await.unwrap(),
            SubmissionResult::Accepted(_)
        ));
    }

    #[tokio::test]
    async fn round_wait_only_advances_when_caught_up() {
        let ledger = ScriptedLedger::new(Round::new(10));
        assert_eq!(ledger.wait_for_round_after(Round::new(10)).await.unwrap(), Round::new(11));
        assert_eq!(ledger.wait_for_round_after(Round::new(5)).await.unwrap(), Round::new(11));
        assert_eq!(ledger.round_waits(), 2);
    }

    #[tokio::test]
    async fn transfer_stays_open_from_signing_until_it_commits() {
        let a = account(0);
        let ledger = ScriptedLedger::new(Round::new(10));
        let intent = TransferIntent::payment(a.address().clone(), treasury_address(), 5);

        let first = ledger.build_and_sign(&intent, a.key(), &params()).await.unwrap();
        let second = ledger.build_and_sign(&intent, a.key(), &params()).await.unwrap();
        assert_eq!(ledger.peak_in_flight(), 2);

        let SubmissionResult::Accepted(tx_id) = ledger.submit(&first).await.unwrap() else {
            panic!("expected acceptance");
        };
        ledger.wait_for_round_after(Round::new(10)).await.unwrap();
        assert!(ledger.pending_status(&tx_id).await.unwrap().committed_round().is_some());
        ledger.submit(&second).await.unwrap();

        let third = ledger.build_and_sign(&intent, a.key(), &params()).await.unwrap();
        assert_eq!(ledger.peak_in_flight(), 2);
        ledger.submit(&third).await.unwrap();
    }
}
