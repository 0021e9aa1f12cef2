//! Ledger-agnostic domain types.

pub mod account;
pub mod id;
pub mod network;
pub mod outcome;
pub mod transfer;

pub use account::{Account, KeyHandle, Treasury};
pub use id::{Address, BatchId, ContractId, Round, TxId};
pub use network::NetworkParameters;
pub use outcome::{BatchResult, ConfirmationStatus, FailureClass, Outcome, OutcomeRecord};
pub use transfer::{
    Operation, OperationKind, SignedTransfer, SubmissionResult, TransferIntent, TransferKind,
};
