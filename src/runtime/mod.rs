//! Batch runtime: scheduling, confirmation, execution and reporting.
//!
//! Layering, leaves first:
//!
//! - [`scheduler`] - bounded, rate-limited task dispatch
//! - [`confirmation`] - round-budgeted confirmation polling
//! - [`executor`] - one account, one outcome record
//! - [`batch`] - one operation over many accounts
//! - [`report`] - failure partitioning and the failure file

pub mod batch;
pub mod confirmation;
pub mod executor;
pub mod report;
pub mod scheduler;

pub use batch::{BatchOrchestrator, ProgressHook};
pub use confirmation::{ConfirmationPolicy, ConfirmationWaiter, WaitState};
pub use executor::{LedgerPorts, TransferExecutor};
pub use report::{failure_file_path, read_failure_file, FailureEntry, FailureReport, PersistOutcome};
pub use scheduler::{
    RateLimitedScheduler, SchedulerLimits, SchedulerStats, ShutdownHandle, TaskHandle, TaskOutcome,
};
