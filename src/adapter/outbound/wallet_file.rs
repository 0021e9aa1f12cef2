//! Accounts file loading and retry selection.
//!
//! The accounts file is a JSON array of `{ "publicKey", "privateKey" }`
//! objects. Key material is kept as an opaque handle and never written
//! back out.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::{Account, Address};
use crate::error::BatchError;
use crate::runtime::FailureEntry;

/// Load and validate an accounts file.
///
/// Rejects blank addresses, blank keys and duplicate addresses, since each
/// would otherwise surface as a confusing per-account failure mid-batch.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, BatchError> {
    let fail = |reason: String| BatchError::Accounts {
        path: path.display().to_string(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    let accounts: Vec<Account> = serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;

    let mut seen = HashSet::new();
    for (index, account) in accounts.iter().enumerate() {
        if account.address().as_str().trim().is_empty() {
            return Err(fail(format!("entry {index} has an empty publicKey")));
        }
        if account.key().is_empty() {
            return Err(fail(format!(
                "entry {index} ({}) has an empty privateKey",
                account.address()
            )));
        }
        if !seen.insert(account.address().clone()) {
            return Err(fail(format!(
                "duplicate publicKey {} at entry {index}",
                account.address()
            )));
        }
    }

    debug!(path = %path.display(), accounts = accounts.len(), "Accounts loaded");
    Ok(accounts)
}

/// Accounts chosen for a retry run.
#[derive(Debug, Clone)]
pub struct RetrySelection {
    pub accounts: Vec<Account>,
    /// Entries whose transfer may already be on-chain, left out.
    pub held_back: Vec<FailureEntry>,
    /// Listed in the failure file but absent from the accounts file.
    pub unknown: Vec<Address>,
}

/// Keep only the accounts listed in `failures`.
///
/// An entry whose transfer was accepted by the network (it is `expired`,
/// or it carries a `txId`) may have committed after the previous run gave
/// up, so it is held back unless `include_expired` is set.
pub fn select_for_retry(
    accounts: Vec<Account>,
    failures: &[FailureEntry],
    include_expired: bool,
) -> RetrySelection {
    let mut wanted = HashSet::new();
    let mut held_back = Vec::new();
    for entry in failures {
        if entry.may_have_committed() && !include_expired {
            held_back.push(entry.clone());
        } else {
            wanted.insert(entry.public_key.clone());
        }
    }

    let known: HashSet<Address> = accounts.iter().map(|a| a.address().clone()).collect();
    let mut unknown: Vec<Address> = wanted.difference(&known).cloned().collect();
    unknown.sort();

    let accounts: Vec<Account> = accounts
        .into_iter()
        .filter(|account| wanted.contains(account.address()))
        .collect();

    info!(
        retrying = accounts.len(),
        held_back = held_back.len(),
        unknown = unknown.len(),
        "Retry selection built"
    );
    RetrySelection {
        accounts,
        held_back,
        unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureClass, KeyHandle, TxId};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn entry(address: &str, classification: FailureClass) -> FailureEntry {
        FailureEntry {
            public_key: Address::new(address),
            error: "boom".into(),
            classification,
            tx_id: None,
        }
    }

    #[test]
    fn loads_wallet_array() {
        let file = write(
            r#"[
                { "publicKey": "A", "privateKey": "aa" },
                { "publicKey": "B", "privateKey": "bb" }
            ]"#,
        );
        let accounts = load_accounts(file.path()).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].address().as_str(), "B");
    }

    #[test]
    fn duplicate_addresses_are_rejected() {
        let file = write(
            r#"[
                { "publicKey": "A", "privateKey": "aa" },
                { "publicKey": "A", "privateKey": "bb" }
            ]"#,
        );
        let err = load_accounts(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate publicKey A"));
    }

    #[test]
    fn blank_key_is_rejected() {
        let file = write(r#"[{ "publicKey": "A", "privateKey": "" }]"#);
        assert!(matches!(
            load_accounts(file.path()),
            Err(BatchError::Accounts { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_batch_error() {
        let err = load_accounts(Path::new("/nonexistent/wallets.json")).unwrap_err();
        assert!(matches!(err, BatchError::Accounts { .. }));
    }

    #[test]
    fn retry_holds_back_expired_unless_asked() {
        let accounts = vec![
            Account::new("A", KeyHandle::new("a")),
            Account::new("B", KeyHandle::new("b")),
            Account::new("C", KeyHandle::new("c")),
        ];
        let failures = vec![
            entry("A", FailureClass::Transient),
            entry("C", FailureClass::Expired),
            entry("Z", FailureClass::Rejection),
        ];

        let selection = select_for_retry(accounts.clone(), &failures, false);
        let picked: Vec<_> = selection.accounts.iter().map(|a| a.address().as_str()).collect();
        assert_eq!(picked, vec!["A"]);
        assert_eq!(selection.held_back, vec![entry("C", FailureClass::Expired)]);
        assert_eq!(selection.unknown, vec![Address::new("Z")]);

        let selection = select_for_retry(accounts, &failures, true);
        let picked: Vec<_> = selection.accounts.iter().map(|a| a.address().as_str()).collect();
        assert_eq!(picked, vec!["A", "C"]);
        assert!(selection.held_back.is_empty());
    }

    #[test]
    fn accepted_transfer_is_held_back_whatever_its_class() {
        let accounts = vec![
            Account::new("A", KeyHandle::new("a")),
            Account::new("B", KeyHandle::new("b")),
        ];
        let accepted = FailureEntry {
            tx_id: Some(TxId::new("TX0002")),
            ..entry("B", FailureClass::Transient)
        };
        let failures = vec![entry("A", FailureClass::Transient), accepted.clone()];

        let selection = select_for_retry(accounts.clone(), &failures, false);
        let picked: Vec<_> = selection.accounts.iter().map(|a| a.address().as_str()).collect();
        assert_eq!(picked, vec!["A"]);
        assert_eq!(selection.held_back, vec![accepted]);

        let selection = select_for_retry(accounts, &failures, true);
        assert_eq!(selection.accounts.len(), 2);
    }
}
