//! Accounts taking part in a batch.
//!
//! An [`Account`] pairs a public [`Address`] with an opaque [`KeyHandle`].
//! The handle is passed through to the signing port untouched; this crate
//! never inspects it, logs it, or writes it back to disk.

use std::fmt;

use serde::Deserialize;

use super::id::Address;

/// Opaque reference to signing material.
///
/// What the handle contains (a hex secret, a keystore path, a KMS key id) is
/// a concern of the [`TransferSigner`](crate::port::TransferSigner)
/// implementation.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(String);

impl KeyHandle {
    /// Wrap signing material.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the raw handle to a signer.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when no material is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyHandle(<redacted>)")
    }
}

/// A ledger account: public identity plus signing key handle.
///
/// Immutable once loaded. Deserializes from the wallet file layout
/// `{ "publicKey": "...", "privateKey": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    #[serde(rename = "publicKey")]
    address: Address,
    #[serde(rename = "privateKey")]
    key: KeyHandle,
}

impl Account {
    /// Create a new account.
    pub fn new(address: impl Into<Address>, key: KeyHandle) -> Self {
        Self {
            address: address.into(),
            key,
        }
    }

    /// Public address.
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Signing key handle.
    #[must_use]
    pub const fn key(&self) -> &KeyHandle {
        &self.key
    }
}

/// The account on the other side of every batch transfer.
///
/// Funding operations need the key to sign; close-out and clawback only
/// need the address to pay into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Treasury {
    address: Address,
    key: Option<KeyHandle>,
}

impl Treasury {
    /// Treasury that can sign funding transfers.
    pub fn signing(account: Account) -> Self {
        Self {
            address: account.address,
            key: Some(account.key),
        }
    }

    /// Treasury that only receives.
    pub fn receive_only(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            key: None,
        }
    }

    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Signing account, when a non-empty key is present.
    #[must_use]
    pub fn account(&self) -> Option<Account> {
        self.key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Account::new(self.address.clone(), key.clone()))
    }
}
