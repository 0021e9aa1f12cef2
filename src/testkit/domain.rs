//! Builders for domain primitives used across tests.
//!
//! Keeps account and parameter construction out of the assertions.

use crate::domain::{Account, Address, KeyHandle, NetworkParameters, Round};

/// Account number `n`, with address `ACCT{n}` and key `key-{n}`.
pub fn account(n: usize) -> Account {
    Account::new(format!("ACCT{n:03}"), KeyHandle::new(format!("key-{n}")))
}

/// Accounts `0..n`.
pub fn accounts(n: usize) -> Vec<Account> {
    (0..n).map(account).collect()
}

/// The treasury account used by funding tests.
pub fn treasury() -> Account {
    Account::new("TREASURY", KeyHandle::new("treasury-key"))
}

/// Address of [`treasury`].
pub fn treasury_address() -> Address {
    Address::new("TREASURY")
}

/// Parameters valid from round 1000.
pub fn params() -> NetworkParameters {
    params_at(Round::new(1000))
}

/// Parameters valid for 1000 rounds starting at `round`.
pub fn params_at(round: Round) -> NetworkParameters {
    NetworkParameters {
        fee: 0,
        min_fee: 1000,
        flat_fee: false,
        first_valid: round,
        last_valid: Round::new(round.get() + 1000),
        genesis_id: "testnet-v1.0".into(),
        genesis_hash: "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=".into(),
    }
}
