//! # Accounts, Amounts & Call Context
//!
//! The vocabulary every ledger speaks. An [`Account`] is an opaque address
//! string issued by the host environment; the ledgers compare accounts for
//! equality and use them as map keys, nothing more. Signature checks that
//! bind an account to a caller happen upstream of this crate.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// An amount of a fungible asset or of vault shares, in the smallest unit.
pub type Amount = u128;

/// Sequential identifier of a membership unit. Starts at 1.
pub type UnitId = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// An address in the host environment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    /// Wraps an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Account {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Account {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who is calling, and when.
///
/// Supplied by the host for every mutating call, the way a chain supplies
/// the transaction sender and block time. Ledgers never read the wall
/// clock themselves; that keeps every operation deterministic under test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The account that originated the call.
    pub caller: Account,
    /// Block time of the call, in unix seconds.
    pub timestamp: Timestamp,
}

impl CallContext {
    /// Creates a context for `caller` at an explicit `timestamp`.
    pub fn new(caller: impl Into<Account>, timestamp: Timestamp) -> Self {
        Self {
            caller: caller.into(),
            timestamp,
        }
    }

    /// Creates a context for `caller` at the current wall-clock time.
    pub fn now(caller: impl Into<Account>) -> Self {
        let timestamp = Utc::now().timestamp().max(0) as Timestamp;
        Self::new(caller, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_display_and_conversions() {
        let a = Account::from("alice");
        let b = Account::new(String::from("alice"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "alice");
        assert_eq!(a.as_str(), "alice");
    }

    #[test]
    fn account_serializes_as_plain_string() {
        let json = serde_json::to_string(&Account::from("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
    }

    #[test]
    fn context_now_is_recent() {
        let ctx = CallContext::now("carol");
        // 2020-01-01T00:00:00Z. Anything earlier means the clock is broken.
        assert!(ctx.timestamp > 1_577_836_800);
        assert_eq!(ctx.caller, Account::from("carol"));
    }
}
