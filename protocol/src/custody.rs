//! # Asset Custody
//!
//! The ledgers never hold money themselves. Base-asset deposits and
//! native-currency payments live in an external custody ledger (a token
//! contract, a bank module, a test double) reached through the
//! [`AssetLedger`] trait. The vault treats `balance_of(vault_account)` as
//! ground truth for its total assets and re-reads it on every call, so gains
//! or losses booked by other components (swap execution, donations) show up
//! in the share price immediately.
//!
//! [`InMemoryAssetLedger`] is the reference implementation: a flat balance
//! map with overflow-checked credit/debit. The CLI persists it alongside the
//! ledgers; tests use it directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{Account, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by an asset custody ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// The source account cannot cover the transfer.
    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Account being debited.
        account: Account,
        /// Its current balance.
        available: Amount,
        /// Amount the transfer needed.
        requested: Amount,
    },

    /// Crediting would overflow the destination balance or total supply.
    #[error("custody overflow crediting {account}")]
    Overflow {
        /// Account being credited.
        account: Account,
    },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A fungible asset ledger the TVault ledgers hold funds in.
///
/// Implementations must make `transfer` atomic: on error, no balance moves.
/// Authorization (approvals, signatures) is the host's concern; by the time
/// a ledger calls `transfer`, the host has already decided the call may
/// move `from`'s funds.
pub trait AssetLedger {
    /// Current balance of `account`.
    fn balance_of(&self, account: &Account) -> Amount;

    /// Moves `amount` from `from` to `to`.
    fn transfer(&mut self, from: &Account, to: &Account, amount: Amount)
        -> Result<(), CustodyError>;

    /// Pulls `amount` from a caller's account into a ledger's account.
    ///
    /// Ledgers use this for deposits and payments and [`transfer`] for
    /// payouts. Hosts that track token allowances enforce them here; the
    /// default treats the pull as already authorized.
    ///
    /// [`transfer`]: AssetLedger::transfer
    fn transfer_from(
        &mut self,
        from: &Account,
        to: &Account,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        self.transfer(from, to, amount)
    }
}

// ---------------------------------------------------------------------------
// InMemoryAssetLedger
// ---------------------------------------------------------------------------

/// A single-asset balance map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryAssetLedger {
    /// Ticker, for display only.
    symbol: String,
    /// Balances keyed by account. Zero balances may or may not be present.
    balances: HashMap<Account, Amount>,
    /// Sum of all balances.
    total_supply: Amount,
}

impl InMemoryAssetLedger {
    /// Creates an empty ledger for the asset `symbol`.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balances: HashMap::new(),
            total_supply: 0,
        }
    }

    /// The asset's ticker.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Creates `amount` out of thin air in `account`.
    ///
    /// Used to fund test accounts, and to simulate yield landing in the
    /// vault from a source the ledgers don't model.
    pub fn mint(&mut self, account: &Account, amount: Amount) -> Result<Amount, CustodyError> {
        let total_supply =
            self.total_supply
                .checked_add(amount)
                .ok_or_else(|| CustodyError::Overflow {
                    account: account.clone(),
                })?;
        let balance = self.credit(account, amount)?;
        self.total_supply = total_supply;
        Ok(balance)
    }

    /// Destroys `amount` held by `account`. Simulates a realized loss.
    pub fn burn(&mut self, account: &Account, amount: Amount) -> Result<Amount, CustodyError> {
        let balance = self.debit(account, amount)?;
        // Supply always covers any single balance.
        self.total_supply -= amount;
        Ok(balance)
    }

    fn credit(&mut self, account: &Account, amount: Amount) -> Result<Amount, CustodyError> {
        let balance = self.balances.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Overflow {
                account: account.clone(),
            })?;
        Ok(*balance)
    }

    fn debit(&mut self, account: &Account, amount: Amount) -> Result<Amount, CustodyError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                account: account.clone(),
                available,
                requested: amount,
            });
        }
        let remaining = available - amount;
        self.balances.insert(account.clone(), remaining);
        Ok(remaining)
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn balance_of(&self, account: &Account) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &Account,
        to: &Account,
        amount: Amount,
    ) -> Result<(), CustodyError> {
        if from == to {
            // Still reject an unfunded self-transfer.
            let available = self.balance_of(from);
            if available < amount {
                return Err(CustodyError::InsufficientFunds {
                    account: from.clone(),
                    available,
                    requested: amount,
                });
            }
            return Ok(());
        }

        // Check the credit side first so a failed transfer leaves no trace.
        let to_balance = self.balance_of(to);
        if to_balance.checked_add(amount).is_none() {
            return Err(CustodyError::Overflow { account: to.clone() });
        }

        self.debit(from, amount)?;
        self.credit(to, amount)?;

        debug!(
            asset = %self.symbol,
            from = %from,
            to = %to,
            amount = %amount,
            "custody transfer"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(s: &str) -> Account {
        Account::from(s)
    }

    #[test]
    fn mint_credits_and_tracks_supply() {
        let mut ledger = InMemoryAssetLedger::new("WETH");
        ledger.mint(&acct("alice"), 500).unwrap();
        ledger.mint(&acct("alice"), 250).unwrap();
        assert_eq!(ledger.balance_of(&acct("alice")), 750);
        assert_eq!(ledger.total_supply(), 750);
        assert_eq!(ledger.symbol(), "WETH");
    }

    #[test]
    fn transfer_moves_funds() {
        let mut ledger = InMemoryAssetLedger::new("WETH");
        ledger.mint(&acct("alice"), 1_000).unwrap();
        ledger.transfer(&acct("alice"), &acct("bob"), 400).unwrap();
        assert_eq!(ledger.balance_of(&acct("alice")), 600);
        assert_eq!(ledger.balance_of(&acct("bob")), 400);
        assert_eq!(ledger.total_supply(), 1_000);
    }

    #[test]
    fn transfer_insufficient_rejected_without_side_effects() {
        let mut ledger = InMemoryAssetLedger::new("WETH");
        ledger.mint(&acct("alice"), 100).unwrap();
        let err = ledger
            .transfer(&acct("alice"), &acct("bob"), 101)
            .unwrap_err();
        assert!(matches!(
            err,
            CustodyError::InsufficientFunds {
                available: 100,
                requested: 101,
                ..
            }
        ));
        assert_eq!(ledger.balance_of(&acct("alice")), 100);
        assert_eq!(ledger.balance_of(&acct("bob")), 0);
    }

    #[test]
    fn mint_overflow_rejected_without_side_effects() {
        let mut ledger = InMemoryAssetLedger::new("WETH");
        ledger.mint(&acct("a"), 10).unwrap();
        let err = ledger.mint(&acct("b"), u128::MAX - 5).unwrap_err();
        assert!(matches!(err, CustodyError::Overflow { .. }));
        assert_eq!(ledger.balance_of(&acct("b")), 0);
        assert_eq!(ledger.total_supply(), 10);
    }

    #[test]
    fn self_transfer_is_noop_but_checked() {
        let mut ledger = InMemoryAssetLedger::new("ETH");
        ledger.mint(&acct("alice"), 10).unwrap();
        ledger.transfer(&acct("alice"), &acct("alice"), 10).unwrap();
        assert_eq!(ledger.balance_of(&acct("alice")), 10);
        assert!(ledger
            .transfer(&acct("alice"), &acct("alice"), 11)
            .is_err());
    }

    #[test]
    fn burn_reduces_balance_and_supply() {
        let mut ledger = InMemoryAssetLedger::new("WETH");
        ledger.mint(&acct("vault"), 100).unwrap();
        ledger.burn(&acct("vault"), 30).unwrap();
        assert_eq!(ledger.balance_of(&acct("vault")), 70);
        assert_eq!(ledger.total_supply(), 70);
        assert!(ledger.burn(&acct("vault"), 71).is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut ledger = InMemoryAssetLedger::new("WETH");
        ledger.mint(&acct("alice"), 42).unwrap();
        let json = serde_json::to_string(&ledger).unwrap();
        let recovered: InMemoryAssetLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered.balance_of(&acct("alice")), 42);
        assert_eq!(recovered.total_supply(), 42);
    }
}
