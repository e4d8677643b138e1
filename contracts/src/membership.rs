//! # Membership Registry
//!
//! The single read the vault performs into the membership side: how many
//! units does an account hold, and who holds a given unit. The reward
//! ledger implements it; tests and hosts with a separate NFT contract can
//! provide their own.

use std::collections::HashMap;

use tvault_protocol::{Account, UnitId};

/// Read-only view of membership-unit ownership.
pub trait MembershipRegistry {
    /// Number of units held by `account`.
    fn balance_of(&self, account: &Account) -> u64;

    /// Current holder of `unit`, or `None` if it was never minted.
    fn owner_of(&self, unit: UnitId) -> Option<&Account>;

    /// Holders of at least one unit are exempt from the vault management fee.
    fn qualifies_for_fee_waiver(&self, account: &Account) -> bool {
        self.balance_of(account) > 0
    }
}

/// A fixed ownership table. Useful when membership is managed elsewhere and
/// only a snapshot is available.
#[derive(Clone, Debug, Default)]
pub struct StaticMembership {
    owners: HashMap<UnitId, Account>,
    holdings: HashMap<Account, u64>,
}

impl StaticMembership {
    /// An empty table: nobody is a member.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `unit` as held by `owner`, replacing any previous holder.
    pub fn assign(&mut self, unit: UnitId, owner: Account) {
        if let Some(previous) = self.owners.insert(unit, owner.clone()) {
            if let Some(count) = self.holdings.get_mut(&previous) {
                *count = count.saturating_sub(1);
            }
        }
        *self.holdings.entry(owner).or_insert(0) += 1;
    }
}

impl MembershipRegistry for StaticMembership {
    fn balance_of(&self, account: &Account) -> u64 {
        self.holdings.get(account).copied().unwrap_or(0)
    }

    fn owner_of(&self, unit: UnitId) -> Option<&Account> {
        self.owners.get(&unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_grants_no_waiver() {
        let registry = StaticMembership::new();
        assert!(!registry.qualifies_for_fee_waiver(&Account::from("alice")));
        assert!(registry.owner_of(1).is_none());
    }

    #[test]
    fn reassignment_moves_holdings() {
        let mut registry = StaticMembership::new();
        registry.assign(1, Account::from("alice"));
        registry.assign(2, Account::from("alice"));
        assert_eq!(registry.balance_of(&Account::from("alice")), 2);

        registry.assign(1, Account::from("bob"));
        assert_eq!(registry.balance_of(&Account::from("alice")), 1);
        assert_eq!(registry.balance_of(&Account::from("bob")), 1);
        assert_eq!(registry.owner_of(1), Some(&Account::from("bob")));
        assert!(registry.qualifies_for_fee_waiver(&Account::from("bob")));
    }
}
