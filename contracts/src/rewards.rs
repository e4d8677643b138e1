//! # Membership Reward Ledger
//!
//! Issues a capped series of sequentially numbered membership units and
//! distributes lump-sum reward deposits pro-rata over the units that exist
//! at the moment of each deposit.
//!
//! ## Accumulator Model
//!
//! Instead of touching every unit on every deposit, the ledger keeps one
//! global number: `acc_reward_per_unit`, the total reward a unit minted at
//! genesis would have earned so far, scaled by `REWARD_SCALE` (1e18). Each unit
//! remembers the accumulator value at its mint time (its snapshot):
//!
//! ```text
//! deposit(amount):  acc += amount * SCALE / total_units        (floor)
//! accrued(unit)  =  (acc - unit.snapshot) / SCALE               (floor)
//! unclaimed(unit) = accrued(unit) - unit.claimed
//! ```
//!
//! A unit minted after a deposit starts from the post-deposit accumulator
//! and so never sees rewards paid before it existed. Deposits, claims and
//! mints are all O(1) regardless of how many units exist.
//!
//! ## Dust
//!
//! Both floors leave value undistributed: at most `total_units` scaled wei
//! per deposit in the accumulator, and less than one wei per unit when
//! descaling. That dust stays in the ledger's custody balance forever. It
//! counts as reward liability, so the admin can never withdraw it either.
//!
//! ## Funds
//!
//! Mint payments and reward deposits share one custody account. The ledger
//! separates them by bookkeeping: `total_rewards_deposited - total_claimed`
//! is earmarked for unit holders; everything above that is admin proceeds.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use tvault_protocol::config::{DEFAULT_MINT_PRICE, MAX_UNITS};
use tvault_protocol::math::{self, MathError, U256};
use tvault_protocol::{Account, Amount, AssetLedger, CallContext, CustodyError, Timestamp, UnitId};

use crate::atomic::atomically;
use crate::membership::MembershipRegistry;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during reward ledger operations.
#[derive(Debug, Error)]
pub enum RewardError {
    /// The mint payment is below the unit price.
    #[error("insufficient payment: unit costs {required}, paid {paid}")]
    InsufficientPayment {
        /// Current mint price.
        required: Amount,
        /// Payment attached to the call.
        paid: Amount,
    },

    /// Every unit has already been minted.
    #[error("capacity exceeded: all {cap} units minted")]
    CapacityExceeded {
        /// The unit cap.
        cap: u64,
    },

    /// Zero-amount reward deposits and withdrawals are rejected.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// A reward deposit arrived before any unit existed to receive it.
    #[error("no units minted: reward deposit has no recipients")]
    NoRecipients,

    /// The unit was never minted.
    #[error("unknown unit #{0}")]
    UnknownUnit(UnitId),

    /// The unit has no unclaimed reward.
    #[error("unit #{0} has nothing to claim")]
    NothingToClaim(UnitId),

    /// The caller lacks the rights for this operation.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// The calling account.
        caller: Account,
        /// What it tried to do.
        action: &'static str,
    },

    /// Rejected configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Fixed-point arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),

    /// The custody ledger rejected a transfer.
    #[error(transparent)]
    Custody(#[from] CustodyError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Runtime parameters of a reward ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// May withdraw mint proceeds and change the price.
    pub admin: Account,
    /// Native-currency price of one unit.
    pub mint_price: Amount,
    /// Lifetime unit supply. At most [`MAX_UNITS`].
    pub max_units: u64,
}

impl RewardConfig {
    /// Default price and cap, administered by `admin`.
    pub fn new(admin: Account) -> Self {
        Self {
            admin,
            mint_price: DEFAULT_MINT_PRICE,
            max_units: MAX_UNITS,
        }
    }

    /// Checks the cap is within protocol limits.
    pub fn validate(&self) -> Result<(), RewardError> {
        if self.max_units == 0 || self.max_units > MAX_UNITS {
            return Err(RewardError::InvalidConfig(format!(
                "max_units must be in 1..={}, got {}",
                MAX_UNITS, self.max_units
            )));
        }
        Ok(())
    }
}

/// A minted membership unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Sequential id, starting at 1.
    pub id: UnitId,
    /// Current holder.
    pub owner: Account,
    /// `acc_reward_per_unit` at mint time. Never changes.
    pub reward_snapshot: U256,
    /// Lifetime rewards paid out for this unit.
    pub claimed: Amount,
    /// Block time of the mint.
    pub minted_at: Timestamp,
}

/// The membership unit registry and its reward distribution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardLedger {
    /// Custody account holding mint proceeds and reward deposits.
    account: Account,
    config: RewardConfig,
    units: BTreeMap<UnitId, Unit>,
    /// Units held per account.
    holdings: HashMap<Account, u64>,
    /// Scaled by `REWARD_SCALE`. Monotonically non-decreasing.
    acc_reward_per_unit: U256,
    total_rewards_deposited: Amount,
    total_claimed: Amount,
}

impl RewardLedger {
    /// Creates an empty ledger whose funds live in custody under `account`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidConfig`] if the config fails validation.
    pub fn new(account: Account, config: RewardConfig) -> Result<Self, RewardError> {
        config.validate()?;
        Ok(Self {
            account,
            config,
            units: BTreeMap::new(),
            holdings: HashMap::new(),
            acc_reward_per_unit: U256::zero(),
            total_rewards_deposited: 0,
            total_claimed: 0,
        })
    }

    // -- Views ---------------------------------------------------------------

    /// The custody account of this ledger.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Current configuration.
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Number of units minted so far.
    pub fn total_units(&self) -> u64 {
        self.units.len() as u64
    }

    /// The global reward accumulator, scaled by `REWARD_SCALE`.
    pub fn acc_reward_per_unit(&self) -> U256 {
        self.acc_reward_per_unit
    }

    /// Sum of every reward deposit ever received.
    pub fn total_rewards_deposited(&self) -> Amount {
        self.total_rewards_deposited
    }

    /// Sum of every reward claim ever paid.
    pub fn total_claimed(&self) -> Amount {
        self.total_claimed
    }

    /// Funds earmarked for unit holders: unclaimed rewards plus dust.
    pub fn reward_liabilities(&self) -> Amount {
        self.total_rewards_deposited.saturating_sub(self.total_claimed)
    }

    /// Looks up a unit.
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Ids of the units held by `owner`, ascending.
    pub fn units_of(&self, owner: &Account) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| &u.owner == owner)
            .map(|u| u.id)
            .collect()
    }

    /// Lifetime reward earned by `id`, claimed or not.
    pub fn accrued_reward(&self, id: UnitId) -> Result<Amount, RewardError> {
        let unit = self.units.get(&id).ok_or(RewardError::UnknownUnit(id))?;
        let earned = self
            .acc_reward_per_unit
            .checked_sub(unit.reward_snapshot)
            .ok_or(MathError::Underflow)?;
        Ok(math::descale(earned)?)
    }

    /// Reward `id` could claim right now.
    pub fn unclaimed_reward(&self, id: UnitId) -> Result<Amount, RewardError> {
        let accrued = self.accrued_reward(id)?;
        let claimed = self.units.get(&id).map(|u| u.claimed).unwrap_or(0);
        Ok(math::sub(accrued, claimed)?)
    }

    /// Custody balance not earmarked for rewards: what the admin may withdraw.
    pub fn admin_balance<L: AssetLedger>(&self, custody: &L) -> Amount {
        custody
            .balance_of(&self.account)
            .saturating_sub(self.reward_liabilities())
    }

    // -- Mutations -----------------------------------------------------------

    /// Mints the next unit to `owner`, paid for by the caller.
    ///
    /// The new unit's reward snapshot is the current accumulator, so it
    /// earns nothing from deposits made before this call. The full
    /// `payment` is kept as admin proceeds, overpayment included.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::CapacityExceeded`] once `max_units` exist,
    /// [`RewardError::InsufficientPayment`] if `payment` is below the price,
    /// and [`RewardError::Custody`] if the caller cannot fund the payment.
    pub fn mint_unit<L: AssetLedger>(
        &mut self,
        custody: &mut L,
        ctx: &CallContext,
        owner: &Account,
        payment: Amount,
    ) -> Result<UnitId, RewardError> {
        if self.total_units() >= self.config.max_units {
            return Err(RewardError::CapacityExceeded {
                cap: self.config.max_units,
            });
        }
        if payment < self.config.mint_price {
            return Err(RewardError::InsufficientPayment {
                required: self.config.mint_price,
                paid: payment,
            });
        }

        atomically(self, |ledger| {
            let id = ledger.total_units() + 1;
            ledger.units.insert(
                id,
                Unit {
                    id,
                    owner: owner.clone(),
                    reward_snapshot: ledger.acc_reward_per_unit,
                    claimed: 0,
                    minted_at: ctx.timestamp,
                },
            );
            *ledger.holdings.entry(owner.clone()).or_insert(0) += 1;

            custody.transfer_from(&ctx.caller, &ledger.account, payment)?;

            info!(unit = id, owner = %owner, payment = %payment, "unit minted");
            Ok(id)
        })
    }

    /// Distributes `amount`, paid by the caller, over all existing units.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::ZeroAmount`] for a zero deposit and
    /// [`RewardError::NoRecipients`] while no unit exists.
    pub fn deposit_rewards<L: AssetLedger>(
        &mut self,
        custody: &mut L,
        ctx: &CallContext,
        amount: Amount,
    ) -> Result<(), RewardError> {
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }
        let units = self.total_units();
        if units == 0 {
            return Err(RewardError::NoRecipients);
        }

        let increment = math::per_unit_increment(amount, units)?;
        let acc = self
            .acc_reward_per_unit
            .checked_add(increment)
            .ok_or(MathError::Overflow)?;
        let deposited = math::add(self.total_rewards_deposited, amount)?;

        atomically(self, |ledger| {
            ledger.acc_reward_per_unit = acc;
            ledger.total_rewards_deposited = deposited;

            custody.transfer_from(&ctx.caller, &ledger.account, amount)?;

            info!(
                depositor = %ctx.caller,
                amount = %amount,
                units = units,
                "rewards deposited"
            );
            Ok(())
        })
    }

    /// Pays out everything unit `id` has earned and not yet claimed.
    ///
    /// `claimed` is updated before the transfer; it is the only guard
    /// against paying the same reward twice.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Unauthorized`] unless the caller holds `id`,
    /// and [`RewardError::NothingToClaim`] if the unclaimed reward is zero.
    pub fn claim_reward<L: AssetLedger>(
        &mut self,
        custody: &mut L,
        ctx: &CallContext,
        id: UnitId,
    ) -> Result<Amount, RewardError> {
        let unit = self.units.get(&id).ok_or(RewardError::UnknownUnit(id))?;
        if unit.owner != ctx.caller {
            return Err(RewardError::Unauthorized {
                caller: ctx.caller.clone(),
                action: "claim rewards for a unit it does not hold",
            });
        }

        let payout = self.unclaimed_reward(id)?;
        if payout == 0 {
            return Err(RewardError::NothingToClaim(id));
        }
        let claimed = math::add(unit.claimed, payout)?;
        let total_claimed = math::add(self.total_claimed, payout)?;

        atomically(self, |ledger| {
            if let Some(unit) = ledger.units.get_mut(&id) {
                unit.claimed = claimed;
            }
            ledger.total_claimed = total_claimed;

            custody.transfer(&ledger.account, &ctx.caller, payout)?;

            info!(unit = id, holder = %ctx.caller, amount = %payout, "reward claimed");
            Ok(payout)
        })
    }

    /// Moves unit `id` from the caller to `to`. Unclaimed rewards travel
    /// with the unit.
    pub fn transfer_unit(
        &mut self,
        ctx: &CallContext,
        id: UnitId,
        to: &Account,
    ) -> Result<(), RewardError> {
        let unit = self.units.get_mut(&id).ok_or(RewardError::UnknownUnit(id))?;
        if unit.owner != ctx.caller {
            return Err(RewardError::Unauthorized {
                caller: ctx.caller.clone(),
                action: "transfer a unit it does not hold",
            });
        }
        if &unit.owner == to {
            return Ok(());
        }

        unit.owner = to.clone();
        if let Some(count) = self.holdings.get_mut(&ctx.caller) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.holdings.remove(&ctx.caller);
            }
        }
        *self.holdings.entry(to.clone()).or_insert(0) += 1;

        info!(unit = id, from = %ctx.caller, to = %to, "unit transferred");
        Ok(())
    }

    /// Sends all non-reward funds to the admin.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Unauthorized`] for any caller but the admin and
    /// [`RewardError::ZeroAmount`] when there is nothing to withdraw.
    pub fn admin_withdraw<L: AssetLedger>(
        &mut self,
        custody: &mut L,
        ctx: &CallContext,
    ) -> Result<Amount, RewardError> {
        self.require_admin(ctx, "withdraw mint proceeds")?;

        let balance = custody.balance_of(&self.account);
        let liabilities = self.reward_liabilities();
        if balance < liabilities {
            warn!(
                balance = %balance,
                liabilities = %liabilities,
                "reward custody balance below liabilities"
            );
        }
        let amount = balance.saturating_sub(liabilities);
        if amount == 0 {
            return Err(RewardError::ZeroAmount);
        }

        custody.transfer(&self.account, &ctx.caller, amount)?;
        info!(admin = %ctx.caller, amount = %amount, "admin withdraw");
        Ok(amount)
    }

    /// Changes the unit price. Admin only.
    pub fn set_mint_price(&mut self, ctx: &CallContext, price: Amount) -> Result<(), RewardError> {
        self.require_admin(ctx, "set the mint price")?;
        info!(old = %self.config.mint_price, new = %price, "mint price updated");
        self.config.mint_price = price;
        Ok(())
    }

    fn require_admin(&self, ctx: &CallContext, action: &'static str) -> Result<(), RewardError> {
        if ctx.caller != self.config.admin {
            warn!(caller = %ctx.caller, action, "rejected admin call");
            return Err(RewardError::Unauthorized {
                caller: ctx.caller.clone(),
                action,
            });
        }
        Ok(())
    }
}

impl MembershipRegistry for RewardLedger {
    fn balance_of(&self, account: &Account) -> u64 {
        self.holdings.get(account).copied().unwrap_or(0)
    }

    fn owner_of(&self, unit: UnitId) -> Option<&Account> {
        self.units.get(&unit).map(|u| &u.owner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
