//! # Vault Ledger
//!
//! A tokenized vault over a single base asset. Depositors hand assets to the
//! vault and receive shares; shares are later redeemed for a proportional
//! slice of whatever the vault holds at that time. The vault charges an
//! annualized management fee by minting new shares to a fee recipient,
//! diluting every other holder.
//!
//! ## Design Principles
//!
//! - **Custody is ground truth**: total assets are the vault account's
//!   balance in the custody ledger, re-read on every call. Yield or losses
//!   booked by anything outside the vault move the share price at once.
//! - **Round against the caller**: every conversion rounds in the
//!   direction that keeps value in the vault (see `tvault_protocol::math`).
//!   No sequence of deposits and redemptions can extract more than it put in.
//! - **Lazy fees**: nothing runs in the background. Each state-changing call
//!   first settles the fee owed since the previous accrual, so the price it
//!   trades at reflects fees up to the caller's timestamp.
//! - **Member waiver**: a caller holding at least one membership unit pays
//!   no fee for the call it triggers. The elapsed window is still consumed,
//!   so the waiver is all-or-nothing, not prorated.
//! - **All-or-nothing calls**: state is committed before custody is touched;
//!   a failed transfer restores the pre-call state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use tvault_protocol::config::{
    BPS_DENOMINATOR, DEFAULT_MANAGEMENT_FEE_BPS, MAX_MANAGEMENT_FEE_BPS, SECONDS_PER_YEAR,
    VALID_POOL_FEE_TIERS,
};
use tvault_protocol::math::{self, MathError, Rounding};
use tvault_protocol::{Account, Amount, AssetLedger, CallContext, CustodyError, Timestamp};

use crate::atomic::atomically;
use crate::membership::MembershipRegistry;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Zero-amount deposits, mints, withdrawals and redemptions are rejected.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The deposit is too small to buy a single share at the current price.
    #[error("deposit of {assets} would mint zero shares")]
    ZeroShares {
        /// Assets offered.
        assets: Amount,
    },

    /// The redemption is too small to be worth a single unit of the asset.
    #[error("redeeming {shares} shares would return zero assets")]
    ZeroAssets {
        /// Shares offered.
        shares: Amount,
    },

    /// Shares are outstanding but the vault holds no assets; the price is
    /// undefined and new money cannot enter.
    #[error("vault is insolvent: {shares} shares outstanding against zero assets")]
    Insolvent {
        /// Outstanding share supply.
        shares: Amount,
    },

    /// A share (or vault asset) balance is too low.
    #[error("insufficient balance for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account: Account,
        /// What it holds.
        available: Amount,
        /// What the call needed.
        requested: Amount,
    },

    /// The caller may not move this many of the owner's shares.
    #[error("insufficient allowance: {spender} may spend {allowed} of {owner}'s shares, needs {requested}")]
    InsufficientAllowance {
        /// The share owner.
        owner: Account,
        /// The caller acting on the owner's behalf.
        spender: Account,
        /// Remaining allowance.
        allowed: Amount,
        /// Shares the call needed.
        requested: Amount,
    },

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

/// Runtime parameters of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// May change fee parameters and rebalancing targets.
    pub admin: Account,
    /// Receives the dilution shares minted as management fee.
    pub fee_recipient: Account,
    /// Annualized fee rate in basis points.
    pub management_fee_bps: u16,
}

impl VaultConfig {
    /// Default fee rate, collected by the admin.
    pub fn new(admin: Account) -> Self {
        Self {
            fee_recipient: admin.clone(),
            admin,
            management_fee_bps: DEFAULT_MANAGEMENT_FEE_BPS,
        }
    }

    /// Checks the fee rate is within protocol limits.
    pub fn validate(&self) -> Result<(), VaultError> {
        validate_fee_bps(self.management_fee_bps)
    }
}

fn validate_fee_bps(bps: u16) -> Result<(), VaultError> {
    if bps > MAX_MANAGEMENT_FEE_BPS {
        return Err(VaultError::InvalidConfig(format!(
            "management fee {} bps exceeds maximum {} bps",
            bps, MAX_MANAGEMENT_FEE_BPS
        )));
    }
    Ok(())
}

/// A rebalancing target: hold `weight_bps` of the portfolio in `asset`,
/// traded through the pool with fee tier `pool_fee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAllocation {
    /// The target asset.
    pub asset: Account,
    /// Portfolio share in basis points.
    pub weight_bps: u16,
    /// Swap pool fee tier, in hundredths of a basis point.
    pub pool_fee: u32,
}

/// The outcome of settling management fees at a given time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccrual {
    /// Seconds since the previous accrual.
    pub elapsed: u64,
    /// Fee owed, in asset terms.
    pub fee_assets: Amount,
    /// Shares minted to the fee recipient.
    pub fee_shares: Amount,
}

/// The vault's share ledger and fee state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultLedger {
    /// Custody account holding the vault's base asset.
    account: Account,
    config: VaultConfig,
    total_shares: Amount,
    share_balances: HashMap<Account, Amount>,
    /// owner -> spender -> shares.
    allowances: HashMap<Account, HashMap<Account, Amount>>,
    last_fee_accrual: Timestamp,
    target_weights: Vec<TargetAllocation>,
}

impl VaultLedger {
    /// Creates an empty vault whose assets live in custody under `account`.
    /// Fees start accruing from `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the config fails validation.
    pub fn new(
        account: Account,
        config: VaultConfig,
        created_at: Timestamp,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        Ok(Self {
            account,
            config,
            total_shares: 0,
            share_balances: HashMap::new(),
            allowances: HashMap::new(),
            last_fee_accrual: created_at,
            target_weights: Vec::new(),
        })
    }

    // -- Views ---------------------------------------------------------------

    /// The custody account of this vault.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Current configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Base asset held by the vault.
    pub fn total_assets<L: AssetLedger>(&self, custody: &L) -> Amount {
        custody.balance_of(&self.account)
    }

    /// Outstanding share supply.
    pub fn total_supply(&self) -> Amount {
        self.total_shares
    }

    /// Shares held by `account`.
    pub fn balance_of(&self, account: &Account) -> Amount {
        self.share_balances.get(account).copied().unwrap_or(0)
    }

    /// Shares `spender` may still move on behalf of `owner`.
    pub fn allowance(&self, owner: &Account, spender: &Account) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Time of the last fee settlement.
    pub fn last_fee_accrual(&self) -> Timestamp {
        self.last_fee_accrual
    }

    /// Whether calls by `account` skip the management fee.
    pub fn is_fee_exempt<M: MembershipRegistry>(&self, members: &M, account: &Account) -> bool {
        members.qualifies_for_fee_waiver(account)
    }

    /// All rebalancing targets, in the order they were set.
    pub fn target_weights(&self) -> &[TargetAllocation] {
        &self.target_weights
    }

    /// The rebalancing target for `asset`, if any.
    pub fn target_weight(&self, asset: &Account) -> Option<&TargetAllocation> {
        self.target_weights.iter().find(|t| &t.asset == asset)
    }

    /// Shares `assets` buys at the stored price, floored. Ignores pending fees.
    ///
    /// Fails with [`VaultError::Insolvent`] where a deposit would.
    pub fn convert_to_shares<L: AssetLedger>(
        &self,
        custody: &L,
        assets: Amount,
    ) -> Result<Amount, VaultError> {
        let total_assets = self.total_assets(custody);
        if self.total_shares == 0 {
            return Ok(assets);
        }
        if total_assets == 0 {
            return Err(VaultError::Insolvent {
                shares: self.total_shares,
            });
        }
        Ok(math::mul_div(assets, self.total_shares, total_assets, Rounding::Down)?)
    }

    /// Assets `shares` is worth at the stored price, floored. Ignores pending fees.
    pub fn convert_to_assets<L: AssetLedger>(
        &self,
        custody: &L,
        shares: Amount,
    ) -> Result<Amount, VaultError> {
        if self.total_shares == 0 {
            return Ok(shares);
        }
        let total_assets = self.total_assets(custody);
        Ok(math::mul_div(shares, total_assets, self.total_shares, Rounding::Down)?)
    }

    /// Most assets `owner` could withdraw at the stored price.
    pub fn max_withdraw<L: AssetLedger>(
        &self,
        custody: &L,
        owner: &Account,
    ) -> Result<Amount, VaultError> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        self.convert_to_assets(custody, self.balance_of(owner))
    }

    /// Most shares `owner` could redeem.
    pub fn max_redeem(&self, owner: &Account) -> Amount {
        self.balance_of(owner)
    }

    /// The fee a call by `ctx.caller` at `ctx.timestamp` would settle.
    pub fn pending_fee<L: AssetLedger, M: MembershipRegistry>(
        &self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
    ) -> Result<FeeAccrual, VaultError> {
        self.compute_fee(self.total_assets(custody), members, ctx)
    }

    /// Shares [`deposit`](Self::deposit) would mint for `assets` right now.
    pub fn preview_deposit<L: AssetLedger, M: MembershipRegistry>(
        &self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
        assets: Amount,
    ) -> Result<Amount, VaultError> {
        let (total_assets, total_shares) = self.settled_totals(custody, members, ctx)?;
        shares_for_deposit(assets, total_assets, total_shares)
    }

    /// Assets [`mint`](Self::mint) would charge for `shares` right now.
    pub fn preview_mint<L: AssetLedger, M: MembershipRegistry>(
        &self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
        shares: Amount,
    ) -> Result<Amount, VaultError> {
        let (total_assets, total_shares) = self.settled_totals(custody, members, ctx)?;
        assets_for_mint(shares, total_assets, total_shares)
    }

    /// Shares [`withdraw`](Self::withdraw) would burn for `assets` right now.
    pub fn preview_withdraw<L: AssetLedger, M: MembershipRegistry>(
        &self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
        assets: Amount,
    ) -> Result<Amount, VaultError> {
        let (total_assets, total_shares) = self.settled_totals(custody, members, ctx)?;
        shares_for_withdraw(&self.account, assets, total_assets, total_shares)
    }

    /// Assets [`redeem`](Self::redeem) would return for `shares` right now.
    pub fn preview_redeem<L: AssetLedger, M: MembershipRegistry>(
        &self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
        shares: Amount,
    ) -> Result<Amount, VaultError> {
        let (total_assets, total_shares) = self.settled_totals(custody, members, ctx)?;
        assets_for_redeem(shares, total_assets, total_shares)
    }

    // -- Deposits & Withdrawals ----------------------------------------------

    /// Pulls `assets` from the caller and mints shares to `receiver`.
    ///
    /// An empty vault prices shares 1:1. Otherwise the caller receives
    /// `floor(assets * total_shares / total_assets)`, measured after the
    /// pending fee has been settled.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ZeroAmount`] for a zero deposit.
    /// - [`VaultError::ZeroShares`] if `assets` buys less than one share.
    /// - [`VaultError::Insolvent`] if shares exist but assets do not.
    /// - [`VaultError::Custody`] if the caller cannot fund the deposit.
    pub fn deposit<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &mut L,
        members: &M,
        ctx: &CallContext,
        assets: Amount,
        receiver: &Account,
    ) -> Result<Amount, VaultError> {
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }

        atomically(self, |vault| {
            let total_assets = vault.total_assets(custody);
            vault.accrue_fee(total_assets, members, ctx)?;

            let shares = shares_for_deposit(assets, total_assets, vault.total_shares)?;
            vault.credit_shares(receiver, shares)?;

            custody.transfer_from(&ctx.caller, &vault.account, assets)?;

            info!(
                caller = %ctx.caller,
                receiver = %receiver,
                assets = %assets,
                shares = %shares,
                "deposit"
            );
            Ok(shares)
        })
    }

    /// Mints exactly `shares` to `receiver`, pulling however many assets
    /// they cost (rounded up) from the caller.
    ///
    /// # Errors
    ///
    /// Same as [`deposit`](Self::deposit), minus `ZeroShares`.
    pub fn mint<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &mut L,
        members: &M,
        ctx: &CallContext,
        shares: Amount,
        receiver: &Account,
    ) -> Result<Amount, VaultError> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }

        atomically(self, |vault| {
            let total_assets = vault.total_assets(custody);
            vault.accrue_fee(total_assets, members, ctx)?;

            let assets = assets_for_mint(shares, total_assets, vault.total_shares)?;
            vault.credit_shares(receiver, shares)?;

            custody.transfer_from(&ctx.caller, &vault.account, assets)?;

            info!(
                caller = %ctx.caller,
                receiver = %receiver,
                assets = %assets,
                shares = %shares,
                "deposit"
            );
            Ok(assets)
        })
    }

    /// Burns however many of `owner`'s shares (rounded up) it takes to send
    /// exactly `assets` to `receiver`.
    ///
    /// A caller other than `owner` spends its share allowance.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ZeroAmount`] for a zero withdrawal.
    /// - [`VaultError::InsufficientBalance`] if `owner` (or the vault) holds too little.
    /// - [`VaultError::InsufficientAllowance`] if the caller may not spend that much.
    pub fn withdraw<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &mut L,
        members: &M,
        ctx: &CallContext,
        assets: Amount,
        receiver: &Account,
        owner: &Account,
    ) -> Result<Amount, VaultError> {
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }

        atomically(self, |vault| {
            let total_assets = vault.total_assets(custody);
            vault.accrue_fee(total_assets, members, ctx)?;

            let shares =
                shares_for_withdraw(&vault.account, assets, total_assets, vault.total_shares)?;
            vault.spend_allowance(owner, &ctx.caller, shares)?;
            vault.debit_shares(owner, shares)?;

            custody.transfer(&vault.account, receiver, assets)?;

            info!(
                caller = %ctx.caller,
                owner = %owner,
                receiver = %receiver,
                assets = %assets,
                shares = %shares,
                "withdraw"
            );
            Ok(shares)
        })
    }

    /// Burns `shares` from `owner` and sends their floored asset value to
    /// `receiver`.
    ///
    /// If this empties the share supply, whatever rounding dust remains in
    /// custody stays with the vault and seeds the next depositor's price.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ZeroAmount`] for a zero redemption.
    /// - [`VaultError::InsufficientBalance`] if `owner` holds fewer shares.
    /// - [`VaultError::ZeroAssets`] if the shares are worth less than one unit.
    /// - [`VaultError::InsufficientAllowance`] if the caller may not spend them.
    pub fn redeem<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &mut L,
        members: &M,
        ctx: &CallContext,
        shares: Amount,
        receiver: &Account,
        owner: &Account,
    ) -> Result<Amount, VaultError> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }

        atomically(self, |vault| {
            let total_assets = vault.total_assets(custody);
            vault.accrue_fee(total_assets, members, ctx)?;

            let available = vault.balance_of(owner);
            if available < shares {
                return Err(VaultError::InsufficientBalance {
                    account: owner.clone(),
                    available,
                    requested: shares,
                });
            }
            let assets = assets_for_redeem(shares, total_assets, vault.total_shares)?;
            vault.spend_allowance(owner, &ctx.caller, shares)?;
            vault.debit_shares(owner, shares)?;

            custody.transfer(&vault.account, receiver, assets)?;

            info!(
                caller = %ctx.caller,
                owner = %owner,
                receiver = %receiver,
                assets = %assets,
                shares = %shares,
                "withdraw"
            );
            Ok(assets)
        })
    }

    /// Settles the pending management fee without doing anything else.
    /// Anyone may call it; the member waiver applies to the caller as usual.
    pub fn accrue<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
    ) -> Result<FeeAccrual, VaultError> {
        let total_assets = self.total_assets(custody);
        atomically(self, |vault| vault.accrue_fee(total_assets, members, ctx))
    }

    // -- Share Token ---------------------------------------------------------

    /// Moves `amount` of the caller's shares to `to`.
    pub fn transfer_shares(
        &mut self,
        ctx: &CallContext,
        to: &Account,
        amount: Amount,
    ) -> Result<(), VaultError> {
        let available = self.balance_of(&ctx.caller);
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                account: ctx.caller.clone(),
                available,
                requested: amount,
            });
        }
        if &ctx.caller == to || amount == 0 {
            return Ok(());
        }
        let credited = math::add(self.balance_of(to), amount)?;

        self.share_balances
            .insert(ctx.caller.clone(), available - amount);
        self.share_balances.insert(to.clone(), credited);

        debug!(from = %ctx.caller, to = %to, shares = %amount, "shares transferred");
        Ok(())
    }

    /// Lets `spender` move up to `amount` of the caller's shares. Replaces
    /// any previous allowance; `Amount::MAX` never decreases.
    pub fn approve(&mut self, ctx: &CallContext, spender: &Account, amount: Amount) {
        self.allowances
            .entry(ctx.caller.clone())
            .or_default()
            .insert(spender.clone(), amount);
        debug!(owner = %ctx.caller, spender = %spender, shares = %amount, "approval");
    }

    // -- Administration ------------------------------------------------------

    /// Changes the fee rate. Fees owed up to now settle at the old rate.
    pub fn set_management_fee<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
        bps: u16,
    ) -> Result<(), VaultError> {
        self.require_admin(ctx, "set the management fee")?;
        validate_fee_bps(bps)?;

        let total_assets = self.total_assets(custody);
        atomically(self, |vault| {
            vault.accrue_fee(total_assets, members, ctx)?;
            info!(old = vault.config.management_fee_bps, new = bps, "management fee updated");
            vault.config.management_fee_bps = bps;
            Ok(())
        })
    }

    /// Changes who collects fees. Fees owed up to now go to the old recipient.
    pub fn set_fee_recipient<L: AssetLedger, M: MembershipRegistry>(
        &mut self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
        recipient: Account,
    ) -> Result<(), VaultError> {
        self.require_admin(ctx, "set the fee recipient")?;

        let total_assets = self.total_assets(custody);
        atomically(self, |vault| {
            vault.accrue_fee(total_assets, members, ctx)?;
            info!(old = %vault.config.fee_recipient, new = %recipient, "fee recipient updated");
            vault.config.fee_recipient = recipient;
            Ok(())
        })
    }

    /// Replaces the rebalancing targets.
    ///
    /// Weights must add up to exactly 100%, each asset may appear once, and
    /// every pool fee must be a recognised tier. An empty list clears the
    /// targets.
    pub fn set_target_weights(
        &mut self,
        ctx: &CallContext,
        targets: Vec<TargetAllocation>,
    ) -> Result<(), VaultError> {
        self.require_admin(ctx, "set target weights")?;

        if !targets.is_empty() {
            let mut seen = HashSet::new();
            let mut total: u128 = 0;
            for t in &targets {
                if !seen.insert(&t.asset) {
                    return Err(VaultError::InvalidConfig(format!(
                        "duplicate target asset {}",
                        t.asset
                    )));
                }
                if !VALID_POOL_FEE_TIERS.contains(&t.pool_fee) {
                    return Err(VaultError::InvalidConfig(format!(
                        "pool fee {} for {} is not a valid tier",
                        t.pool_fee, t.asset
                    )));
                }
                total += u128::from(t.weight_bps);
            }
            if total != BPS_DENOMINATOR {
                return Err(VaultError::InvalidConfig(format!(
                    "target weights sum to {} bps, expected {}",
                    total, BPS_DENOMINATOR
                )));
            }
        }

        info!(targets = targets.len(), "target weights updated");
        self.target_weights = targets;
        Ok(())
    }

    // -- Internals -----------------------------------------------------------

    fn require_admin(&self, ctx: &CallContext, action: &'static str) -> Result<(), VaultError> {
        if ctx.caller != self.config.admin {
            warn!(caller = %ctx.caller, action, "rejected admin call");
            return Err(VaultError::Unauthorized {
                caller: ctx.caller.clone(),
                action,
            });
        }
        Ok(())
    }

    fn compute_fee<M: MembershipRegistry>(
        &self,
        total_assets: Amount,
        members: &M,
        ctx: &CallContext,
    ) -> Result<FeeAccrual, VaultError> {
        let elapsed = ctx.timestamp.saturating_sub(self.last_fee_accrual);
        let mut accrual = FeeAccrual {
            elapsed,
            ..FeeAccrual::default()
        };
        if elapsed == 0
            || self.config.management_fee_bps == 0
            || self.total_shares == 0
            || total_assets == 0
            || self.is_fee_exempt(members, &ctx.caller)
        {
            return Ok(accrual);
        }

        let rate = u128::from(self.config.management_fee_bps) * u128::from(elapsed);
        let period = BPS_DENOMINATOR * u128::from(SECONDS_PER_YEAR);
        accrual.fee_assets = math::mul_div(total_assets, rate, period, Rounding::Down)?;
        accrual.fee_shares = math::mul_div(
            accrual.fee_assets,
            self.total_shares,
            total_assets,
            Rounding::Down,
        )?;
        Ok(accrual)
    }

    /// Mints the pending fee to the recipient and advances the accrual clock.
    fn accrue_fee<M: MembershipRegistry>(
        &mut self,
        total_assets: Amount,
        members: &M,
        ctx: &CallContext,
    ) -> Result<FeeAccrual, VaultError> {
        let accrual = self.compute_fee(total_assets, members, ctx)?;
        if accrual.fee_shares > 0 {
            let recipient = self.config.fee_recipient.clone();
            self.credit_shares(&recipient, accrual.fee_shares)?;
            info!(
                recipient = %recipient,
                elapsed = accrual.elapsed,
                fee_assets = %accrual.fee_assets,
                fee_shares = %accrual.fee_shares,
                "fee accrued"
            );
        } else if accrual.elapsed > 0 {
            debug!(caller = %ctx.caller, elapsed = accrual.elapsed, "no fee due");
        }
        self.last_fee_accrual = self.last_fee_accrual.max(ctx.timestamp);
        Ok(accrual)
    }

    /// Totals as they would be after settling the fee for `ctx`.
    fn settled_totals<L: AssetLedger, M: MembershipRegistry>(
        &self,
        custody: &L,
        members: &M,
        ctx: &CallContext,
    ) -> Result<(Amount, Amount), VaultError> {
        let total_assets = self.total_assets(custody);
        let accrual = self.compute_fee(total_assets, members, ctx)?;
        let total_shares = math::add(self.total_shares, accrual.fee_shares)?;
        Ok((total_assets, total_shares))
    }

    fn credit_shares(&mut self, to: &Account, shares: Amount) -> Result<(), VaultError> {
        let total = math::add(self.total_shares, shares)?;
        let balance = math::add(self.balance_of(to), shares)?;
        self.total_shares = total;
        self.share_balances.insert(to.clone(), balance);
        Ok(())
    }

    fn debit_shares(&mut self, from: &Account, shares: Amount) -> Result<(), VaultError> {
        let available = self.balance_of(from);
        if available < shares {
            return Err(VaultError::InsufficientBalance {
                account: from.clone(),
                available,
                requested: shares,
            });
        }
        // total_shares is the sum of all balances, so it covers this one.
        self.total_shares -= shares;
        if available == shares {
            self.share_balances.remove(from);
        } else {
            self.share_balances.insert(from.clone(), available - shares);
        }
        Ok(())
    }

    fn spend_allowance(
        &mut self,
        owner: &Account,
        spender: &Account,
        shares: Amount,
    ) -> Result<(), VaultError> {
        if owner == spender {
            return Ok(());
        }
        let allowed = self.allowance(owner, spender);
        if allowed < shares {
            return Err(VaultError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowed,
                requested: shares,
            });
        }
        if allowed != Amount::MAX {
            self.allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), allowed - shares);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

fn shares_for_deposit(
    assets: Amount,
    total_assets: Amount,
    total_shares: Amount,
) -> Result<Amount, VaultError> {
    if total_shares == 0 {
        return Ok(assets);
    }
    if total_assets == 0 {
        return Err(VaultError::Insolvent {
            shares: total_shares,
        });
    }
    let shares = math::mul_div(assets, total_shares, total_assets, Rounding::Down)?;
    if shares == 0 {
        return Err(VaultError::ZeroShares { assets });
    }
    Ok(shares)
}

fn assets_for_mint(
    shares: Amount,
    total_assets: Amount,
    total_shares: Amount,
) -> Result<Amount, VaultError> {
    if total_shares == 0 {
        return Ok(shares);
    }
    if total_assets == 0 {
        return Err(VaultError::Insolvent {
            shares: total_shares,
        });
    }
    Ok(math::mul_div(shares, total_assets, total_shares, Rounding::Up)?)
}

fn shares_for_withdraw(
    vault: &Account,
    assets: Amount,
    total_assets: Amount,
    total_shares: Amount,
) -> Result<Amount, VaultError> {
    if total_shares == 0 || assets > total_assets {
        return Err(VaultError::InsufficientBalance {
            account: vault.clone(),
            available: if total_shares == 0 { 0 } else { total_assets },
            requested: assets,
        });
    }
    Ok(math::mul_div(assets, total_shares, total_assets, Rounding::Up)?)
}

fn assets_for_redeem(
    shares: Amount,
    total_assets: Amount,
    total_shares: Amount,
) -> Result<Amount, VaultError> {
    if total_shares == 0 {
        return Err(VaultError::ZeroAssets { shares });
    }
    let assets = math::mul_div(shares, total_assets, total_shares, Rounding::Down)?;
    if assets == 0 {
        return Err(VaultError::ZeroAssets { shares });
    }
    Ok(assets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
