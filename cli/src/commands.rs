//! Dispatches parsed subcommands onto the ledgers.
//!
//! Every handler returns a JSON value describing the outcome; `main` prints
//! it. Ledger errors are wrapped with the operation name and bubble up as
//! `anyhow` errors, leaving the in-memory world untouched.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use tvault_contracts::{MembershipRegistry, TargetAllocation};
use tvault_protocol::{Account, AssetLedger, CallContext};

use crate::cli::{AssetKind, Commands};
use crate::state::World;

/// Runs one subcommand as `ctx.caller` at `ctx.timestamp`.
///
/// `Init` is not handled here; it creates the world instead of mutating it.
pub fn execute(world: &mut World, command: &Commands, ctx: &CallContext) -> Result<Value> {
    let caller = &ctx.caller;
    let or_caller = |account: &Option<String>| {
        account
            .as_deref()
            .map(Account::from)
            .unwrap_or_else(|| caller.clone())
    };

    let value = match command {
        Commands::Init(_) => bail!("init must be run on its own"),

        Commands::Status(args) => status(world, ctx, &args.accounts)?,

        Commands::Faucet(args) => {
            let ledger = match args.asset {
                AssetKind::Base => &mut world.base_asset,
                AssetKind::Native => &mut world.native,
            };
            let account = Account::from(args.account.as_str());
            let balance = ledger
                .mint(&account, args.amount)
                .context("faucet failed")?;
            json!({ "account": account, "balance": balance })
        }

        // -- Vault -----------------------------------------------------------
        Commands::Deposit(args) => {
            let receiver = or_caller(&args.receiver);
            let shares = world
                .vault
                .deposit(&mut world.base_asset, &world.rewards, ctx, args.assets, &receiver)
                .context("deposit failed")?;
            json!({ "receiver": receiver, "assets": args.assets, "shares": shares })
        }
        Commands::Mint(args) => {
            let receiver = or_caller(&args.receiver);
            let assets = world
                .vault
                .mint(&mut world.base_asset, &world.rewards, ctx, args.shares, &receiver)
                .context("mint failed")?;
            json!({ "receiver": receiver, "assets": assets, "shares": args.shares })
        }
        Commands::Withdraw(args) => {
            let receiver = or_caller(&args.receiver);
            let owner = or_caller(&args.owner);
            let shares = world
                .vault
                .withdraw(
                    &mut world.base_asset,
                    &world.rewards,
                    ctx,
                    args.amount,
                    &receiver,
                    &owner,
                )
                .context("withdraw failed")?;
            json!({ "owner": owner, "receiver": receiver, "assets": args.amount, "shares": shares })
        }
        Commands::Redeem(args) => {
            let receiver = or_caller(&args.receiver);
            let owner = or_caller(&args.owner);
            let assets = world
                .vault
                .redeem(
                    &mut world.base_asset,
                    &world.rewards,
                    ctx,
                    args.amount,
                    &receiver,
                    &owner,
                )
                .context("redeem failed")?;
            json!({ "owner": owner, "receiver": receiver, "assets": assets, "shares": args.amount })
        }
        Commands::TransferShares(args) => {
            let to = Account::from(args.to.as_str());
            world
                .vault
                .transfer_shares(ctx, &to, args.amount)
                .context("share transfer failed")?;
            json!({ "from": caller, "to": to, "shares": args.amount })
        }
        Commands::Approve(args) => {
            let spender = Account::from(args.spender.as_str());
            world.vault.approve(ctx, &spender, args.amount);
            json!({ "owner": caller, "spender": spender, "allowance": args.amount })
        }
        Commands::Accrue => {
            let accrual = world
                .vault
                .accrue(&world.base_asset, &world.rewards, ctx)
                .context("fee accrual failed")?;
            serde_json::to_value(accrual)?
        }
        Commands::SetFee(args) => {
            world
                .vault
                .set_management_fee(&world.base_asset, &world.rewards, ctx, args.bps)
                .context("set-fee failed")?;
            json!({ "management_fee_bps": args.bps })
        }
        Commands::SetFeeRecipient(args) => {
            let recipient = Account::from(args.account.as_str());
            world
                .vault
                .set_fee_recipient(&world.base_asset, &world.rewards, ctx, recipient.clone())
                .context("set-fee-recipient failed")?;
            json!({ "fee_recipient": recipient })
        }
        Commands::SetTargets(args) => {
            let targets = args
                .targets
                .iter()
                .map(|t| parse_target(t))
                .collect::<Result<Vec<_>>>()?;
            world
                .vault
                .set_target_weights(ctx, targets)
                .context("set-targets failed")?;
            json!({ "targets": world.vault.target_weights() })
        }

        // -- Membership ------------------------------------------------------
        Commands::MintUnit(args) => {
            let owner = or_caller(&args.owner);
            let payment = args.payment.unwrap_or(world.rewards.config().mint_price);
            let unit = world
                .rewards
                .mint_unit(&mut world.native, ctx, &owner, payment)
                .context("mint-unit failed")?;
            json!({ "unit": unit, "owner": owner, "payment": payment })
        }
        Commands::DepositRewards(args) => {
            world
                .rewards
                .deposit_rewards(&mut world.native, ctx, args.amount)
                .context("deposit-rewards failed")?;
            json!({
                "amount": args.amount,
                "units": world.rewards.total_units(),
                "acc_reward_per_unit": world.rewards.acc_reward_per_unit(),
            })
        }
        Commands::Claim(args) => {
            let paid = world
                .rewards
                .claim_reward(&mut world.native, ctx, args.unit)
                .context("claim failed")?;
            json!({ "unit": args.unit, "holder": caller, "paid": paid })
        }
        Commands::TransferUnit(args) => {
            let to = Account::from(args.to.as_str());
            world
                .rewards
                .transfer_unit(ctx, args.unit, &to)
                .context("unit transfer failed")?;
            json!({ "unit": args.unit, "from": caller, "to": to })
        }
        Commands::AdminWithdraw => {
            let amount = world
                .rewards
                .admin_withdraw(&mut world.native, ctx)
                .context("admin-withdraw failed")?;
            json!({ "admin": caller, "amount": amount })
        }
        Commands::SetMintPrice(args) => {
            world
                .rewards
                .set_mint_price(ctx, args.amount)
                .context("set-mint-price failed")?;
            json!({ "mint_price": args.amount })
        }
    };
    Ok(value)
}

/// Parses `ASSET:WEIGHT_BPS:POOL_FEE`.
fn parse_target(raw: &str) -> Result<TargetAllocation> {
    let mut parts = raw.split(':');
    let (Some(asset), Some(weight), Some(fee), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("target {:?} is not ASSET:WEIGHT_BPS:POOL_FEE", raw);
    };
    if asset.is_empty() {
        return Err(anyhow!("target {:?} has an empty asset", raw));
    }
    Ok(TargetAllocation {
        asset: Account::from(asset),
        weight_bps: weight
            .parse()
            .with_context(|| format!("bad weight in target {:?}", raw))?,
        pool_fee: fee
            .parse()
            .with_context(|| format!("bad pool fee in target {:?}", raw))?,
    })
}

fn status(world: &World, ctx: &CallContext, accounts: &[String]) -> Result<Value> {
    let vault = &world.vault;
    let rewards = &world.rewards;
    let pending = vault
        .pending_fee(&world.base_asset, &world.rewards, ctx)
        .context("failed to compute pending fee")?;

    let holders = accounts
        .iter()
        .map(|a| -> Result<Value> {
            let account = Account::from(a.as_str());
            let units = rewards.units_of(&account);
            let unclaimed = units
                .iter()
                .map(|id| rewards.unclaimed_reward(*id))
                .sum::<Result<u128, _>>()
                .context("failed to compute unclaimed rewards")?;
            Ok(json!({
                "account": account,
                "shares": vault.balance_of(&account),
                "max_withdraw": vault.max_withdraw(&world.base_asset, &account)?,
                "base_balance": world.base_asset.balance_of(&account),
                "native_balance": world.native.balance_of(&account),
                "units": units,
                "unclaimed_rewards": unclaimed,
                "fee_exempt": rewards.qualifies_for_fee_waiver(&account),
            }))
        })
        .collect::<Result<Vec<Value>>>()?;

    Ok(json!({
        "timestamp": ctx.timestamp,
        "vault": {
            "total_assets": vault.total_assets(&world.base_asset),
            "total_supply": vault.total_supply(),
            "management_fee_bps": vault.config().management_fee_bps,
            "fee_recipient": vault.config().fee_recipient,
            "last_fee_accrual": vault.last_fee_accrual(),
            "pending_fee": pending,
            "targets": vault.target_weights(),
        },
        "rewards": {
            "total_units": rewards.total_units(),
            "max_units": rewards.config().max_units,
            "mint_price": rewards.config().mint_price,
            "acc_reward_per_unit": rewards.acc_reward_per_unit(),
            "total_rewards_deposited": rewards.total_rewards_deposited(),
            "total_claimed": rewards.total_claimed(),
            "reward_liabilities": rewards.reward_liabilities(),
            "admin_balance": rewards.admin_balance(&world.native),
        },
        "accounts": holders,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{
        AmountArg, DepositArgs, ExitArgs, FaucetArgs, MintUnitArgs, SetTargetsArgs, StatusArgs,
        UnitArg,
    };
    use tvault_contracts::{RewardConfig, VaultConfig};
    use tvault_protocol::config::{ONE_COIN, SECONDS_PER_YEAR};

    const T0: u64 = 1_700_000_000;

    fn world() -> World {
        World::new(
            VaultConfig::new(Account::from("admin")),
            RewardConfig::new(Account::from("admin")),
            T0,
        )
        .unwrap()
    }

    fn run(world: &mut World, who: &str, t: u64, command: Commands) -> Result<Value> {
        execute(world, &command, &CallContext::new(who, t))
    }

    fn faucet(world: &mut World, asset: AssetKind, who: &str, amount: u128) {
        run(
            world,
            "admin",
            T0,
            Commands::Faucet(FaucetArgs {
                asset,
                account: who.to_string(),
                amount,
            }),
        )
        .unwrap();
    }

    #[test]
    fn deposit_then_redeem_through_dispatch() {
        let mut w = world();
        faucet(&mut w, AssetKind::Base, "alice", 100 * ONE_COIN);

        let out = run(
            &mut w,
            "alice",
            T0,
            Commands::Deposit(DepositArgs {
                assets: 100 * ONE_COIN,
                receiver: None,
            }),
        )
        .unwrap();
        assert_eq!(out["shares"], json!(100 * ONE_COIN));

        let out = run(
            &mut w,
            "alice",
            T0,
            Commands::Redeem(ExitArgs {
                amount: 40 * ONE_COIN,
                receiver: None,
                owner: None,
            }),
        )
        .unwrap();
        assert_eq!(out["assets"], json!(40 * ONE_COIN));
        assert_eq!(w.vault.balance_of(&Account::from("alice")), 60 * ONE_COIN);
    }

    #[test]
    fn membership_flow_and_status() {
        let mut w = world();
        faucet(&mut w, AssetKind::Native, "alice", 10 * ONE_COIN);
        faucet(&mut w, AssetKind::Native, "sponsor", 10 * ONE_COIN);

        let out = run(
            &mut w,
            "alice",
            T0,
            Commands::MintUnit(MintUnitArgs {
                owner: None,
                payment: None,
            }),
        )
        .unwrap();
        assert_eq!(out["unit"], json!(1));

        run(
            &mut w,
            "sponsor",
            T0,
            Commands::DepositRewards(AmountArg { amount: 4 * ONE_COIN }),
        )
        .unwrap();

        let status = run(
            &mut w,
            "anyone",
            T0 + SECONDS_PER_YEAR,
            Commands::Status(StatusArgs {
                accounts: vec!["alice".into()],
            }),
        )
        .unwrap();
        assert_eq!(status["rewards"]["total_units"], json!(1));
        assert_eq!(status["rewards"]["admin_balance"], json!(ONE_COIN));
        assert_eq!(status["accounts"][0]["unclaimed_rewards"], json!(4 * ONE_COIN));
        assert_eq!(status["accounts"][0]["fee_exempt"], json!(true));

        let out = run(&mut w, "alice", T0, Commands::Claim(UnitArg { unit: 1 })).unwrap();
        assert_eq!(out["paid"], json!(4 * ONE_COIN));
    }

    #[test]
    fn ledger_errors_carry_operation_name() {
        let mut w = world();
        let err = run(&mut w, "alice", T0, Commands::Claim(UnitArg { unit: 7 })).unwrap_err();
        assert!(err.to_string().contains("claim failed"));
        assert!(format!("{:#}", err).contains("unknown unit #7"));

        let err = run(&mut w, "alice", T0, Commands::AdminWithdraw).unwrap_err();
        assert!(format!("{:#}", err).contains("unauthorized"));
    }

    #[test]
    fn targets_parse_and_apply() {
        let mut w = world();
        let out = run(
            &mut w,
            "admin",
            T0,
            Commands::SetTargets(SetTargetsArgs {
                targets: vec!["WBTC:6000:3000".into(), "USDC:4000:500".into()],
            }),
        )
        .unwrap();
        assert_eq!(out["targets"][1]["weight_bps"], json!(4000));

        assert!(parse_target("WBTC:6000").is_err());
        assert!(parse_target("WBTC:x:3000").is_err());
        assert!(parse_target(":1:100").is_err());
        assert!(parse_target("A:1:2:3").is_err());
    }
}
