//! # CLI Interface
//!
//! Defines the command-line argument structure for `tvault` using `clap`
//! derive. Each invocation loads the state file, runs one ledger operation
//! as `--caller` at `--at`, and writes the state back.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tvault_protocol::{Amount, Timestamp, UnitId};

use crate::logging::LogFormat;

/// TVault ledger host.
///
/// Runs a share vault with a management fee and a membership reward ledger
/// against a local JSON state file. Results are printed to stdout as JSON;
/// logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "tvault", about = "TVault ledger host", version, propagate_version = true)]
pub struct TvaultCli {
    /// Path to the state file.
    #[arg(long, short = 's', env = "TVAULT_STATE", default_value = "tvault.json", global = true)]
    pub state: PathBuf,

    /// Account issuing the call.
    #[arg(long, short = 'c', env = "TVAULT_CALLER", global = true)]
    pub caller: Option<String>,

    /// Block time of the call in unix seconds. Defaults to now.
    #[arg(long, env = "TVAULT_AT", global = true)]
    pub at: Option<Timestamp>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Which custody ledger a command addresses.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// The vault's base asset.
    Base,
    /// The native currency units are paid and rewarded in.
    Native,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a fresh state file.
    Init(InitArgs),
    /// Credit test funds to an account (development only).
    Faucet(FaucetArgs),
    /// Print vault, reward and balance summary.
    Status(StatusArgs),

    /// Deposit base asset for vault shares.
    Deposit(DepositArgs),
    /// Buy an exact number of vault shares.
    Mint(MintArgs),
    /// Withdraw an exact amount of base asset.
    Withdraw(ExitArgs),
    /// Redeem vault shares for base asset.
    Redeem(ExitArgs),
    /// Move vault shares to another account.
    TransferShares(TransferArgs),
    /// Allow another account to spend the caller's shares.
    Approve(ApproveArgs),
    /// Settle the pending management fee.
    Accrue,
    /// Change the management fee rate (admin).
    SetFee(SetFeeArgs),
    /// Change the fee recipient (admin).
    SetFeeRecipient(AccountArg),
    /// Replace the rebalancing targets (admin).
    SetTargets(SetTargetsArgs),

    /// Buy a membership unit.
    MintUnit(MintUnitArgs),
    /// Distribute native currency over all units.
    DepositRewards(AmountArg),
    /// Claim a unit's unclaimed reward.
    Claim(UnitArg),
    /// Give a unit to another account.
    TransferUnit(TransferUnitArgs),
    /// Sweep mint proceeds to the admin (admin).
    AdminWithdraw,
    /// Change the unit price (admin).
    SetMintPrice(AmountArg),
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Administrator of both ledgers.
    #[arg(long, env = "TVAULT_ADMIN")]
    pub admin: String,

    /// Receives management fee shares. Defaults to the admin.
    #[arg(long)]
    pub fee_recipient: Option<String>,

    /// Annual management fee in basis points.
    #[arg(long, default_value_t = tvault_protocol::config::DEFAULT_MANAGEMENT_FEE_BPS)]
    pub fee_bps: u16,

    /// Price of one membership unit, in native base units.
    #[arg(long, default_value_t = tvault_protocol::config::DEFAULT_MINT_PRICE)]
    pub mint_price: Amount,

    /// Lifetime membership unit supply.
    #[arg(long, default_value_t = tvault_protocol::config::MAX_UNITS)]
    pub max_units: u64,

    /// Overwrite an existing state file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `faucet` subcommand.
#[derive(Args, Debug)]
pub struct FaucetArgs {
    /// Ledger to credit.
    #[arg(long, value_enum, default_value_t = AssetKind::Base)]
    pub asset: AssetKind,
    /// Account to credit.
    pub account: String,
    /// Amount in base units.
    pub amount: Amount,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also report balances and units of these accounts.
    pub accounts: Vec<String>,
}

/// Arguments for the `deposit` subcommand.
#[derive(Args, Debug)]
pub struct DepositArgs {
    /// Base asset to deposit.
    pub assets: Amount,
    /// Share recipient. Defaults to the caller.
    #[arg(long)]
    pub receiver: Option<String>,
}

/// Arguments for the `mint` subcommand.
#[derive(Args, Debug)]
pub struct MintArgs {
    /// Shares to buy.
    pub shares: Amount,
    /// Share recipient. Defaults to the caller.
    #[arg(long)]
    pub receiver: Option<String>,
}

/// Arguments for the `withdraw` and `redeem` subcommands.
#[derive(Args, Debug)]
pub struct ExitArgs {
    /// Assets to withdraw, or shares to redeem.
    pub amount: Amount,
    /// Asset recipient. Defaults to the caller.
    #[arg(long)]
    pub receiver: Option<String>,
    /// Share owner. Defaults to the caller; anyone else needs an allowance.
    #[arg(long)]
    pub owner: Option<String>,
}

/// Arguments for the `transfer-shares` subcommand.
#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Recipient.
    pub to: String,
    /// Shares to move.
    pub amount: Amount,
}

/// Arguments for the `approve` subcommand.
#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Account allowed to spend.
    pub spender: String,
    /// Share allowance.
    pub amount: Amount,
}

/// Arguments for the `set-fee` subcommand.
#[derive(Args, Debug)]
pub struct SetFeeArgs {
    /// New annual rate in basis points.
    pub bps: u16,
}

/// Arguments for the `set-targets` subcommand.
#[derive(Args, Debug)]
pub struct SetTargetsArgs {
    /// Targets as `ASSET:WEIGHT_BPS:POOL_FEE`, e.g. `WBTC:6000:3000`.
    /// Pass none to clear.
    pub targets: Vec<String>,
}

/// Arguments for the `mint-unit` subcommand.
#[derive(Args, Debug)]
pub struct MintUnitArgs {
    /// Unit owner. Defaults to the caller.
    #[arg(long)]
    pub owner: Option<String>,
    /// Payment attached. Defaults to the current price.
    #[arg(long)]
    pub payment: Option<Amount>,
}

/// Arguments for the `transfer-unit` subcommand.
#[derive(Args, Debug)]
pub struct TransferUnitArgs {
    /// Unit to move.
    pub unit: UnitId,
    /// New holder.
    pub to: String,
}

/// A single amount.
#[derive(Args, Debug)]
pub struct AmountArg {
    /// Amount in base units.
    pub amount: Amount,
}

/// A single account.
#[derive(Args, Debug)]
pub struct AccountArg {
    /// Account address.
    pub account: String,
}

/// A single unit id.
#[derive(Args, Debug)]
pub struct UnitArg {
    /// Unit id.
    pub unit: UnitId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TvaultCli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = TvaultCli::try_parse_from([
            "tvault", "deposit", "100", "--caller", "alice", "--at", "42", "--state", "/tmp/s.json",
        ])
        .unwrap();
        assert_eq!(cli.caller.as_deref(), Some("alice"));
        assert_eq!(cli.at, Some(42));
        assert!(matches!(
            cli.command,
            Commands::Deposit(DepositArgs { assets: 100, receiver: None })
        ));
    }

    #[test]
    fn parses_wide_amounts() {
        let cli = TvaultCli::try_parse_from([
            "tvault",
            "deposit-rewards",
            "340282366920938463463374607431768211455",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::DepositRewards(AmountArg { amount }) if amount == u128::MAX
        ));
    }
}
