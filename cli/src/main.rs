// Copyright (c) 2026 TVault Contributors. MIT License.
// See LICENSE for details.

//! # TVault Command-Line Host
//!
//! Entry point for the `tvault` binary. Parses CLI arguments, initializes
//! logging, loads the state file, runs one ledger operation and saves the
//! result.
//!
//! The binary plays the role a chain plays for a deployed contract: it
//! decides who is calling (`--caller`) and what time it is (`--at`), holds
//! the custody ledgers, and persists everything between calls.
//!
//! - `init`   : create a state file with fresh ledgers
//! - `faucet` : credit development funds
//! - `status` : read-only summary
//! - everything else: one vault or membership operation

mod cli;
mod commands;
mod logging;
mod state;

use anyhow::{bail, Context, Result};
use clap::Parser;

use tvault_contracts::{RewardConfig, VaultConfig};
use tvault_protocol::{Account, CallContext};

use cli::{Commands, InitArgs, TvaultCli};
use state::World;

fn main() -> Result<()> {
    let cli = TvaultCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    let ctx = call_context(&cli);
    match &cli.command {
        Commands::Init(args) => init_state(&cli, args, &ctx),
        command => run_command(&cli, command, &ctx),
    }
}

/// Resolves who is calling and when. Read-only commands may omit the caller.
fn call_context(cli: &TvaultCli) -> CallContext {
    let caller = cli.caller.as_deref().unwrap_or("anonymous");
    match cli.at {
        Some(timestamp) => CallContext::new(caller, timestamp),
        None => CallContext::now(caller),
    }
}

/// Creates a fresh state file.
fn init_state(cli: &TvaultCli, args: &InitArgs, ctx: &CallContext) -> Result<()> {
    if cli.state.exists() && !args.force {
        bail!(
            "state file {} already exists (pass --force to overwrite)",
            cli.state.display()
        );
    }

    let admin = Account::from(args.admin.as_str());
    let mut vault_config = VaultConfig::new(admin.clone());
    vault_config.management_fee_bps = args.fee_bps;
    if let Some(recipient) = &args.fee_recipient {
        vault_config.fee_recipient = Account::from(recipient.as_str());
    }
    let mut reward_config = RewardConfig::new(admin);
    reward_config.mint_price = args.mint_price;
    reward_config.max_units = args.max_units;

    let world = World::new(vault_config, reward_config, ctx.timestamp)?;
    world.save(&cli.state)?;

    tracing::info!(
        path = %cli.state.display(),
        admin = %args.admin,
        fee_bps = args.fee_bps,
        "state initialized"
    );
    print_json(&serde_json::json!({
        "state": cli.state.display().to_string(),
        "admin": args.admin,
        "created_at": ctx.timestamp,
    }))
}

/// Loads the world, runs one operation, and saves only on success.
fn run_command(cli: &TvaultCli, command: &Commands, ctx: &CallContext) -> Result<()> {
    let mutates = !matches!(command, Commands::Status(_));
    if mutates && cli.caller.is_none() && !matches!(command, Commands::Faucet(_)) {
        bail!("this command needs a caller: pass --caller or set TVAULT_CALLER");
    }

    let mut world = World::load(&cli.state)?;
    let output = commands::execute(&mut world, command, ctx)?;
    if mutates {
        world
            .save(&cli.state)
            .with_context(|| format!("operation succeeded but saving {} failed", cli.state.display()))?;
    }
    print_json(&output)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{}", out);
    Ok(())
}
