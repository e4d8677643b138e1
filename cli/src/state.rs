//! # State File
//!
//! Everything the host owns, in one serde document: both custody ledgers
//! and both TVault ledgers. Loaded at the start of every invocation and
//! written back only if the command succeeded, so a rejected call never
//! touches the file.
//!
//! Writes go to a sibling temp file first and are renamed into place, so an
//! interrupted write leaves the previous state intact.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use tvault_contracts::{RewardConfig, RewardLedger, VaultConfig, VaultLedger};
use tvault_protocol::{Account, InMemoryAssetLedger, Timestamp};

/// Bumped whenever the layout below changes incompatibly.
pub const STATE_VERSION: u32 = 1;

/// Custody account of the vault.
pub const VAULT_ACCOUNT: &str = "tvault:vault";

/// Custody account of the reward ledger.
pub const MEMBERSHIP_ACCOUNT: &str = "tvault:membership";

/// The complete host state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    /// Layout version of this document.
    pub version: u32,
    /// When `init` ran.
    pub created_at: Timestamp,
    /// The vault's base asset.
    pub base_asset: InMemoryAssetLedger,
    /// The native currency for unit payments and rewards.
    pub native: InMemoryAssetLedger,
    /// The share vault.
    pub vault: VaultLedger,
    /// The membership reward ledger.
    pub rewards: RewardLedger,
}

impl World {
    /// Fresh ledgers with no balances.
    pub fn new(
        vault_config: VaultConfig,
        reward_config: RewardConfig,
        created_at: Timestamp,
    ) -> Result<Self> {
        let vault = VaultLedger::new(Account::from(VAULT_ACCOUNT), vault_config, created_at)
            .context("invalid vault configuration")?;
        let rewards = RewardLedger::new(Account::from(MEMBERSHIP_ACCOUNT), reward_config)
            .context("invalid reward configuration")?;
        Ok(Self {
            version: STATE_VERSION,
            created_at,
            base_asset: InMemoryAssetLedger::new("BASE"),
            native: InMemoryAssetLedger::new("NATIVE"),
            vault,
            rewards,
        })
    }

    /// Reads a state file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| {
            format!(
                "failed to read state file {} (run `tvault init` first)",
                path.display()
            )
        })?;
        let world: World = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse state file {}", path.display()))?;
        if world.version != STATE_VERSION {
            bail!(
                "state file {} has version {}, this build reads version {}",
                path.display(),
                world.version,
                STATE_VERSION
            );
        }
        Ok(world)
    }

    /// Writes the state file, replacing any previous one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        let tmp = temp_path(path);
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write state file {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move state file into {}", path.display()))?;
        tracing::debug!(path = %path.display(), "state saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
