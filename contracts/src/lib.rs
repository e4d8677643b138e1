//! # TVault Ledgers
//!
//! The two stateful components of TVault:
//!
//! - **Vault Ledger**: a share-issuing vault over one base asset, with
//!   ERC-4626-style deposit/mint/withdraw/redeem, lazily accrued management
//!   fees collected by dilution, and a fee waiver for membership holders.
//! - **Reward Ledger**: a capped series of paid membership units and an
//!   O(1) accumulator that splits reward deposits pro-rata over the units
//!   alive at deposit time.
//!
//! The only coupling between them is [`MembershipRegistry`]: the vault asks
//! whether a caller holds a unit, and the reward ledger answers.
//!
//! ## Design Principles
//!
//! 1. Every ratio goes through `tvault_protocol::math` with an explicit
//!    rounding direction, and every sum is checked.
//! 2. A call either succeeds completely or leaves no trace. Ledger state is
//!    committed before custody is touched and rolled back if custody fails.
//! 3. Ledgers never read the clock or guess the caller: both arrive in a
//!    [`CallContext`](tvault_protocol::CallContext) from the host.
//! 4. Every ledger is serializable (serde) so a host can persist it as-is.

mod atomic;
pub mod membership;
pub mod rewards;
pub mod vault;

pub use membership::{MembershipRegistry, StaticMembership};
pub use rewards::{RewardConfig, RewardError, RewardLedger, Unit};
pub use vault::{FeeAccrual, TargetAllocation, VaultConfig, VaultError, VaultLedger};
