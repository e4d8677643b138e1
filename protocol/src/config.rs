//! # Protocol Configuration & Constants
//!
//! Every magic number in TVault lives here. If a ledger needs a constant,
//! it imports it from this module instead of inlining a literal.
//!
//! Several of these values are baked into the economics of already-issued
//! shares and units. Changing them for a live deployment changes what
//! people own, so treat edits here as migrations.

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Seconds in a (non-leap) year. Management fees are quoted annually and
/// accrued per second against this base.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Basis Points
// ---------------------------------------------------------------------------

/// 100% expressed in basis points. 1 bp = 0.01%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Management fee applied to a freshly configured vault: 2% per year.
pub const DEFAULT_MANAGEMENT_FEE_BPS: u16 = 200;

/// Upper bound on the annual management fee an admin may configure: 10%.
pub const MAX_MANAGEMENT_FEE_BPS: u16 = 1_000;

/// Pool fee tiers (in hundredths of a bip) the swap router accepts for a
/// rebalancing target. Anything else cannot be routed.
pub const VALID_POOL_FEE_TIERS: [u32; 4] = [100, 500, 3_000, 10_000];

// ---------------------------------------------------------------------------
// Fixed-Point
// ---------------------------------------------------------------------------

/// Scale of the reward accumulator. `acc_reward_per_unit` stores
/// `rewards * REWARD_SCALE / units`, so per-unit precision is 1e-18 of the
/// smallest currency unit.
pub const REWARD_SCALE: u128 = 1_000_000_000_000_000_000;

/// One whole coin at 18 decimals.
pub const ONE_COIN: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Hard cap on membership units. Units are never burned, so this is also
/// the lifetime supply.
pub const MAX_UNITS: u64 = 300;

/// Default price of one membership unit: one native coin.
pub const DEFAULT_MINT_PRICE: u128 = ONE_COIN;
