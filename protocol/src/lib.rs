// Copyright (c) 2026 TVault Contributors. MIT License.
// See LICENSE for details.

//! # TVault Protocol: Core Primitives
//!
//! The shared foundation under both TVault ledgers. Nothing in here knows
//! what a share or a membership unit is; it only knows how to count money
//! without losing any of it.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants: time base, basis points, fixed-point
//!   scale, membership cap, fee limits.
//! - **math**: Widened `mul_div` with explicit rounding direction, and the
//!   1e18 fixed-point helpers used by the reward accumulator.
//! - **types**: Accounts, amounts, and the host call context.
//! - **custody**: The asset custody collaborator trait and an in-memory
//!   ledger that implements it.
//!
//! ## Design Philosophy
//!
//! 1. No floating point. Anywhere. Amounts are `u128` in the smallest unit.
//! 2. Every product of two amounts is computed in 256 bits before dividing.
//! 3. Rounding direction is a parameter, never an accident.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod custody;
pub mod math;
pub mod types;

pub use custody::{AssetLedger, CustodyError, InMemoryAssetLedger};
pub use math::{MathError, Rounding};
pub use types::{Account, Amount, CallContext, Timestamp, UnitId};
