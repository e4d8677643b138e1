//! # Fixed-Point Arithmetic
//!
//! Share conversions, fee accrual and reward distribution all reduce to the
//! same shape: `a * b / c` with a deliberate rounding direction. Amounts are
//! `u128`, so the product of two of them needs up to 256 bits. We compute it
//! in [`U256`] and only narrow back once the division is done. A result that
//! does not fit in `u128` is an error, never a silent wrap.
//!
//! ## Rounding Policy
//!
//! The ledgers always round against the party initiating the call:
//!
//! | Operation                    | Rounds | Beneficiary      |
//! |------------------------------|--------|------------------|
//! | assets -> shares on deposit  | down   | existing holders |
//! | shares -> assets on redeem   | down   | remaining holders|
//! | shares -> assets on mint     | up     | existing holders |
//! | assets -> shares on withdraw | up     | remaining holders|
//! | reward per unit              | down   | nobody (dust)    |

pub use primitive_types::U256;
use thiserror::Error;

use crate::config::REWARD_SCALE;
use crate::types::Amount;

/// Errors from fixed-point arithmetic.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// A result does not fit in the target integer type.
    #[error("arithmetic overflow")]
    Overflow,

    /// A subtraction would go below zero.
    #[error("arithmetic underflow")]
    Underflow,

    /// The denominator of a ratio was zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// Direction in which a ratio is rounded when it is not exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero (floor).
    Down,
    /// Away from zero (ceiling).
    Up,
}

/// Computes `a * b / denominator` with a 256-bit intermediate product.
///
/// # Errors
///
/// Returns [`MathError::DivisionByZero`] if `denominator` is zero, and
/// [`MathError::Overflow`] if the quotient does not fit in `u128`.
pub fn mul_div(
    a: Amount,
    b: Amount,
    denominator: Amount,
    rounding: Rounding,
) -> Result<Amount, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }

    // (2^128 - 1)^2 < 2^256, so the product itself cannot overflow.
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(MathError::Overflow)?;
    let (quotient, remainder) = product.div_mod(U256::from(denominator));

    let quotient = match rounding {
        Rounding::Up if !remainder.is_zero() => quotient
            .checked_add(U256::one())
            .ok_or(MathError::Overflow)?,
        _ => quotient,
    };

    narrow(quotient)
}

/// Narrows a 256-bit value back to an amount.
///
/// # Errors
///
/// Returns [`MathError::Overflow`] if `value` exceeds `u128::MAX`.
pub fn narrow(value: U256) -> Result<Amount, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128())
}

/// Per-unit accumulator increment for distributing `amount` over `units`
/// holders: `amount * REWARD_SCALE / units`, floored.
///
/// The floor leaves at most `units - 1` scaled wei undistributed per call.
pub fn per_unit_increment(amount: Amount, units: u64) -> Result<U256, MathError> {
    if units == 0 {
        return Err(MathError::DivisionByZero);
    }
    let scaled = U256::from(amount)
        .checked_mul(U256::from(REWARD_SCALE))
        .ok_or(MathError::Overflow)?;
    Ok(scaled / U256::from(units))
}

/// Converts an accumulator-scale value back to currency units, flooring.
pub fn descale(value: U256) -> Result<Amount, MathError> {
    narrow(value / U256::from(REWARD_SCALE))
}

/// `a + b`, or [`MathError::Overflow`].
pub fn add(a: Amount, b: Amount) -> Result<Amount, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// `a - b`, or [`MathError::Underflow`].
pub fn sub(a: Amount, b: Amount) -> Result<Amount, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}
