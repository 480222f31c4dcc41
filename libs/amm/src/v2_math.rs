//! Constant-product (x*y=k) math with exact integer rounding
//!
//! All divisions truncate toward zero, which always favours the pool: outputs
//! round down, required inputs round up via the trailing `+ 1`.

use basin_types::constants::{FEE_DENOMINATOR, FEE_NUMERATOR};
use basin_types::{AmmError, U256};

pub(crate) fn checked_add(a: U256, b: U256) -> Result<U256, AmmError> {
    a.checked_add(b).ok_or(AmmError::Overflow)
}

pub(crate) fn checked_sub(a: U256, b: U256) -> Result<U256, AmmError> {
    a.checked_sub(b).ok_or(AmmError::Overflow)
}

pub(crate) fn checked_mul(a: U256, b: U256) -> Result<U256, AmmError> {
    a.checked_mul(b).ok_or(AmmError::Overflow)
}

/// V2 AMM math functions
pub struct V2Math;

impl V2Math {
    /// Equivalent amount of the other asset at the current reserve ratio
    ///
    /// `amount_b = amount_a * reserve_b / reserve_a`, no fee applied.
    pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256, AmmError> {
        if amount_a.is_zero() {
            return Err(AmmError::InsufficientAmount);
        }
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }
        Ok(checked_mul(amount_a, reserve_b)? / reserve_a)
    }

    /// Calculate exact output amount for a swap using the x*y=k formula
    ///
    /// # Arguments
    /// * `amount_in` - Input token amount (in token base units)
    /// * `reserve_in` - Input token reserve
    /// * `reserve_out` - Output token reserve
    ///
    /// # Returns
    /// Output amount after the 0.3% fee, rounded down
    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256, AmmError> {
        if amount_in.is_zero() {
            return Err(AmmError::InsufficientInputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }

        let amount_in_with_fee = checked_mul(amount_in, U256::from(FEE_NUMERATOR))?;
        let numerator = checked_mul(amount_in_with_fee, reserve_out)?;
        let denominator = checked_add(
            checked_mul(reserve_in, U256::from(FEE_DENOMINATOR))?,
            amount_in_with_fee,
        )?;

        Ok(numerator / denominator)
    }

    /// Calculate required input amount for a desired output (reverse calculation)
    pub fn get_amount_in(
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256, AmmError> {
        if amount_out.is_zero() {
            return Err(AmmError::InsufficientOutputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() || amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity);
        }

        let numerator = checked_mul(
            checked_mul(reserve_in, amount_out)?,
            U256::from(FEE_DENOMINATOR),
        )?;
        let denominator = checked_mul(reserve_out - amount_out, U256::from(FEE_NUMERATOR))?;

        // Add 1 to round up (ensures sufficient input)
        checked_add(numerator / denominator, U256::one())
    }

    /// Integer square root (floor) using Newton's method
    pub fn sqrt(value: U256) -> U256 {
        if value.is_zero() {
            return U256::zero();
        }
        if value <= U256::from(3) {
            return U256::one();
        }

        // Newton's method: x_new = (x + value/x) / 2, starting above the root
        let mut z = value;
        let mut x = value / 2 + 1;
        while x < z {
            z = x;
            x = (value / x + x) / 2;
        }
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_v2_output_calculation() {
        // 10 tokens in against 1000:2000 reserves at 0.3% fee
        let output = V2Math::get_amount_out(units(10), units(1000), units(2000)).unwrap();

        assert!(output > units(19));
        assert!(output < units(20));
    }

    #[test]
    fn test_v2_output_exact_small_values() {
        // 997 * 2000 / (1000 * 1000 + 997) = 1994000 / 1000997 = 1 (truncated)
        let output =
            V2Math::get_amount_out(U256::from(1), U256::from(1000), U256::from(2000)).unwrap();
        assert_eq!(output, U256::one());

        // 100 in: 99700 * 2000 / 1099700 = 181.32.. -> 181
        let output =
            V2Math::get_amount_out(U256::from(100), U256::from(1000), U256::from(2000)).unwrap();
        assert_eq!(output, U256::from(181));
    }

    #[test]
    fn test_v2_input_calculation_rounds_up() {
        // 1000 * 181 * 1000 / ((2000 - 181) * 997) = 181000000 / 1813543 = 99.8 -> 99 + 1
        let input =
            V2Math::get_amount_in(U256::from(181), U256::from(1000), U256::from(2000)).unwrap();
        assert_eq!(input, U256::from(100));
    }

    #[test]
    fn test_input_validation() {
        let r = U256::from(1000);
        assert_eq!(
            V2Math::get_amount_out(U256::zero(), r, r),
            Err(AmmError::InsufficientInputAmount)
        );
        assert_eq!(
            V2Math::get_amount_out(U256::one(), U256::zero(), r),
            Err(AmmError::InsufficientLiquidity)
        );
        assert_eq!(
            V2Math::get_amount_in(U256::zero(), r, r),
            Err(AmmError::InsufficientOutputAmount)
        );
        assert_eq!(
            V2Math::get_amount_in(r, r, r),
            Err(AmmError::InsufficientLiquidity)
        );
        assert_eq!(
            V2Math::quote(U256::zero(), r, r),
            Err(AmmError::InsufficientAmount)
        );
        assert_eq!(
            V2Math::quote(U256::one(), U256::zero(), r),
            Err(AmmError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_quote_is_proportional() {
        let amount = V2Math::quote(units(1), units(100), units(400)).unwrap();
        assert_eq!(amount, units(4));
    }

    #[test]
    fn test_overflow_is_reported() {
        let huge = U256::MAX / 2;
        assert_eq!(
            V2Math::get_amount_out(huge, huge, huge),
            Err(AmmError::Overflow)
        );
    }

    #[test]
    fn test_sqrt_accuracy() {
        assert_eq!(V2Math::sqrt(U256::zero()), U256::zero());
        assert_eq!(V2Math::sqrt(U256::from(1)), U256::one());
        assert_eq!(V2Math::sqrt(U256::from(3)), U256::one());
        assert_eq!(V2Math::sqrt(U256::from(4)), U256::from(2));
        assert_eq!(V2Math::sqrt(U256::from(99)), U256::from(9));
        assert_eq!(V2Math::sqrt(U256::from(20_000)), U256::from(141));

        let big = U256::from(u128::MAX);
        let root = V2Math::sqrt(big);
        assert!(root * root <= big);
        assert!((root + 1) * (root + 1) > big);
    }
}
