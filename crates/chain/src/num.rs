//! U256 to f64 decimal scaling.
//!
//! Monitoring works in f64 once values leave the chain boundary; the
//! precision loss is acceptable for bucketing and reporting, never fed
//! back into on-chain math.

use alloy::primitives::U256;

/// Convert a U256 to f64. Exact for values below 2^53, approximate
/// above — fine for display and classification.
pub fn u256_to_f64(value: U256) -> f64 {
    if value <= U256::from(u128::MAX) {
        let v: u128 = value.to();
        v as f64
    } else {
        value
            .as_limbs()
            .iter()
            .rev()
            .fold(0.0, |acc, &limb| acc * (u64::MAX as f64 + 1.0) + limb as f64)
    }
}

/// Scale a raw contract value down by `10^decimals`.
pub fn scale_down(value: U256, decimals: u8) -> f64 {
    u256_to_f64(value) / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_exact() {
        assert_eq!(u256_to_f64(U256::from(0)), 0.0);
        assert_eq!(u256_to_f64(U256::from(1_000_000u64)), 1_000_000.0);
    }

    #[test]
    fn scales_by_decimals() {
        let wei = U256::from(1_500_000_000_000_000_000u128);
        assert!((scale_down(wei, 18) - 1.5).abs() < 1e-12);

        let usdc = U256::from(2_500_000u64);
        assert!((scale_down(usdc, 6) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn large_values_do_not_panic() {
        let big = U256::MAX;
        assert!(u256_to_f64(big).is_finite());
    }
}
