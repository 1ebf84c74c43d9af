//! Contract interfaces for the monitored protocol.
//!
//! Only the view functions the monitor actually calls are declared;
//! calls are ABI-encoded by hand and sent through the transport, so no
//! provider-bound instances are needed.

use alloy::primitives::B256;
use alloy::sol;

sol! {
    /// Standard ERC20 interface (read-only subset).
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    /// AAVE price oracle. `BASE_CURRENCY_UNIT` exists on V3 oracles
    /// only; V2 oracles revert on it.
    interface IAaveOracle {
        function getAssetPrice(address asset) external view returns (uint256);
        function BASE_CURRENCY_UNIT() external view returns (uint256);
    }

    /// AAVE lending pool, covering both V2 and V3 entry points.
    /// `getUserEMode` and `ADDRESSES_PROVIDER` revert on V2 pools.
    interface ILendingPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
        function getUserEMode(address user) external view returns (uint256);
        function getAddressesProvider() external view returns (address);
        function ADDRESSES_PROVIDER() external view returns (address);
    }

    /// AAVE pool addresses provider.
    interface IAddressesProvider {
        function getPriceOracle() external view returns (address);
    }
}

/// keccak256("Transfer(address,address,uint256)")
pub const ERC20_TRANSFER: B256 = B256::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d,
    0xaa, 0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23,
    0xb3, 0xef,
]);

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    #[test]
    fn transfer_topic_matches_signature() {
        assert_eq!(
            ERC20_TRANSFER,
            keccak256("Transfer(address,address,uint256)")
        );
    }
}
