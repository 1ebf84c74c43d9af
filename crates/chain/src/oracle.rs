//! AAVE price oracle accessor.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::contracts::IAaveOracle;
use crate::num::scale_down;
use crate::pool::PoolVersion;
use crate::transport::{BlockRef, ResilientTransport, TransportError};

/// Decimals of V2 oracles (prices quoted in ETH wei).
const ETH_DECIMALS: u8 = 18;

/// Price oracle attached to a lending pool.
///
/// Precision differs per pool generation: V2 oracles quote in ETH with
/// a fixed 18 decimals, V3 oracles expose `BASE_CURRENCY_UNIT` whose
/// log10 is the precision. A V3 oracle that reverts on the call falls
/// back to 18.
pub struct PriceOracle {
    transport: Arc<ResilientTransport>,
    pub address: Address,
    version: PoolVersion,
    decimals: OnceCell<u8>,
}

impl PriceOracle {
    pub fn new(transport: Arc<ResilientTransport>, address: Address, version: PoolVersion) -> Self {
        Self {
            transport,
            address,
            version,
            decimals: OnceCell::new(),
        }
    }

    pub async fn decimals(&self) -> Result<u8, TransportError> {
        self.decimals
            .get_or_try_init(|| async {
                match self.version {
                    PoolVersion::V2 => Ok(ETH_DECIMALS),
                    PoolVersion::V3 => {
                        let result = self
                            .transport
                            .eth_call(
                                self.address,
                                IAaveOracle::BASE_CURRENCY_UNITCall {},
                                BlockRef::Latest,
                            )
                            .await;
                        match result {
                            Ok(ret) => Ok(unit_decimals(ret._0)),
                            Err(err) if err.is_revert() => {
                                debug!(
                                    oracle = %self.address,
                                    "BASE_CURRENCY_UNIT reverted, assuming 18 decimals"
                                );
                                Ok(ETH_DECIMALS)
                            }
                            Err(err) => Err(err),
                        }
                    }
                }
            })
            .await
            .copied()
    }

    /// Asset price at `block` in oracle base units.
    pub async fn asset_price(
        &self,
        asset: Address,
        block: BlockRef,
    ) -> Result<f64, TransportError> {
        let ret = self
            .transport
            .eth_call(self.address, IAaveOracle::getAssetPriceCall { asset }, block)
            .await?;
        let decimals = self.decimals().await?;
        Ok(scale_down(ret._0, decimals))
    }
}

/// log10 of the oracle base currency unit.
fn unit_decimals(unit: U256) -> u8 {
    let mut unit = unit;
    let ten = U256::from(10u8);
    let mut decimals = 0u8;
    while unit >= ten {
        unit /= ten;
        decimals += 1;
    }
    decimals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_decimals_log10() {
        assert_eq!(unit_decimals(U256::from(1u8)), 0);
        assert_eq!(unit_decimals(U256::from(100_000_000u64)), 8);
        assert_eq!(
            unit_decimals(U256::from(1_000_000_000_000_000_000u128)),
            18
        );
    }
}
