//! AAVE lending pool accessor.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::contracts::{IAddressesProvider, ILendingPool};
use crate::oracle::PriceOracle;
use crate::transport::{BlockRef, ResilientTransport, TransportError};

/// Pool generation. Selects the addresses-provider entry point, the
/// oracle precision rule and whether e-mode exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolVersion {
    V2,
    V3,
}

/// `getUserAccountData` response, raw contract precision, field order
/// as returned on-chain.
#[derive(Debug, Clone, Copy)]
pub struct UserAccountData {
    pub collateral: U256,
    pub debt: U256,
    pub available_borrow: U256,
    pub liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Read-only view over an AAVE lending pool.
pub struct LendingPool {
    transport: Arc<ResilientTransport>,
    pub address: Address,
    pub version: PoolVersion,
    oracle: OnceCell<PriceOracle>,
}

impl LendingPool {
    pub fn new(transport: Arc<ResilientTransport>, address: Address, version: PoolVersion) -> Self {
        Self {
            transport,
            address,
            version,
            oracle: OnceCell::new(),
        }
    }

    pub async fn user_account_data(
        &self,
        user: Address,
        block: BlockRef,
    ) -> Result<UserAccountData, TransportError> {
        let ret = self
            .transport
            .eth_call(
                self.address,
                ILendingPool::getUserAccountDataCall { user },
                block,
            )
            .await?;
        Ok(UserAccountData {
            collateral: ret.totalCollateralBase,
            debt: ret.totalDebtBase,
            available_borrow: ret.availableBorrowsBase,
            liquidation_threshold: ret.currentLiquidationThreshold,
            ltv: ret.ltv,
            health_factor: ret.healthFactor,
        })
    }

    /// E-mode flag for `user`. `None` means undetermined: the pool
    /// generation has no e-mode (V2, or a V3 fork that reverts on the
    /// call). Undetermined is not the same as `Some(false)`.
    pub async fn user_emode(
        &self,
        user: Address,
        block: BlockRef,
    ) -> Result<Option<bool>, TransportError> {
        if self.version == PoolVersion::V2 {
            return Ok(None);
        }

        let result = self
            .transport
            .eth_call(self.address, ILendingPool::getUserEModeCall { user }, block)
            .await;
        match result {
            Ok(ret) => Ok(Some(!ret._0.is_zero())),
            Err(err) if err.is_revert() => {
                debug!(pool = %self.address, user = %user, "getUserEMode reverted");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The pool's price oracle, discovered through its addresses
    /// provider on first use and cached.
    pub async fn oracle(&self) -> Result<&PriceOracle, TransportError> {
        self.oracle
            .get_or_try_init(|| async {
                let provider = match self.version {
                    PoolVersion::V2 => {
                        self.transport
                            .eth_call(
                                self.address,
                                ILendingPool::getAddressesProviderCall {},
                                BlockRef::Latest,
                            )
                            .await?
                            ._0
                    }
                    PoolVersion::V3 => {
                        self.transport
                            .eth_call(
                                self.address,
                                ILendingPool::ADDRESSES_PROVIDERCall {},
                                BlockRef::Latest,
                            )
                            .await?
                            ._0
                    }
                };

                let oracle = self
                    .transport
                    .eth_call(
                        provider,
                        IAddressesProvider::getPriceOracleCall {},
                        BlockRef::Latest,
                    )
                    .await?
                    ._0;

                debug!(pool = %self.address, oracle = %oracle, "Price oracle discovered");
                Ok(PriceOracle::new(
                    self.transport.clone(),
                    oracle,
                    self.version,
                ))
            })
            .await
    }
}
