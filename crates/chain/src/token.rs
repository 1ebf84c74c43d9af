//! ERC20 token accessor.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::OnceCell;

use crate::contracts::IERC20;
use crate::num::scale_down;
use crate::transport::{BlockRef, ResilientTransport, TransportError};

/// Read-only view over an ERC20-like token.
///
/// `decimals` and `symbol` are immutable on-chain and cached for the
/// process lifetime after the first read.
pub struct Erc20 {
    transport: Arc<ResilientTransport>,
    pub address: Address,
    decimals: OnceCell<u8>,
    symbol: OnceCell<String>,
}

impl Erc20 {
    pub fn new(transport: Arc<ResilientTransport>, address: Address) -> Self {
        Self {
            transport,
            address,
            decimals: OnceCell::new(),
            symbol: OnceCell::new(),
        }
    }

    pub async fn decimals(&self) -> Result<u8, TransportError> {
        self.decimals
            .get_or_try_init(|| async {
                let ret = self
                    .transport
                    .eth_call(self.address, IERC20::decimalsCall {}, BlockRef::Latest)
                    .await?;
                Ok(ret._0)
            })
            .await
            .copied()
    }

    pub async fn symbol(&self) -> Result<&str, TransportError> {
        self.symbol
            .get_or_try_init(|| async {
                let ret = self
                    .transport
                    .eth_call(self.address, IERC20::symbolCall {}, BlockRef::Latest)
                    .await?;
                Ok(ret._0)
            })
            .await
            .map(String::as_str)
    }

    /// Balance of `user` at `block`, scaled by the token's own precision.
    pub async fn balance_of(
        &self,
        user: Address,
        block: BlockRef,
    ) -> Result<f64, TransportError> {
        let ret = self
            .transport
            .eth_call(self.address, IERC20::balanceOfCall { account: user }, block)
            .await?;
        let decimals = self.decimals().await?;
        Ok(scale_down(ret._0, decimals))
    }
}
