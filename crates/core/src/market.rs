//! Market and position model.
//!
//! A [`Position`] is one supply-token/debt-token pair on one market,
//! fixed at startup and never mutated afterwards. Everything mutable
//! (scan cursor, holder set) lives in the per-position scan context
//! owned by the orchestrator.

use alloy::primitives::Address;
use monitor_chain::{scale_down, BlockRef, Erc20, LendingPool, TransportError};

/// Decimal scale of the pool-reported health factor.
const HEALTH_FACTOR_DECIMALS: u8 = 18;

/// Chains the monitor runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ChainId {
    Homestead = 1,
    Optimism = 10,
    Polygon = 137,
    Arbitrum = 42161,
}

impl ChainId {
    pub fn id(&self) -> u64 {
        *self as u64
    }

    /// Suffix appended to position names off mainnet.
    fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Homestead => None,
            Self::Optimism => Some("optimism"),
            Self::Polygon => Some("polygon"),
            Self::Arbitrum => Some("arbitrum"),
        }
    }
}

/// The token a user deposits, with its yield-bearing counterpart.
pub struct SupplyToken {
    pub token: Erc20,
    /// aToken minted against the deposit; its Transfer events drive
    /// holder discovery and its balance is the position amount.
    pub a_token: Erc20,
}

/// The token a user borrows, with its debt-tracking sub-instruments.
pub struct DebtToken {
    pub token: Erc20,
    pub stable: Erc20,
    pub variable: Erc20,
}

/// Normalized `getUserAccountData` response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserInfo {
    /// Collateral in oracle base units.
    pub collateral: f64,
    /// Debt in oracle base units.
    pub debt: f64,
    pub available_borrow: f64,
    /// Raw basis points as reported by the pool.
    pub liquidation_threshold: u64,
    pub ltv: u64,
    pub health_factor: f64,
    pub emode: Option<bool>,
}

/// A lending market: pool plus its discovered price oracle.
pub struct Market {
    pub pool: LendingPool,
}

impl Market {
    pub fn new(pool: LendingPool) -> Self {
        Self { pool }
    }

    /// Asset price at `block` in oracle base units.
    pub async fn asset_price(
        &self,
        asset: Address,
        block: BlockRef,
    ) -> Result<f64, TransportError> {
        self.pool.oracle().await?.asset_price(asset, block).await
    }

    /// Account data plus e-mode for `user` at `block`, monetary fields
    /// normalized by the oracle base precision.
    pub async fn user_info(
        &self,
        user: Address,
        block: BlockRef,
    ) -> Result<UserInfo, TransportError> {
        let base_decimals = self.pool.oracle().await?.decimals().await?;
        let data = self.pool.user_account_data(user, block).await?;
        let emode = self.pool.user_emode(user, block).await?;

        Ok(UserInfo {
            collateral: scale_down(data.collateral, base_decimals),
            debt: scale_down(data.debt, base_decimals),
            available_borrow: scale_down(data.available_borrow, base_decimals),
            liquidation_threshold: data.liquidation_threshold.to::<u64>(),
            ltv: data.ltv.to::<u64>(),
            health_factor: scale_down(data.health_factor, HEALTH_FACTOR_DECIMALS),
            emode,
        })
    }
}

/// One monitored supply/debt pair. Identity is
/// (supply token, debt token, chain).
pub struct Position {
    pub market: Market,
    pub supply_token: SupplyToken,
    pub debt_token: DebtToken,
    /// Extra collateral tokens counted into the position's holdings.
    pub extra_tokens: Vec<SupplyToken>,
    /// Holders at or below this aToken balance are evicted each cycle.
    pub balance_threshold: f64,
    pub chain_id: ChainId,
}

impl Position {
    /// Human-readable name, `{supply}-{debt}` with a chain suffix off
    /// mainnet. Built from cached on-chain symbols.
    pub async fn name(&self) -> Result<String, TransportError> {
        let supply = self.supply_token.token.symbol().await?;
        let debt = self.debt_token.token.symbol().await?;
        let name = format!("{supply}-{debt}");
        Ok(match self.chain_id.suffix() {
            Some(suffix) => format!("{name}-{suffix}"),
            None => name,
        })
    }

    /// Total borrowed amount of the debt token: stable plus variable
    /// instruments, each scaled by its own precision.
    pub async fn total_debt(&self, user: Address, block: BlockRef) -> Result<f64, TransportError> {
        let stable = self.debt_token.stable.balance_of(user, block).await?;
        let variable = self.debt_token.variable.balance_of(user, block).await?;
        Ok(stable + variable)
    }

    pub async fn supply_price(&self, block: BlockRef) -> Result<f64, TransportError> {
        self.market
            .asset_price(self.supply_token.token.address, block)
            .await
    }

    pub async fn debt_price(&self, block: BlockRef) -> Result<f64, TransportError> {
        self.market
            .asset_price(self.debt_token.token.address, block)
            .await
    }
}
