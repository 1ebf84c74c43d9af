//! Production position registry.
//!
//! Deployed-contract addresses come from the AAVE deployed-contracts
//! listings for each chain. Init blocks are the aToken deployment
//! blocks, so the first sweep replays holder history from day one.

use std::sync::Arc;

use alloy::primitives::address;
use monitor_chain::{Erc20, LendingPool, PoolVersion, ResilientTransport};

use crate::bins::{steth_bins, wsteth_bins};
use crate::holders::ScanContext;
use crate::market::{ChainId, DebtToken, Market, Position, SupplyToken};
use crate::monitor::Worker;

/// stETH supplied against WETH debt on the V2 mainnet pool. Dust
/// accounts are evicted at 0.1 stETH.
fn steth_weth_v2(transport: &Arc<ResilientTransport>) -> Worker {
    let pool = LendingPool::new(
        transport.clone(),
        address!("7d2768de32b0b80b7a3454c06bdac94a69ddc7a9"),
        PoolVersion::V2,
    );
    Worker {
        position: Position {
            market: Market::new(pool),
            supply_token: SupplyToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("ae7ab96520de3a18e5e111b5eaab095312d7fe84"),
                ),
                a_token: Erc20::new(
                    transport.clone(),
                    address!("1982b2f5814301d4e9a8b0201555376e62f82428"),
                ),
            },
            debt_token: DebtToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
                ),
                stable: Erc20::new(
                    transport.clone(),
                    address!("4e977830ba4bd783c0bb7f15d3e243f73ff57121"),
                ),
                variable: Erc20::new(
                    transport.clone(),
                    address!("f63b34710400cad3e044cffdcab00a0f32e33ecf"),
                ),
            },
            extra_tokens: Vec::new(),
            balance_threshold: 0.1,
            chain_id: ChainId::Homestead,
        },
        ctx: ScanContext::new(14_289_297),
        bins: steth_bins(),
    }
}

/// wstETH supplied against WETH debt on the V3 mainnet pool.
fn wsteth_weth_v3(transport: &Arc<ResilientTransport>) -> Worker {
    let pool = LendingPool::new(
        transport.clone(),
        address!("87870bca3f3fd6335c3f4ce8392d69350b4fa4e2"),
        PoolVersion::V3,
    );
    Worker {
        position: Position {
            market: Market::new(pool),
            supply_token: SupplyToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0"),
                ),
                a_token: Erc20::new(
                    transport.clone(),
                    address!("0b925ed163218f6662a35e0f0371ac234f9e9371"),
                ),
            },
            debt_token: DebtToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
                ),
                stable: Erc20::new(
                    transport.clone(),
                    address!("102633152313c81cd80419b6ecf66d14ad68949a"),
                ),
                variable: Erc20::new(
                    transport.clone(),
                    address!("ea51d7853eefb32b6ee06b1c12e6dcca88be0ffe"),
                ),
            },
            extra_tokens: Vec::new(),
            balance_threshold: 0.0,
            chain_id: ChainId::Homestead,
        },
        ctx: ScanContext::new(16_496_795),
        bins: wsteth_bins(),
    }
}

/// stMATIC supplied against WMATIC debt on the V3 Polygon pool.
fn stmatic_wmatic_v3(transport: &Arc<ResilientTransport>) -> Worker {
    let pool = LendingPool::new(
        transport.clone(),
        address!("794a61358d6845594f94dc1db02a252b5b4814ad"),
        PoolVersion::V3,
    );
    Worker {
        position: Position {
            market: Market::new(pool),
            supply_token: SupplyToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("3a58a54c066fdc0f2d55fc9c89f0415c92ebf3c4"),
                ),
                a_token: Erc20::new(
                    transport.clone(),
                    address!("ea1132120ddcdda2f119e99fa7a27a0d036f7ac9"),
                ),
            },
            debt_token: DebtToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
                ),
                stable: Erc20::new(
                    transport.clone(),
                    address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
                ),
                variable: Erc20::new(
                    transport.clone(),
                    address!("4a1c3ad6ed28a636ee1751c69071f6be75deb8b8"),
                ),
            },
            extra_tokens: Vec::new(),
            balance_threshold: 0.0,
            chain_id: ChainId::Polygon,
        },
        ctx: ScanContext::new(33_101_585),
        bins: steth_bins(),
    }
}

/// wstETH supplied against WETH debt on the V3 Arbitrum pool.
fn wsteth_weth_arbitrum(transport: &Arc<ResilientTransport>) -> Worker {
    let pool = LendingPool::new(
        transport.clone(),
        address!("794a61358d6845594f94dc1db02a252b5b4814ad"),
        PoolVersion::V3,
    );
    Worker {
        position: Position {
            market: Market::new(pool),
            supply_token: SupplyToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("5979d7b546e38e414f7e9822514be443a4800529"),
                ),
                a_token: Erc20::new(
                    transport.clone(),
                    address!("513c7e3a9c69ca3e22550ef58ac1c0088e918fff"),
                ),
            },
            debt_token: DebtToken {
                token: Erc20::new(
                    transport.clone(),
                    address!("82af49447d8a07e3bd95bd0d56f35241523fbab1"),
                ),
                stable: Erc20::new(
                    transport.clone(),
                    address!("d8ad37849950903571df17049516a5cd4cbe55f6"),
                ),
                variable: Erc20::new(
                    transport.clone(),
                    address!("0c84331e39d6658cd6e6b9ba04736cc4c4734351"),
                ),
            },
            extra_tokens: Vec::new(),
            balance_threshold: 0.0,
            chain_id: ChainId::Arbitrum,
        },
        ctx: ScanContext::new(65_735_133),
        bins: wsteth_bins(),
    }
}

/// All configured workers. The monitor filters them down to the chain
/// behind its transport at sweep time.
pub fn workers(transport: &Arc<ResilientTransport>) -> Vec<Worker> {
    vec![
        steth_weth_v2(transport),
        wsteth_weth_v3(transport),
        stmatic_wmatic_v3(transport),
        wsteth_weth_arbitrum(transport),
    ]
}
