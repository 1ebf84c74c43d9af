//! API clients for external services.
//!
//! This crate provides HTTP clients for:
//! - Price feed: independent spot-price time series used to
//!   cross-check oracle prices

mod feed;

pub use feed::{FeedError, PriceFeed, PricePoint};
