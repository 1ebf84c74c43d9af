//! External price feed client.
//!
//! A simple REST time series of `(timestamp, price)` points, used to
//! cross-check the oracle-reported supply price against an independent
//! spot source. The feed is advisory for price divergence but binding
//! for staleness: a series with no point close enough to the pinned
//! block's timestamp fails the cycle.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors produced by the price feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed feed response: {0}")]
    Decode(String),
    #[error("feed returned an empty series")]
    Empty,
    #[error("feed is stale: nearest point is {age_secs}s old, window is {max_age_secs}s")]
    Stale { age_secs: u64, max_age_secs: u64 },
}

/// One point of the feed's time series.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PricePoint {
    pub timestamp: u64,
    pub price: f64,
}

/// REST price feed client.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    client: reqwest::Client,
    url: String,
}

impl PriceFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Fetch the full time series, newest last.
    #[instrument(skip(self))]
    pub async fn series(&self) -> Result<Vec<PricePoint>, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;

        let mut points: Vec<PricePoint> = response
            .json()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))?;
        points.sort_by_key(|p| p.timestamp);

        debug!(points = points.len(), "Price series fetched");
        Ok(points)
    }

    /// Spot price at `timestamp`: the nearest point at or before it,
    /// rejected when older than `max_age`.
    pub async fn price_at(&self, timestamp: u64, max_age: Duration) -> Result<f64, FeedError> {
        let points = self.series().await?;
        price_from_series(&points, timestamp, max_age)
    }
}

/// Pick the spot price for `timestamp` out of a sorted series: the
/// nearest point at or before it, rejected when its age exceeds
/// `max_age`.
fn price_from_series(
    points: &[PricePoint],
    timestamp: u64,
    max_age: Duration,
) -> Result<f64, FeedError> {
    let point = nearest_at_or_before(points, timestamp).ok_or(FeedError::Empty)?;

    let age = timestamp.saturating_sub(point.timestamp);
    if age > max_age.as_secs() {
        return Err(FeedError::Stale {
            age_secs: age,
            max_age_secs: max_age.as_secs(),
        });
    }
    Ok(point.price)
}

/// Nearest point at or before `timestamp` in a series sorted by time.
fn nearest_at_or_before(points: &[PricePoint], timestamp: u64) -> Option<&PricePoint> {
    points.iter().rev().find(|p| p.timestamp <= timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Vec<PricePoint> {
        vec![
            PricePoint { timestamp: 100, price: 1.0 },
            PricePoint { timestamp: 200, price: 1.1 },
            PricePoint { timestamp: 300, price: 1.2 },
        ]
    }

    #[test]
    fn picks_nearest_at_or_before() {
        let points = series();
        assert_eq!(nearest_at_or_before(&points, 250).unwrap().price, 1.1);
        assert_eq!(nearest_at_or_before(&points, 200).unwrap().price, 1.1);
        assert_eq!(nearest_at_or_before(&points, 1000).unwrap().price, 1.2);
    }

    #[test]
    fn nothing_before_first_point() {
        let points = series();
        assert!(nearest_at_or_before(&points, 50).is_none());
        assert!(nearest_at_or_before(&[], 50).is_none());
    }

    #[test]
    fn fresh_point_within_the_window_passes() {
        let points = series();
        let price = price_from_series(&points, 350, Duration::from_secs(60)).unwrap();
        assert_eq!(price, 1.2);
    }

    #[test]
    fn point_older_than_the_window_is_stale() {
        let points = series();
        let err = price_from_series(&points, 1000, Duration::from_secs(60)).unwrap_err();
        match err {
            FeedError::Stale {
                age_secs,
                max_age_secs,
            } => {
                assert_eq!(age_secs, 700);
                assert_eq!(max_age_secs, 60);
            }
            other => panic!("expected a stale error, got {other}"),
        }
    }

    #[test]
    fn empty_series_is_its_own_error() {
        let err = price_from_series(&[], 100, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, FeedError::Empty));
    }
}
