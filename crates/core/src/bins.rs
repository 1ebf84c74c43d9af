//! Behavioral bins over the preprocessed table.
//!
//! A bin selects a subset of positions for separate risk reporting:
//! positions whose token holdings cleanly match their pool exposure,
//! positions whose debt is mostly in some other asset, and a remainder
//! catching everything else exactly once.

use crate::risk::{PreparedRow, Thresholds};

/// Threshold ladder for the clean-match bins.
pub const RISK_BANDS_TIGHT: Thresholds = [1.42, 1.21, 1.14, 1.07, 1.03, 1.00];
/// Threshold ladder for mismatched and remainder bins.
pub const RISK_BANDS_WIDE: Thresholds = [2.50, 1.75, 1.50, 1.25, 1.10, 1.00];

/// How a bin selects its rows.
#[derive(Clone, Copy)]
pub enum BinFilter {
    /// Rows matching the predicate.
    Predicate(fn(&PreparedRow) -> bool),
    /// Rows matched by none of the predicate bins in the same set.
    /// With disjoint predicates this makes the bin set an exhaustive
    /// partition: every row lands in exactly one bin.
    Remainder,
}

/// One reporting bin: a row filter plus its threshold ladder.
#[derive(Clone, Copy)]
pub struct Bin {
    pub thresholds: Thresholds,
    pub filter: BinFilter,
}

/// Split `rows` across `bins`. Predicate bins take their matches;
/// remainder bins take whatever no predicate bin claimed.
pub fn partition<'a>(rows: &'a [PreparedRow], bins: &[Bin]) -> Vec<Vec<&'a PreparedRow>> {
    let claimed: Vec<bool> = rows
        .iter()
        .map(|row| {
            bins.iter().any(|bin| match bin.filter {
                BinFilter::Predicate(pred) => pred(row),
                BinFilter::Remainder => false,
            })
        })
        .collect();

    bins.iter()
        .map(|bin| match bin.filter {
            BinFilter::Predicate(pred) => rows.iter().filter(|row| pred(row)).collect(),
            BinFilter::Remainder => rows
                .iter()
                .zip(&claimed)
                .filter(|(_, claimed)| !**claimed)
                .map(|(row, _)| row)
                .collect(),
        })
        .collect()
}

/// Collateral and debt both track pool exposure within 20%, with an
/// actual borrow outstanding.
fn clean_match(row: &PreparedRow) -> bool {
    row.diff_collateral <= 0.2 && row.diff_debt <= 0.2 && row.borrowed > 0.0
}

fn clean_match_emode(row: &PreparedRow) -> bool {
    clean_match(row) && row.emode == Some(true)
}

fn clean_match_no_emode(row: &PreparedRow) -> bool {
    clean_match(row) && row.emode == Some(false)
}

/// More than 80% of the debt is in some other asset.
fn mismatched_debt(row: &PreparedRow) -> bool {
    row.diff_debt > 0.8
}

/// Bin set for V2-era positions without e-mode.
pub fn steth_bins() -> Vec<Bin> {
    vec![
        Bin {
            thresholds: RISK_BANDS_TIGHT,
            filter: BinFilter::Predicate(clean_match),
        },
        Bin {
            thresholds: RISK_BANDS_WIDE,
            filter: BinFilter::Predicate(mismatched_debt),
        },
        Bin {
            thresholds: RISK_BANDS_WIDE,
            filter: BinFilter::Remainder,
        },
    ]
}

/// Bin set for V3 positions: the clean-match bin splits by e-mode.
pub fn wsteth_bins() -> Vec<Bin> {
    vec![
        Bin {
            thresholds: RISK_BANDS_TIGHT,
            filter: BinFilter::Predicate(clean_match_emode),
        },
        Bin {
            thresholds: RISK_BANDS_TIGHT,
            filter: BinFilter::Predicate(clean_match_no_emode),
        },
        Bin {
            thresholds: RISK_BANDS_WIDE,
            filter: BinFilter::Predicate(mismatched_debt),
        },
        Bin {
            thresholds: RISK_BANDS_WIDE,
            filter: BinFilter::Remainder,
        },
    ]
}
