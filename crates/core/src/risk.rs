//! Risk classification engine.
//!
//! Pure functions from the fetched per-user table to a per-zone
//! distribution. Rows are preprocessed into divergence measures
//! (how closely the holder's own token balances track the
//! pool-reported collateral and debt), then bucketed by health factor
//! against a descending threshold ladder into seven ordered zones.

use alloy::primitives::Address;

use crate::fetcher::UserRecord;

/// Ordered risk zones, safest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLabel {
    A,
    BPlus,
    B,
    BMinus,
    C,
    D,
    Liquidation,
}

impl RiskLabel {
    pub const ALL: [RiskLabel; 7] = [
        RiskLabel::A,
        RiskLabel::BPlus,
        RiskLabel::B,
        RiskLabel::BMinus,
        RiskLabel::C,
        RiskLabel::D,
        RiskLabel::Liquidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::C => "C",
            Self::D => "D",
            Self::Liquidation => "liquidation",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::BPlus => 1,
            Self::B => 2,
            Self::BMinus => 3,
            Self::C => 4,
            Self::D => 5,
            Self::Liquidation => 6,
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Six descending health-factor boundaries separating the seven zones.
pub type Thresholds = [f64; 6];

/// A preprocessed row: an active position with divergence measures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedRow {
    pub user: Address,
    pub amount: f64,
    pub borrowed: f64,
    pub health_factor: f64,
    pub emode: Option<bool>,
    /// |collateral − amount·supply_price − extra| / collateral
    pub diff_collateral: f64,
    /// |borrowed·debt_price − debt| / debt
    pub diff_debt: f64,
}

/// Preprocess the fetched table: drop rows without an active position
/// (no collateral or no debt) and compute the divergence columns.
pub fn prepare(records: &[UserRecord]) -> Vec<PreparedRow> {
    records
        .iter()
        .filter(|r| r.collateral > 0.0 && r.debt > 0.0)
        .map(|r| PreparedRow {
            user: r.user,
            amount: r.amount,
            borrowed: r.borrowed,
            health_factor: r.health_factor,
            emode: r.emode,
            diff_collateral: (r.collateral - r.amount * r.supply_price - r.extra_amount).abs()
                / r.collateral,
            diff_debt: (r.borrowed * r.debt_price - r.debt).abs() / r.debt,
        })
        .collect()
}

/// Assign a zone by walking the thresholds top-down; the first
/// interval satisfied wins. A health factor exactly on a boundary
/// falls to the riskier side, and anything at or below the last
/// threshold is `liquidation`.
pub fn label_for(health_factor: f64, thresholds: &Thresholds) -> RiskLabel {
    if health_factor > thresholds[0] {
        RiskLabel::A
    } else if health_factor > thresholds[1] {
        RiskLabel::BPlus
    } else if health_factor > thresholds[2] {
        RiskLabel::B
    } else if health_factor > thresholds[3] {
        RiskLabel::BMinus
    } else if health_factor > thresholds[4] {
        RiskLabel::C
    } else if health_factor > thresholds[5] {
        RiskLabel::D
    } else {
        RiskLabel::Liquidation
    }
}

/// Aggregates for one zone of one bin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoneStat {
    pub count: usize,
    /// Sum of position amounts.
    pub amount: f64,
    /// Amount converted with the block's supply-token price.
    pub value: f64,
    /// Share of the bin's total amount, percent.
    pub percent: f64,
}

/// Distribution over all seven zones. Zones absent from the data are
/// present with zeros; the mapping is never partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    zones: [ZoneStat; 7],
}

impl Distribution {
    pub fn get(&self, label: RiskLabel) -> &ZoneStat {
        &self.zones[label.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (RiskLabel, &ZoneStat)> {
        RiskLabel::ALL.iter().map(|&l| (l, &self.zones[l.index()]))
    }

    pub fn total_amount(&self) -> f64 {
        self.zones.iter().map(|z| z.amount).sum()
    }

    pub fn total_count(&self) -> usize {
        self.zones.iter().map(|z| z.count).sum()
    }
}

/// Classify one bin's rows and aggregate per zone. Rows with a
/// non-positive amount carry no exposure and are skipped.
pub fn distribution(
    rows: &[&PreparedRow],
    thresholds: &Thresholds,
    supply_price: f64,
) -> Distribution {
    let mut dist = Distribution::default();
    for row in rows {
        if row.amount <= 0.0 {
            continue;
        }
        let zone = &mut dist.zones[label_for(row.health_factor, thresholds).index()];
        zone.count += 1;
        zone.amount += row.amount;
    }

    let total = dist.total_amount();
    for zone in &mut dist.zones {
        zone.value = zone.amount * supply_price;
        zone.percent = if total > 0.0 {
            zone.amount / total * 100.0
        } else {
            0.0
        };
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const THRESHOLDS: Thresholds = [1.42, 1.21, 1.14, 1.07, 1.03, 1.00];

    fn row(hf: f64, amount: f64) -> PreparedRow {
        PreparedRow {
            user: address!("0000000000000000000000000000000000000001"),
            amount,
            borrowed: 1.0,
            health_factor: hf,
            emode: None,
            diff_collateral: 0.0,
            diff_debt: 0.0,
        }
    }

    #[test]
    fn boundary_falls_to_riskier_zone() {
        assert_eq!(label_for(1.43, &THRESHOLDS), RiskLabel::A);
        assert_eq!(label_for(1.42, &THRESHOLDS), RiskLabel::BPlus);
        assert_eq!(label_for(1.21, &THRESHOLDS), RiskLabel::B);
        assert_eq!(label_for(1.14, &THRESHOLDS), RiskLabel::BMinus);
        assert_eq!(label_for(1.07, &THRESHOLDS), RiskLabel::C);
        assert_eq!(label_for(1.03, &THRESHOLDS), RiskLabel::D);
        assert_eq!(label_for(1.00, &THRESHOLDS), RiskLabel::Liquidation);
        assert_eq!(label_for(0.5, &THRESHOLDS), RiskLabel::Liquidation);
    }

    #[test]
    fn all_seven_zones_always_present() {
        let dist = distribution(&[], &THRESHOLDS, 1.0);
        let mut seen = 0;
        for (label, stat) in dist.iter() {
            assert_eq!(*stat, ZoneStat::default(), "zone {label} not zeroed");
            seen += 1;
        }
        assert_eq!(seen, 7);
    }

    #[test]
    fn aggregates_amount_value_and_percent() {
        let rows = [row(1.5, 75.0), row(1.5, 25.0), row(0.9, 100.0)];
        let refs: Vec<&PreparedRow> = rows.iter().collect();
        let dist = distribution(&refs, &THRESHOLDS, 2.0);

        let a = dist.get(RiskLabel::A);
        assert_eq!(a.count, 2);
        assert_eq!(a.amount, 100.0);
        assert_eq!(a.value, 200.0);
        assert_eq!(a.percent, 50.0);

        let liq = dist.get(RiskLabel::Liquidation);
        assert_eq!(liq.count, 1);
        assert_eq!(liq.percent, 50.0);

        assert_eq!(dist.get(RiskLabel::C).count, 0);
        assert_eq!(dist.total_amount(), 200.0);
    }

    #[test]
    fn zero_amount_rows_are_skipped() {
        let rows = [row(1.5, 0.0), row(1.5, -1.0)];
        let refs: Vec<&PreparedRow> = rows.iter().collect();
        let dist = distribution(&refs, &THRESHOLDS, 1.0);
        assert_eq!(dist.total_count(), 0);
    }

    #[test]
    fn prepare_drops_inactive_positions_and_computes_diffs() {
        let active = UserRecord {
            amount: 100.0,
            collateral: 100.0,
            debt: 50.0,
            borrowed: 50.0,
            supply_price: 1.0,
            debt_price: 1.0,
            health_factor: 1.45,
            ..Default::default()
        };
        let no_debt = UserRecord {
            amount: 10.0,
            collateral: 10.0,
            debt: 0.0,
            ..Default::default()
        };
        let no_collateral = UserRecord {
            amount: 0.0,
            collateral: 0.0,
            debt: 5.0,
            ..Default::default()
        };

        let prepared = prepare(&[active, no_debt, no_collateral]);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].diff_collateral, 0.0);
        assert_eq!(prepared[0].diff_debt, 0.0);
    }
}
