use tracing::debug;

use crate::aggregate::Aggregates;
use crate::models::{Metric, Month, PivotTable};

/// Value substituted whenever a ratio or change has no defined result.
pub const DIVISION_SENTINEL: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ratio {
    Cpm,
    CrInstallsToRegistrations,
    CrRegistrationsToPurchases,
    Cpi,
    Cpr,
    Cpo,
    Aov,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioKind {
    /// Money per unit, rendered like any other number.
    Cost,
    /// Fraction of one funnel stage reaching the next, rendered as a percentage.
    Conversion,
}

impl Ratio {
    pub const ALL: [Ratio; 7] = [
        Ratio::Cpm,
        Ratio::CrInstallsToRegistrations,
        Ratio::CrRegistrationsToPurchases,
        Ratio::Cpi,
        Ratio::Cpr,
        Ratio::Cpo,
        Ratio::Aov,
    ];

    pub fn numerator(self) -> Metric {
        match self {
            Ratio::Cpm | Ratio::Cpi | Ratio::Cpr | Ratio::Cpo => Metric::AmountSpent,
            Ratio::Aov => Metric::Revenue,
            Ratio::CrInstallsToRegistrations => Metric::Registrations,
            Ratio::CrRegistrationsToPurchases => Metric::Purchases,
        }
    }

    pub fn denominator(self) -> Metric {
        match self {
            Ratio::Cpm => Metric::Impressions,
            Ratio::Cpi | Ratio::CrInstallsToRegistrations => Metric::AppInstalls,
            Ratio::Cpr | Ratio::CrRegistrationsToPurchases => Metric::Registrations,
            Ratio::Cpo | Ratio::Aov => Metric::Purchases,
        }
    }

    pub fn scale(self) -> f64 {
        match self {
            Ratio::Cpm => 1_000.0,
            _ => 1.0,
        }
    }

    pub fn kind(self) -> RatioKind {
        match self {
            Ratio::CrInstallsToRegistrations | Ratio::CrRegistrationsToPurchases => {
                RatioKind::Conversion
            }
            _ => RatioKind::Cost,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Ratio::Cpm => "CPM",
            Ratio::CrInstallsToRegistrations => "CR Installs 2 Registrations",
            Ratio::CrRegistrationsToPurchases => "CR Registrations 2 Purchases",
            Ratio::Cpi => "CPI (EUR)",
            Ratio::Cpr => "CPRegistration (EUR)",
            Ratio::Cpo => "CPO (EUR)",
            Ratio::Aov => "AOV (EUR)",
        }
    }
}

/// One cell where a sentinel replaced an undefined quotient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelApplied {
    pub table: &'static str,
    pub row: String,
    pub month: Month,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentinelLog {
    entries: Vec<SentinelApplied>,
}

impl SentinelLog {
    pub fn record(&mut self, table: &'static str, row: &str, month: Month) {
        debug!(table, row, %month, "division sentinel applied");
        self.entries.push(SentinelApplied {
            table,
            row: row.to_string(),
            month,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SentinelApplied> + 'a {
        self.entries.iter().filter(move |entry| entry.table == table)
    }

    pub fn count_for(&self, table: &str) -> usize {
        self.for_table(table).count()
    }
}

/// Divides two aggregated metrics cell by cell. Conversion ratios stay
/// fractions here; the formatter turns them into percentages.
pub fn derive_ratio(aggregates: &Aggregates, ratio: Ratio, log: &mut SentinelLog) -> PivotTable {
    let numerator = aggregates.table(ratio.numerator());
    let denominator = aggregates.table(ratio.denominator());
    let mut table = PivotTable::filled(
        aggregates.rows.clone(),
        aggregates.months.clone(),
        Some(DIVISION_SENTINEL),
    );

    for (row, name) in aggregates.rows.iter().enumerate() {
        for (column, month) in aggregates.months.iter().enumerate() {
            match quotient(numerator.value(row, column), denominator.value(row, column)) {
                Some(value) => table.values[row][column] = Some(value * ratio.scale()),
                None => log.record(ratio.title(), name, *month),
            }
        }
    }

    table
}

/// `None` when the denominator is zero or missing, or the numerator missing.
pub fn quotient(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(numerator), Some(denominator)) if denominator != 0.0 => Some(numerator / denominator),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, RowOrder};
    use crate::models::{Dimension, ReportRecord};
    use chrono::NaiveDate;

    fn record(
        campaign: &str,
        month: u32,
        spend: f64,
        impressions: f64,
        installs: Option<f64>,
        registrations: Option<f64>,
    ) -> ReportRecord {
        let reporting_ends = NaiveDate::from_ymd_opt(2024, month, 28).expect("valid date");
        ReportRecord {
            reporting_ends,
            month: Month::of(reporting_ends),
            campaign: campaign.to_string(),
            country: campaign.to_string(),
            impressions: Some(impressions),
            app_installs: installs,
            registrations,
            purchases: Some(2.0),
            unique_purchases: Some(2.0),
            amount_spent: Some(spend),
            revenue_per_purchase: Some(15.0),
            revenue: Some(30.0),
        }
    }

    #[test]
    fn cpm_scales_by_a_thousand() {
        let records = vec![record("Spain", 1, 50.0, 10_000.0, Some(10.0), Some(5.0))];
        let aggregates = aggregate(&records, Dimension::Campaign, RowOrder::FirstSeen);
        let mut log = SentinelLog::default();
        let cpm = derive_ratio(&aggregates, Ratio::Cpm, &mut log);
        assert_eq!(cpm.value(0, 0), Some(5.0));
        assert!(log.is_empty());
    }

    #[test]
    fn zero_installs_give_zero_cpi() {
        let records = vec![record("Spain", 1, 50.0, 10_000.0, Some(0.0), Some(5.0))];
        let aggregates = aggregate(&records, Dimension::Campaign, RowOrder::FirstSeen);
        let mut log = SentinelLog::default();
        let cpi = derive_ratio(&aggregates, Ratio::Cpi, &mut log);
        assert_eq!(cpi.value(0, 0), Some(0.0));
        assert_eq!(log.count_for("CPI (EUR)"), 1);
    }

    #[test]
    fn missing_denominator_gives_zero_conversion() {
        let records = vec![record("Spain", 1, 50.0, 10_000.0, None, Some(5.0))];
        let aggregates = aggregate(&records, Dimension::Campaign, RowOrder::FirstSeen);
        let mut log = SentinelLog::default();
        let cr = derive_ratio(&aggregates, Ratio::CrInstallsToRegistrations, &mut log);
        assert_eq!(cr.value(0, 0), Some(0.0));
        assert_eq!(log.len(), 1);
        let applied: Vec<&SentinelApplied> = log.for_table("CR Installs 2 Registrations").collect();
        assert_eq!(applied[0].row, "Spain");
        assert_eq!(applied[0].month, Month::new(2024, 1));
    }

    #[test]
    fn conversion_stays_a_fraction() {
        let records = vec![record("Spain", 1, 50.0, 10_000.0, Some(8.0), Some(2.0))];
        let aggregates = aggregate(&records, Dimension::Campaign, RowOrder::FirstSeen);
        let mut log = SentinelLog::default();
        let cr = derive_ratio(&aggregates, Ratio::CrInstallsToRegistrations, &mut log);
        assert_eq!(cr.value(0, 0), Some(0.25));
        let aov = derive_ratio(&aggregates, Ratio::Aov, &mut log);
        assert_eq!(aov.value(0, 0), Some(15.0));
    }

    #[test]
    fn zero_filled_cells_take_the_sentinel() {
        let records = vec![
            record("Spain", 1, 50.0, 10_000.0, Some(10.0), Some(5.0)),
            record("Italy", 2, 20.0, 4_000.0, Some(4.0), Some(2.0)),
        ];
        let aggregates = aggregate(&records, Dimension::Campaign, RowOrder::FirstSeen);
        let mut log = SentinelLog::default();
        let cpo = derive_ratio(&aggregates, Ratio::Cpo, &mut log);
        assert_eq!(cpo.value(0, 0), Some(25.0));
        assert_eq!(cpo.value(0, 1), Some(0.0));
        assert_eq!(cpo.value(1, 0), Some(0.0));
        assert_eq!(log.count_for("CPO (EUR)"), 2);
    }

    #[test]
    fn every_ratio_has_a_distinct_pair() {
        for ratio in Ratio::ALL {
            assert_ne!(ratio.numerator(), ratio.denominator());
        }
        assert_eq!(Ratio::Cpm.kind(), RatioKind::Cost);
        assert_eq!(Ratio::CrRegistrationsToPurchases.kind(), RatioKind::Conversion);
    }
}
