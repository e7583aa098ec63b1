use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use crate::ratio::Ratio;

pub const FIELD_REPORTING_ENDS: &str = "Reporting ends";
pub const FIELD_CAMPAIGN_NAME: &str = "Campaign name";
pub const FIELD_IMPRESSIONS: &str = "Impressions";
pub const FIELD_APP_INSTALLS: &str = "App installs";
pub const FIELD_REGISTRATIONS: &str = "Mobile app registrations completed";
pub const FIELD_PURCHASES: &str = "Purchases";
pub const FIELD_UNIQUE_PURCHASES: &str = "Unique purchases";
pub const FIELD_AMOUNT_SPENT: &str = "Amount spent (EUR)";
pub const FIELD_REVENUE_PER_PURCHASE: &str = "Revenue per purchase (EUR)";

/// One row as delivered by a row source: field names mapped to raw text,
/// in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl FromIterator<(String, String)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (name, value) in iter {
            record.insert(&name, &value);
        }
        record
    }
}

/// Calendar month, ordered chronologically and rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Summed volume columns. `Revenue` is derived during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Impressions,
    AppInstalls,
    Registrations,
    Purchases,
    UniquePurchases,
    AmountSpent,
    Revenue,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Impressions,
        Metric::AppInstalls,
        Metric::Registrations,
        Metric::Purchases,
        Metric::UniquePurchases,
        Metric::AmountSpent,
        Metric::Revenue,
    ];

    /// Position within [`Metric::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn volume_title(self) -> &'static str {
        match self {
            Metric::Impressions => "Impressions, #",
            Metric::AppInstalls => "Installs, #",
            Metric::Registrations => "Mobile app registrations completed, #",
            Metric::Purchases => "Purchases, #",
            Metric::UniquePurchases => "Unique purchases, #",
            Metric::AmountSpent => "Amount spent (EUR)",
            Metric::Revenue => "Revenue (EUR)",
        }
    }

    pub fn change_title(self) -> &'static str {
        match self {
            Metric::Impressions => "Impressions Change MoM",
            Metric::AppInstalls => "Installs Change MoM",
            Metric::Registrations => "Regs Change MoM",
            Metric::Purchases => "Purchases Change MoM",
            Metric::UniquePurchases => "Unique Purchases Change MoM",
            Metric::AmountSpent => "Amount Spent Change MoM",
            Metric::Revenue => "Revenue Change MoM",
        }
    }
}

/// Grouping axis of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Campaign,
    Country,
}

impl Dimension {
    pub fn key(self, record: &ReportRecord) -> &str {
        match self {
            Dimension::Campaign => &record.campaign,
            Dimension::Country => &record.country,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Campaign => "campaign",
            Dimension::Country => "country",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A normalized report row. `None` marks a missing numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub reporting_ends: NaiveDate,
    pub month: Month,
    pub campaign: String,
    pub country: String,
    pub impressions: Option<f64>,
    pub app_installs: Option<f64>,
    pub registrations: Option<f64>,
    pub purchases: Option<f64>,
    pub unique_purchases: Option<f64>,
    pub amount_spent: Option<f64>,
    pub revenue_per_purchase: Option<f64>,
    pub revenue: Option<f64>,
}

impl ReportRecord {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Impressions => self.impressions,
            Metric::AppInstalls => self.app_installs,
            Metric::Registrations => self.registrations,
            Metric::Purchases => self.purchases,
            Metric::UniquePurchases => self.unique_purchases,
            Metric::AmountSpent => self.amount_spent,
            Metric::Revenue => self.revenue,
        }
    }
}

/// Dimension values by months grid of numeric cells.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub rows: Vec<String>,
    pub months: Vec<Month>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn filled(rows: Vec<String>, months: Vec<Month>, fill: Option<f64>) -> Self {
        let values = vec![vec![fill; months.len()]; rows.len()];
        Self {
            rows,
            months,
            values,
        }
    }

    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row).and_then(|cells| cells.get(column).copied().flatten())
    }
}

/// Every result table a pipeline run produces, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Volume(Metric),
    Change(Metric),
    Derived(Ratio),
}

impl TableKind {
    pub fn all() -> Vec<TableKind> {
        let mut kinds: Vec<TableKind> = Metric::ALL.iter().map(|m| TableKind::Volume(*m)).collect();
        kinds.extend(Metric::ALL.iter().map(|m| TableKind::Change(*m)));
        kinds.extend(Ratio::ALL.iter().map(|r| TableKind::Derived(*r)));
        kinds
    }

    pub fn title(self) -> &'static str {
        match self {
            TableKind::Volume(metric) => metric.volume_title(),
            TableKind::Change(metric) => metric.change_title(),
            TableKind::Derived(ratio) => ratio.title(),
        }
    }

    pub fn from_title(title: &str) -> Option<TableKind> {
        TableKind::all().into_iter().find(|kind| kind.title() == title)
    }
}

/// A table after formatting, ready to be written cell by cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub kind: TableKind,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<String>,
    pub cells: Vec<Vec<String>>,
}
