use crate::models::{PivotTable, RenderedTable, TableKind};
use crate::ratio::RatioKind;

const LARGE_VALUE: f64 = 1e6;

/// A cell on its way to the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Missing,
    Text(String),
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Number)
    }
}

/// Above one million: one decimal, thousands split by spaces.
/// Otherwise: two decimals.
pub fn format_number(value: f64) -> String {
    if value.abs() > LARGE_VALUE {
        group_thousands(&format!("{value:.1}"))
    } else {
        format!("{value:.2}")
    }
}

/// Ratios are fractions; `0.1234` renders as `12.34%`.
pub fn format_conversion(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Changes are already percentages; `50.0` renders as `50.0%`.
pub fn format_change(percent: f64) -> String {
    format!("{percent:.1}%")
}

/// Numeric text is reformatted, anything else passes through untouched.
pub fn render_text(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => format_number(value),
        _ => raw.to_string(),
    }
}

pub fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Number(value) => format_number(*value),
        // Blank, so "no data" never reads as a real zero.
        Cell::Missing => String::new(),
        Cell::Text(text) => render_text(text),
    }
}

pub fn render(kind: TableKind, table: &PivotTable) -> RenderedTable {
    let to_cell = |value: Option<f64>| -> Cell {
        match (kind, value) {
            (TableKind::Change(_), Some(value)) => Cell::Text(format_change(value)),
            (TableKind::Derived(ratio), Some(value)) if ratio.kind() == RatioKind::Conversion => {
                Cell::Text(format_conversion(value))
            }
            (_, value) => Cell::from(value),
        }
    };

    RenderedTable {
        kind,
        title: kind.title().to_string(),
        columns: table.months.iter().map(|month| month.to_string()).collect(),
        rows: table.rows.clone(),
        cells: table
            .values
            .iter()
            .map(|cells| cells.iter().map(|value| render_cell(&to_cell(*value))).collect())
            .collect(),
    }
}

fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(formatted.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}
