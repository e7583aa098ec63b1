use crate::models::PivotTable;
use crate::ratio::{quotient, SentinelLog, DIVISION_SENTINEL};

/// Percent change of every month against the month before it. The first
/// month has nothing to compare with and is dropped.
pub fn month_over_month(table: &PivotTable, title: &'static str, log: &mut SentinelLog) -> PivotTable {
    let months = table.months.iter().skip(1).copied().collect();
    let mut changes = PivotTable::filled(table.rows.clone(), months, Some(DIVISION_SENTINEL));

    for (row, name) in table.rows.iter().enumerate() {
        for column in 1..table.months.len() {
            let previous = table.value(row, column - 1);
            let current = table.value(row, column);
            match percent_change(previous, current) {
                Some(change) => changes.values[row][column - 1] = Some(change),
                None => log.record(title, name, table.months[column]),
            }
        }
    }

    changes
}

/// `None` when either side is missing or the previous value is zero.
pub fn percent_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let current = current?;
    quotient(previous.map(|previous| current - previous), previous).map(|ratio| ratio * 100.0)
}
