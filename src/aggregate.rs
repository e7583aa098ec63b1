use std::collections::{BTreeSet, HashMap};

use crate::models::{Dimension, Metric, Month, PivotTable, ReportRecord};

/// Order of dimension rows in every table of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    #[default]
    FirstSeen,
    Sorted,
}

/// Per-metric sums on a shared dimension by month grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub rows: Vec<String>,
    pub months: Vec<Month>,
    tables: Vec<PivotTable>,
}

impl Aggregates {
    pub fn table(&self, metric: Metric) -> &PivotTable {
        &self.tables[metric.index()]
    }
}

pub fn aggregate(records: &[ReportRecord], dimension: Dimension, order: RowOrder) -> Aggregates {
    let mut rows: Vec<String> = Vec::new();
    let mut row_index: HashMap<String, usize> = HashMap::new();
    let mut months: BTreeSet<Month> = BTreeSet::new();

    for record in records {
        let key = dimension.key(record);
        if !row_index.contains_key(key) {
            row_index.insert(key.to_string(), rows.len());
            rows.push(key.to_string());
        }
        months.insert(record.month);
    }

    if order == RowOrder::Sorted {
        rows.sort();
        row_index = rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.clone(), index))
            .collect();
    }

    let months: Vec<Month> = months.into_iter().collect();
    let month_index: HashMap<Month, usize> = months
        .iter()
        .enumerate()
        .map(|(index, month)| (*month, index))
        .collect();

    // Cells no record touched stay at zero; cells whose every contribution was
    // missing stay missing.
    let mut touched = vec![vec![false; months.len()]; rows.len()];
    let mut tables: Vec<PivotTable> = Metric::ALL
        .iter()
        .map(|_| PivotTable::filled(rows.clone(), months.clone(), None))
        .collect();

    for record in records {
        let row = row_index[dimension.key(record)];
        let column = month_index[&record.month];
        touched[row][column] = true;

        for (metric, table) in Metric::ALL.iter().zip(tables.iter_mut()) {
            let cell = &mut table.values[row][column];
            *cell = sum_skipping_missing(*cell, record.metric(*metric));
        }
    }

    for table in tables.iter_mut() {
        for (row, cells) in table.values.iter_mut().enumerate() {
            for (column, cell) in cells.iter_mut().enumerate() {
                if !touched[row][column] {
                    *cell = Some(0.0);
                }
            }
        }
    }

    Aggregates {
        rows,
        months,
        tables,
    }
}

pub fn sum_skipping_missing(acc: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (acc, value) {
        (Some(total), Some(value)) => Some(total + value),
        (None, value) => value,
        (total, None) => total,
    }
}
