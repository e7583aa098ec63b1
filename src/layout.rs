use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::models::{Dimension, RenderedTable, TableKind};

pub const CAMPAIGNS_DESTINATION: &str = "pivot tables - campaigns data";
pub const COUNTRIES_DESTINATION: &str = "pivot tables - countries data";

/// Largest addressable row and column (`XFD1048576`), as in common spreadsheets.
pub const MAX_ROW: u32 = 1_048_576;
pub const MAX_COLUMN: u32 = 16_384;

/// A1-style cell address, 1-based on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    pub fn offset(self, columns: u32, rows: u32) -> Self {
        Self {
            column: self.column.saturating_add(columns),
            row: self.row.saturating_add(rows),
        }
    }

    /// `None` once the shifted cell falls off the sheet.
    pub fn checked_offset(self, columns: u32, rows: u32) -> Option<Self> {
        let shifted = Self {
            column: self.column.checked_add(columns)?,
            row: self.row.checked_add(rows)?,
        };
        shifted.in_bounds().then_some(shifted)
    }

    pub fn in_bounds(self) -> bool {
        (1..=MAX_COLUMN).contains(&self.column) && (1..=MAX_ROW).contains(&self.row)
    }
}

impl FromStr for CellRef {
    type Err = LayoutError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || LayoutError::InvalidCell(raw.to_string());
        let trimmed = raw.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = trimmed.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }

        let mut column: u32 = 0;
        for letter in letters.chars() {
            let value = letter.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            column = column
                .checked_mul(26)
                .and_then(|c| c.checked_add(value))
                .ok_or_else(invalid)?;
        }

        let row: u32 = digits.parse().map_err(|_| invalid())?;
        let cell = Self { column, row };
        if !cell.in_bounds() {
            return Err(invalid());
        }

        Ok(cell)
    }
}

impl TryFrom<String> for CellRef {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellRef> for String {
    fn from(value: CellRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = Vec::new();
        let mut column = self.column;
        while column > 0 {
            let remainder = (column - 1) % 26;
            letters.push((b'A' + remainder as u8) as char);
            column = (column - 1) / 26;
        }
        let letters: String = letters.into_iter().rev().collect();
        write!(f, "{letters}{}", self.row)
    }
}

/// Where the four pieces of one table land on the destination sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub table: String,
    pub title: CellRef,
    pub header_row: CellRef,
    pub header_column: CellRef,
    pub values: CellRef,
}

impl Placement {
    /// Smallest rectangle covering everything written for `table`, as
    /// (first column, first row, last column, last row).
    pub fn footprint(&self, table: &RenderedTable) -> (u32, u32, u32, u32) {
        let columns = table.columns.len() as u32;
        let rows = table.rows.len() as u32;
        let pieces = [
            (self.title, 1, 1),
            (self.header_row, columns, 1),
            (self.header_column, 1, rows),
            (self.values, columns, rows),
        ];

        let mut bounds = (u32::MAX, u32::MAX, 0, 0);
        for (anchor, width, height) in pieces {
            if width == 0 || height == 0 {
                continue;
            }
            bounds.0 = bounds.0.min(anchor.column);
            bounds.1 = bounds.1.min(anchor.row);
            bounds.2 = bounds.2.max(anchor.column.saturating_add(width - 1));
            bounds.3 = bounds.3.max(anchor.row.saturating_add(height - 1));
        }
        bounds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub destination: String,
    pub tables: Vec<Placement>,
}

impl Layout {
    pub fn default_for(dimension: Dimension) -> Self {
        match dimension {
            Dimension::Campaign => Self::stacked(CAMPAIGNS_DESTINATION, 12),
            Dimension::Country => Self::stacked(COUNTRIES_DESTINATION, 4),
        }
    }

    /// Three bands of seven tables: volumes from column A, changes from F,
    /// derived ratios from J. Each table starts `spacing` rows below the last.
    pub fn stacked(destination: &str, spacing: u32) -> Self {
        let bands: [(u32, Vec<TableKind>); 3] = {
            let kinds = TableKind::all();
            [
                (1, kinds[0..7].to_vec()),
                (6, kinds[7..14].to_vec()),
                (10, kinds[14..21].to_vec()),
            ]
        };

        let mut tables = Vec::new();
        for (title_column, kinds) in bands {
            for (index, kind) in kinds.into_iter().enumerate() {
                let top = CellRef::new(title_column, 1 + index as u32 * spacing);
                tables.push(Placement {
                    table: kind.title().to_string(),
                    title: top,
                    header_row: top.offset(1, 0),
                    header_column: top.offset(0, 1),
                    values: top.offset(1, 1),
                });
            }
        }

        Self {
            destination: destination.to_string(),
            tables,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, LayoutError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LayoutError::Unreadable(format!("{}: {e}", path.display())))?;
        let layout: Layout = serde_json::from_str(&raw)
            .map_err(|e| LayoutError::Unreadable(format!("{}: {e}", path.display())))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Every table placed exactly once on the sheet, and nothing else.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut seen = HashSet::new();
        for placement in &self.tables {
            if TableKind::from_title(&placement.table).is_none() {
                return Err(LayoutError::UnknownTable(placement.table.clone()));
            }
            let anchors = [
                placement.title,
                placement.header_row,
                placement.header_column,
                placement.values,
            ];
            if let Some(cell) = anchors.into_iter().find(|cell| !cell.in_bounds()) {
                return Err(LayoutError::InvalidCell(cell.to_string()));
            }
            if !seen.insert(placement.table.as_str()) {
                return Err(LayoutError::DuplicatePlacement(placement.table.clone()));
            }
        }

        match TableKind::all()
            .into_iter()
            .find(|kind| !seen.contains(kind.title()))
        {
            Some(kind) => Err(LayoutError::MissingPlacement(kind.title().to_string())),
            None => Ok(()),
        }
    }

    pub fn placement(&self, kind: TableKind) -> Result<&Placement, LayoutError> {
        self.tables
            .iter()
            .find(|placement| placement.table == kind.title())
            .ok_or_else(|| LayoutError::MissingPlacement(kind.title().to_string()))
    }

    /// Pairs of table titles whose written regions intersect.
    pub fn overlaps(&self, tables: &[RenderedTable]) -> Vec<(String, String)> {
        let footprints: Vec<(&str, (u32, u32, u32, u32))> = tables
            .iter()
            .filter_map(|table| {
                self.placement(table.kind)
                    .ok()
                    .map(|placement| (table.title.as_str(), placement.footprint(table)))
            })
            .collect();

        let mut clashes = Vec::new();
        for (index, (left_title, left)) in footprints.iter().enumerate() {
            for (right_title, right) in footprints.iter().skip(index + 1) {
                let disjoint = left.2 < right.0 || right.2 < left.0 || left.3 < right.1 || right.3 < left.1;
                if !disjoint {
                    clashes.push((left_title.to_string(), right_title.to_string()));
                }
            }
        }
        clashes
    }
}
