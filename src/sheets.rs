use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{SinkError, SourceError};
use crate::layout::CellRef;
use crate::models::RawRecord;

/// Supplies the raw rows of a named table.
pub trait RowSource {
    fn fetch_rows(&self, source_name: &str) -> Result<Vec<RawRecord>, SourceError>;
}

/// Overwrites a rectangular block of cells on a named sheet.
pub trait TableWriter {
    fn write_block(
        &mut self,
        destination: &str,
        top_left: CellRef,
        block: &[Vec<String>],
    ) -> Result<(), SinkError>;
}

/// Reads `<dir>/<source_name>.csv`; the header row names the fields.
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    dir: PathBuf,
}

impl CsvRowSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source_name: &str) -> PathBuf {
        self.dir.join(format!("{source_name}.csv"))
    }
}

impl RowSource for CsvRowSource {
    fn fetch_rows(&self, source_name: &str) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.path_for(source_name);
        if !path.exists() {
            return Err(SourceError::NotFound {
                name: source_name.to_string(),
                path: path.display().to_string(),
            });
        }

        let read_error = |e: csv::Error| SourceError::Read {
            name: source_name.to_string(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(read_error)?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(read_error)?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(read_error)?;
            // Short rows simply lack the trailing fields.
            let row: RawRecord = headers
                .iter()
                .zip(record.iter())
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect();
            rows.push(row);
        }

        info!(source = source_name, rows = rows.len(), path = %path.display(), "fetched rows");
        Ok(rows)
    }
}

#[derive(Debug, Clone, Default)]
struct Sheet {
    cells: BTreeMap<(u32, u32), String>,
}

impl Sheet {
    fn set(&mut self, cell: CellRef, value: &str) {
        if value.is_empty() {
            self.cells.remove(&(cell.row, cell.column));
        } else {
            self.cells.insert((cell.row, cell.column), value.to_string());
        }
    }

    fn grid(&self) -> Vec<Vec<String>> {
        let height = self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0);
        let width = self.cells.keys().map(|(_, column)| *column).max().unwrap_or(0);
        let mut grid = vec![vec![String::new(); width as usize]; height as usize];
        for ((row, column), value) in &self.cells {
            grid[*row as usize - 1][*column as usize - 1] = value.clone();
        }
        grid
    }
}

/// A workbook of CSV files, one per destination sheet. Existing files are
/// loaded on first touch so cells outside the written blocks survive.
#[derive(Debug)]
pub struct CsvWorkbook {
    dir: PathBuf,
    sheets: BTreeMap<String, Sheet>,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sheets: BTreeMap::new(),
        }
    }

    pub fn path_for(&self, destination: &str) -> PathBuf {
        let file: String = destination
            .chars()
            .map(|c| if c.is_alphanumeric() || " -_".contains(c) { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.csv"))
    }

    /// Writes every touched sheet back to disk.
    pub fn save(&self) -> Result<Vec<PathBuf>, SinkError> {
        let mut written = Vec::new();
        for (destination, sheet) in &self.sheets {
            let save_error = |message: String| SinkError::Save {
                destination: destination.clone(),
                message,
            };

            std::fs::create_dir_all(&self.dir).map_err(|e| save_error(e.to_string()))?;
            let path = self.path_for(destination);
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&path)
                .map_err(|e| save_error(e.to_string()))?;
            for row in sheet.grid() {
                writer
                    .write_record(&row)
                    .map_err(|e| save_error(e.to_string()))?;
            }
            writer.flush().map_err(|e| save_error(e.to_string()))?;

            info!(destination = %destination, path = %path.display(), "saved sheet");
            written.push(path);
        }
        Ok(written)
    }

    fn sheet_mut(&mut self, destination: &str) -> Result<&mut Sheet, SinkError> {
        if !self.sheets.contains_key(destination) {
            let sheet = load_sheet(&self.path_for(destination)).map_err(|e| SinkError::Load {
                destination: destination.to_string(),
                message: e.to_string(),
            })?;
            self.sheets.insert(destination.to_string(), sheet);
        }

        Ok(self
            .sheets
            .entry(destination.to_string())
            .or_default())
    }
}

impl TableWriter for CsvWorkbook {
    fn write_block(
        &mut self,
        destination: &str,
        top_left: CellRef,
        block: &[Vec<String>],
    ) -> Result<(), SinkError> {
        let out_of_bounds = || SinkError::OutOfBounds {
            destination: destination.to_string(),
            top_left: top_left.to_string(),
        };
        let height = u32::try_from(block.len()).map_err(|_| out_of_bounds())?;
        let width = block.iter().map(Vec::len).max().unwrap_or(0);
        let width = u32::try_from(width).map_err(|_| out_of_bounds())?;
        if height > 0 && width > 0 && top_left.checked_offset(width - 1, height - 1).is_none() {
            return Err(out_of_bounds());
        }

        let sheet = self.sheet_mut(destination)?;
        for (row_offset, row) in block.iter().enumerate() {
            for (column_offset, value) in row.iter().enumerate() {
                sheet.set(top_left.offset(column_offset as u32, row_offset as u32), value);
            }
        }
        debug!(destination, %top_left, rows = block.len(), "wrote block");
        Ok(())
    }
}

#[cfg(test)]
impl CsvWorkbook {
    pub fn cell(&self, destination: &str, cell: CellRef) -> Option<&str> {
        self.sheets
            .get(destination)
            .and_then(|sheet| sheet.cells.get(&(cell.row, cell.column)))
            .map(String::as_str)
    }

    pub fn grid(&self, destination: &str) -> Vec<Vec<String>> {
        self.sheets
            .get(destination)
            .map(Sheet::grid)
            .unwrap_or_default()
    }
}

fn load_sheet(path: &Path) -> Result<Sheet, csv::Error> {
    let mut sheet = Sheet::default();
    if !path.exists() {
        return Ok(sheet);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    for (row_index, result) in reader.records().enumerate() {
        let record = result?;
        for (column_index, value) in record.iter().enumerate() {
            sheet.set(
                CellRef::new(column_index as u32 + 1, row_index as u32 + 1),
                value,
            );
        }
    }
    Ok(sheet)
}
