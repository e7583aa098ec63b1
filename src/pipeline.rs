use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate, RowOrder};
use crate::delta::month_over_month;
use crate::error::PipelineResult;
use crate::format::render;
use crate::layout::Layout;
use crate::models::{Dimension, Metric, Month, RenderedTable, ReportRecord, TableKind};
use crate::normalize::normalize_records;
use crate::ratio::{derive_ratio, Ratio, SentinelLog};
use crate::sheets::{RowSource, TableWriter};

/// One grouping of the pipeline: which axis, in what row order, written where.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dimension: Dimension,
    pub row_order: RowOrder,
    pub layout: Layout,
}

impl PipelineConfig {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            row_order: RowOrder::default(),
            layout: Layout::default_for(dimension),
        }
    }
}

/// Every formatted table for one dimension, not yet written.
#[derive(Debug, Clone)]
pub struct DimensionOutput {
    pub months: Vec<Month>,
    pub rows: Vec<String>,
    pub tables: Vec<RenderedTable>,
    pub sentinels: SentinelLog,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dataset: String,
    pub dimension: Dimension,
    pub destination: String,
    pub records: usize,
    pub dimension_values: usize,
    pub months: Vec<Month>,
    pub tables_written: usize,
    pub sentinels_applied: usize,
}

/// What one dimension of a run produced and wrote.
#[derive(Debug, Clone)]
pub struct DimensionRun {
    pub summary: RunSummary,
    pub output: DimensionOutput,
}

pub fn build_tables(records: &[ReportRecord], dimension: Dimension, order: RowOrder) -> DimensionOutput {
    let aggregates = aggregate(records, dimension, order);
    let mut sentinels = SentinelLog::default();
    let mut tables = Vec::with_capacity(TableKind::all().len());

    for metric in Metric::ALL {
        tables.push(render(TableKind::Volume(metric), aggregates.table(metric)));
    }
    for metric in Metric::ALL {
        let changes = month_over_month(aggregates.table(metric), metric.change_title(), &mut sentinels);
        tables.push(render(TableKind::Change(metric), &changes));
    }
    for ratio in Ratio::ALL {
        let derived = derive_ratio(&aggregates, ratio, &mut sentinels);
        tables.push(render(TableKind::Derived(ratio), &derived));
    }

    DimensionOutput {
        months: aggregates.months,
        rows: aggregates.rows,
        tables,
        sentinels,
    }
}

/// Issues the four writes of every table: month header row, dimension
/// header column, data block, title.
pub fn write_tables<W: TableWriter + ?Sized>(
    writer: &mut W,
    layout: &Layout,
    tables: &[RenderedTable],
) -> PipelineResult<usize> {
    for (left, right) in layout.overlaps(tables) {
        warn!(destination = %layout.destination, left = %left, right = %right, "tables overlap on destination sheet");
    }

    let destination = layout.destination.as_str();
    for table in tables {
        let placement = layout.placement(table.kind)?;
        let header_column: Vec<Vec<String>> = table.rows.iter().map(|row| vec![row.clone()]).collect();

        writer.write_block(destination, placement.header_row, &[table.columns.clone()])?;
        writer.write_block(destination, placement.header_column, &header_column)?;
        writer.write_block(destination, placement.values, &table.cells)?;
        writer.write_block(destination, placement.title, &[vec![table.title.clone()]])?;
    }

    Ok(tables.len())
}

/// Fetches the dataset once, builds every requested grouping, and only then
/// starts writing. Any fatal error leaves the destination untouched.
pub fn run<S, W>(
    source: &S,
    writer: &mut W,
    dataset: &str,
    configs: &[PipelineConfig],
) -> PipelineResult<Vec<DimensionRun>>
where
    S: RowSource + ?Sized,
    W: TableWriter + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline_run", %run_id, dataset);
    let _guard = span.enter();

    for config in configs {
        config.layout.validate()?;
    }

    let raw = source.fetch_rows(dataset)?;
    let records = normalize_records(&raw)?;
    let first_report = records.iter().map(|record| record.reporting_ends).min();
    let last_report = records.iter().map(|record| record.reporting_ends).max();
    info!(records = records.len(), ?first_report, ?last_report, "normalized records");

    let outputs: Vec<DimensionOutput> = configs
        .iter()
        .map(|config| build_tables(&records, config.dimension, config.row_order))
        .collect();

    let mut runs = Vec::with_capacity(outputs.len());
    for (config, output) in configs.iter().zip(outputs) {
        let tables_written = write_tables(writer, &config.layout, &output.tables)?;
        info!(
            dimension = %config.dimension,
            destination = %config.layout.destination,
            tables = tables_written,
            sentinels = output.sentinels.len(),
            "wrote tables"
        );

        let summary = RunSummary {
            run_id,
            dataset: dataset.to_string(),
            dimension: config.dimension,
            destination: config.layout.destination.clone(),
            records: records.len(),
            dimension_values: output.rows.len(),
            months: output.months.clone(),
            tables_written,
            sentinels_applied: output.sentinels.len(),
        };
        runs.push(DimensionRun { summary, output });
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, SourceError};
    use crate::layout::CellRef;
    use crate::models::RawRecord;
    use crate::sheets::CsvWorkbook;

    struct StaticSource(Vec<RawRecord>);

    impl RowSource for StaticSource {
        fn fetch_rows(&self, _source_name: &str) -> Result<Vec<RawRecord>, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn row(date: &str, campaign: &str, impressions: &str, installs: &str, spend: &str) -> RawRecord {
        RawRecord::new()
            .with("Reporting ends", date)
            .with("Campaign name", campaign)
            .with("Impressions", impressions)
            .with("App installs", installs)
            .with("Mobile app registrations completed", "4")
            .with("Purchases", "2")
            .with("Unique purchases", "1")
            .with("Amount spent (EUR)", spend)
            .with("Revenue per purchase (EUR)", "12.5")
    }

    fn sample() -> StaticSource {
        StaticSource(vec![
            row("2024-02-29", "Germany, Summer Sale", "1000", "10", "50"),
            row("2024-01-31", "Germany, Summer Sale", "800", "0", "40"),
            row("2024-01-31", "Spain, Launch", "2000000", "", "100"),
            row("2024-02-29", "Germany, Winter", "500", "5", "25"),
        ])
    }

    fn table<'a>(output: &'a DimensionOutput, title: &str) -> &'a RenderedTable {
        output
            .tables
            .iter()
            .find(|table| table.title == title)
            .expect("table exists")
    }

    #[test]
    fn builds_all_tables_for_a_dimension() {
        let source = sample();
        let records = normalize_records(&source.0).expect("normalizes");
        let output = build_tables(&records, Dimension::Campaign, RowOrder::FirstSeen);

        assert_eq!(output.tables.len(), 21);
        assert_eq!(
            output.rows,
            vec!["Germany, Summer Sale", "Spain, Launch", "Germany, Winter"]
        );

        let impressions = table(&output, "Impressions, #");
        assert_eq!(impressions.columns, vec!["2024-01", "2024-02"]);
        assert_eq!(impressions.cells[0], vec!["800.00", "1000.00"]);
        assert_eq!(impressions.cells[1], vec!["2 000 000.0", "0.00"]);

        let installs = table(&output, "Installs, #");
        assert_eq!(installs.cells[1][0], "");

        let change = table(&output, "Impressions Change MoM");
        assert_eq!(change.columns, vec!["2024-02"]);
        assert_eq!(change.cells[0], vec!["25.0%"]);
        assert_eq!(change.cells[1], vec!["-100.0%"]);
        assert_eq!(change.cells[2], vec!["0.0%"]);

        let cpi = table(&output, "CPI (EUR)");
        assert_eq!(cpi.cells[0], vec!["0.00", "5.00"]);

        let cr = table(&output, "CR Installs 2 Registrations");
        assert_eq!(cr.cells[0], vec!["0.00%", "40.00%"]);

        let cpm = table(&output, "CPM");
        assert_eq!(cpm.cells[0], vec!["50.00", "50.00"]);
        assert!(output.sentinels.count_for("CPI (EUR)") >= 2);
    }

    #[test]
    fn country_grouping_merges_campaigns() {
        let source = sample();
        let records = normalize_records(&source.0).expect("normalizes");
        let output = build_tables(&records, Dimension::Country, RowOrder::FirstSeen);

        assert_eq!(output.rows, vec!["Germany", "Spain"]);
        let spend = table(&output, "Amount spent (EUR)");
        assert_eq!(spend.cells[0], vec!["40.00", "75.00"]);
        let revenue = table(&output, "Revenue (EUR)");
        assert_eq!(revenue.cells[0], vec!["25.00", "50.00"]);
        let aov = table(&output, "AOV (EUR)");
        assert_eq!(aov.cells[0], vec!["12.50", "12.50"]);
    }

    #[test]
    fn writes_four_blocks_per_table_at_layout_addresses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut workbook = CsvWorkbook::new(dir.path());
        let configs = [PipelineConfig::new(Dimension::Country)];

        let runs = run(&sample(), &mut workbook, "dataset", &configs).expect("runs");
        assert_eq!(runs.len(), 1);
        let summary = &runs[0].summary;
        assert_eq!(summary.tables_written, 21);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.dimension_values, 2);
        assert_eq!(summary.destination, "pivot tables - countries data");

        let sheet = "pivot tables - countries data";
        let at = |cell: &str| {
            let cell: CellRef = cell.parse().expect("valid cell");
            workbook.cell(sheet, cell).map(str::to_string)
        };
        assert_eq!(at("A1").as_deref(), Some("Impressions, #"));
        assert_eq!(at("B1").as_deref(), Some("2024-01"));
        assert_eq!(at("C1").as_deref(), Some("2024-02"));
        assert_eq!(at("A2").as_deref(), Some("Germany"));
        assert_eq!(at("A3").as_deref(), Some("Spain"));
        assert_eq!(at("C2").as_deref(), Some("1500.00"));
        assert_eq!(at("F1").as_deref(), Some("Impressions Change MoM"));
        assert_eq!(at("G1").as_deref(), Some("2024-02"));
        assert_eq!(at("J1").as_deref(), Some("CPM"));
    }

    #[test]
    fn malformed_row_aborts_before_any_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut workbook = CsvWorkbook::new(dir.path());
        let mut source = sample();
        source.0.push(row("someday", "Spain, Launch", "1", "1", "1"));

        let result = run(
            &source,
            &mut workbook,
            "dataset",
            &[PipelineConfig::new(Dimension::Campaign), PipelineConfig::new(Dimension::Country)],
        );
        assert!(matches!(result, Err(PipelineError::MalformedDate { row: 5, .. })));
        assert!(workbook.grid("pivot tables - campaigns data").is_empty());
        assert!(workbook.grid("pivot tables - countries data").is_empty());
    }

    #[test]
    fn off_sheet_layout_aborts_before_any_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut workbook = CsvWorkbook::new(dir.path());
        let mut config = PipelineConfig::new(Dimension::Campaign);
        config.layout.tables[0].values = CellRef::new(1, u32::MAX);

        let result = run(&sample(), &mut workbook, "dataset", &[config]);
        assert!(matches!(
            result,
            Err(PipelineError::Layout(crate::error::LayoutError::InvalidCell(_)))
        ));
        assert!(workbook.grid("pivot tables - campaigns data").is_empty());
    }

    #[test]
    fn rerunning_on_the_same_snapshot_is_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let configs = [PipelineConfig::new(Dimension::Campaign), PipelineConfig::new(Dimension::Country)];

        let mut first = CsvWorkbook::new(dir.path().join("first"));
        run(&sample(), &mut first, "dataset", &configs).expect("first run");
        let mut second = CsvWorkbook::new(dir.path().join("second"));
        run(&sample(), &mut second, "dataset", &configs).expect("second run");

        for sheet in ["pivot tables - campaigns data", "pivot tables - countries data"] {
            assert!(!first.grid(sheet).is_empty());
            assert_eq!(first.grid(sheet), second.grid(sheet));
        }
    }
}
