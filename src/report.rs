use std::fmt::Write;

use crate::models::RenderedTable;
use crate::pipeline::DimensionRun;
use crate::ratio::SentinelLog;

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn write_table(output: &mut String, table: &RenderedTable, sentinels: &SentinelLog) {
    let _ = writeln!(output, "### {}", table.title);
    let _ = writeln!(output);

    if table.rows.is_empty() {
        let _ = writeln!(output, "No rows for this table.");
        let _ = writeln!(output);
        return;
    }

    let mut header = String::from("|  |");
    let mut rule = String::from("|---|");
    for column in &table.columns {
        let _ = write!(header, " {} |", escape(column));
        rule.push_str("---:|");
    }
    let _ = writeln!(output, "{header}");
    let _ = writeln!(output, "{rule}");

    for (row, cells) in table.rows.iter().zip(&table.cells) {
        let _ = write!(output, "| {} |", escape(row));
        for cell in cells {
            let _ = write!(output, " {} |", escape(cell));
        }
        let _ = writeln!(output);
    }
    let _ = writeln!(output);

    if sentinels.count_for(&table.title) > 0 {
        let cells: Vec<String> = sentinels
            .for_table(&table.title)
            .map(|applied| format!("{} {}", applied.row, applied.month))
            .collect();
        let _ = writeln!(output, "_Shown as zero, no defined value: {}_", cells.join("; "));
        let _ = writeln!(output);
    }
}

pub fn build_report(dataset: &str, runs: &[DimensionRun]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Campaign Metrics Report");
    let _ = writeln!(output, "Generated from dataset `{dataset}`");
    let _ = writeln!(output);

    if runs.is_empty() {
        let _ = writeln!(output, "No dimensions were requested.");
        return output;
    }

    for run in runs {
        let summary = &run.summary;
        let months: Vec<String> = summary.months.iter().map(ToString::to_string).collect();

        let _ = writeln!(output, "## By {}", summary.dimension);
        let _ = writeln!(output, "- Destination: {}", summary.destination);
        let _ = writeln!(output, "- Records: {}", summary.records);
        let _ = writeln!(output, "- Distinct values: {}", summary.dimension_values);
        if months.is_empty() {
            let _ = writeln!(output, "- Months: none");
        } else {
            let _ = writeln!(output, "- Months: {}", months.join(", "));
        }
        if run.output.sentinels.is_empty() {
            let _ = writeln!(output, "- Every ratio and change is defined");
        } else {
            let _ = writeln!(
                output,
                "- Cells without a defined ratio or change (shown as zero): {}",
                summary.sentinels_applied
            );
        }
        let _ = writeln!(output);

        for table in &run.output.tables {
            write_table(&mut output, table, &run.output.sentinels);
        }
    }

    output
}
