use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

mod aggregate;
mod config;
mod delta;
mod error;
mod format;
mod layout;
mod models;
mod normalize;
mod pipeline;
mod ratio;
mod report;
mod sheets;

use aggregate::RowOrder;
use config::Settings;
use layout::Layout;
use models::Dimension;
use pipeline::PipelineConfig;
use sheets::{CsvRowSource, CsvWorkbook};

#[derive(Parser)]
#[command(name = "campaign-metrics")]
#[command(about = "Monthly ad campaign metrics, pivoted by campaign and country", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DimensionArg {
    Campaign,
    Country,
    All,
}

impl DimensionArg {
    fn dimensions(self) -> Vec<Dimension> {
        match self {
            DimensionArg::Campaign => vec![Dimension::Campaign],
            DimensionArg::Country => vec![Dimension::Country],
            DimensionArg::All => vec![Dimension::Campaign, Dimension::Country],
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RowOrderArg {
    FirstSeen,
    Sorted,
}

impl From<RowOrderArg> for RowOrder {
    fn from(value: RowOrderArg) -> Self {
        match value {
            RowOrderArg::FirstSeen => RowOrder::FirstSeen,
            RowOrderArg::Sorted => RowOrder::Sorted,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build every metric table and write it to the destination sheets
    Run {
        #[arg(long, value_enum, default_value = "all")]
        dimension: DimensionArg,
        /// Source table name; defaults to METRICS_DATASET
        #[arg(long)]
        dataset: Option<String>,
        /// Directory holding `<dataset>.csv`; defaults to METRICS_SOURCE_DIR
        #[arg(long)]
        source_dir: Option<PathBuf>,
        /// Directory holding the destination sheets; defaults to METRICS_OUTPUT_DIR
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// JSON layout replacing the default one (single dimension only)
        #[arg(long)]
        layout: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "first-seen")]
        row_order: RowOrderArg,
        /// Also write a markdown report of every table
        #[arg(long)]
        report: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        summary_json: bool,
    },
    /// Print the default table layout as JSON
    Layout {
        #[arg(long, value_enum, default_value = "campaign")]
        dimension: DimensionArg,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("campaign_metrics=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    init_logging(settings.json_logs);

    match cli.command {
        Commands::Run {
            dimension,
            dataset,
            source_dir,
            out_dir,
            layout,
            row_order,
            report,
            summary_json,
        } => {
            let settings = settings.with_overrides(source_dir, out_dir, dataset);
            let dimensions = dimension.dimensions();
            if layout.is_some() && dimensions.len() > 1 {
                anyhow::bail!("--layout needs a single --dimension");
            }

            let mut configs = Vec::with_capacity(dimensions.len());
            for dimension in dimensions {
                let mut config = PipelineConfig::new(dimension);
                config.row_order = row_order.into();
                if let Some(path) = &layout {
                    config.layout = Layout::from_file(path)
                        .with_context(|| format!("failed to load layout {}", path.display()))?;
                }
                configs.push(config);
            }

            let source = CsvRowSource::new(&settings.source_dir);
            let mut workbook = CsvWorkbook::new(&settings.output_dir);
            let runs = pipeline::run(&source, &mut workbook, &settings.dataset, &configs)
                .with_context(|| format!("pipeline failed for dataset `{}`", settings.dataset))?;
            let saved = workbook.save()?;

            if let Some(path) = report {
                std::fs::write(&path, report::build_report(&settings.dataset, &runs))
                    .with_context(|| format!("failed to write report {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }

            if summary_json {
                let summaries: Vec<&pipeline::RunSummary> = runs.iter().map(|run| &run.summary).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for run in &runs {
                    println!(
                        "- {}: {} tables for {} values across {} months ({} zero-sentinel cells)",
                        run.summary.dimension,
                        run.summary.tables_written,
                        run.summary.dimension_values,
                        run.summary.months.len(),
                        run.summary.sentinels_applied
                    );
                }
                for path in saved {
                    println!("Sheet written to {}.", path.display());
                }
            }
        }
        Commands::Layout { dimension } => {
            let dimension = match dimension {
                DimensionArg::Country => Dimension::Country,
                DimensionArg::Campaign => Dimension::Campaign,
                DimensionArg::All => anyhow::bail!("layout is printed for one dimension at a time"),
            };
            println!("{}", Layout::default_for(dimension).to_json()?);
        }
    }

    Ok(())
}
