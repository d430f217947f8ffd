//! Flux CLI - Command-line interface for Mobility Flux
//!
//! Commands:
//! - run: Cluster country-periods and write the result sheet
//! - span: Print the date span covered by a mobility report
//! - buckets: Print the biweekly bucket dictionary for a range

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mobility_flux::config::ConfigOverrides;
use mobility_flux::reader::{available_span, read_mobility_file, read_stringency_file};
use mobility_flux::writer::write_sheet;
use mobility_flux::{
    resolve_range, ComputeError, DateRange, FluxConfig, HdbscanClusterer, MobilityPipeline,
    MobilityRecord, PeriodMapper, FLUX_VERSION, PRODUCER_NAME,
};

/// Environment variable holding the log filter
const LOG_ENV: &str = "FLUX_LOG";

/// Flux - Cluster countries by mobility response to government stringency
#[derive(Parser)]
#[command(name = "flux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Relate community mobility to stringency in biweekly periods", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the result sheet
    Run {
        /// Mobility report (CSV)
        #[arg(long)]
        mobility: PathBuf,

        /// Stringency report (CSV or .xlsx workbook, one column per date)
        #[arg(long)]
        stringency: PathBuf,

        /// First date of the range (YYYY-MM-DD); defaults to the first available date
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last date of the range (YYYY-MM-DD); defaults to the last available date
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory the result sheet is written to
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Minimum cluster size for HDBSCAN
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Keep only national rows of the mobility report
        #[arg(long)]
        national_only: bool,
    },

    /// Print the first and last date of a mobility report
    Span {
        /// Mobility report (CSV)
        #[arg(long)]
        mobility: PathBuf,
    },

    /// Print the week-year to bucket dictionary for a range
    Buckets {
        /// Mobility report (CSV)
        #[arg(long)]
        mobility: PathBuf,

        #[arg(long)]
        from: Option<NaiveDate>,

        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Run {
            mobility,
            stringency,
            from,
            to,
            config,
            output_dir,
            min_cluster_size,
            national_only,
        } => {
            let overrides = ConfigOverrides {
                output_dir,
                min_cluster_size,
                national_only: national_only.then_some(true),
            };
            cmd_run(&mobility, &stringency, from, to, config.as_deref(), &overrides)
        }

        Commands::Span { mobility } => cmd_span(&mobility),

        Commands::Buckets {
            mobility,
            from,
            to,
            json,
        } => cmd_buckets(&mobility, from, to, json),
    }
}

fn cmd_run(
    mobility: &Path,
    stringency: &Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    config: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(), FluxCliError> {
    let config = FluxConfig::load(config, overrides)?;

    let records = read_mobility_file(mobility)?;
    let range = range_for(&records, from, to)?;
    let table = read_stringency_file(stringency)?;

    let pipeline = MobilityPipeline::new(&config);
    let clusterer = HdbscanClusterer::from_config(&config.clustering);
    let outcome = pipeline.run(records, &table, range, &clusterer)?;

    if let Some(notice) = outcome.notice {
        // Empty result: report and exit cleanly without writing a sheet
        println!("{notice}");
        return Ok(());
    }

    let path = write_sheet(&outcome.rows, &config.output)?;
    info!(
        producer = PRODUCER_NAME,
        run_id = %outcome.run_id,
        rows = outcome.rows.len(),
        "run finished"
    );
    println!("{}", path.display());
    Ok(())
}

fn cmd_span(mobility: &Path) -> Result<(), FluxCliError> {
    let records = read_mobility_file(mobility)?;
    let span = available_span(&records)?.ok_or(FluxCliError::NoRecords)?;
    println!("{} {}", span.from, span.to);
    Ok(())
}

fn cmd_buckets(
    mobility: &Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<(), FluxCliError> {
    let records = read_mobility_file(mobility)?;
    let range = range_for(&records, from, to)?;
    let mapping = PeriodMapper::map(&records, range)?;

    if json {
        println!("{}", mapping.context.bucket_labels_json()?);
    } else {
        println!("Buckets for {range}");
        for (week, bucket) in mapping.context.bucket_labels() {
            println!("  {week}  {bucket}");
        }
    }
    Ok(())
}

fn range_for(
    records: &[MobilityRecord],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DateRange, FluxCliError> {
    let span = available_span(records)?.ok_or(FluxCliError::NoRecords)?;
    Ok(resolve_range(span, from, to)?)
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Compute(ComputeError),
    NoRecords,
}

impl From<ComputeError> for FluxCliError {
    fn from(e: ComputeError) -> Self {
        FluxCliError::Compute(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::DateFormatError(_) => {
                        ("DATE_FORMAT_ERROR", "Dates must be YYYY-MM-DD or DDMonYYYY")
                    }
                    ComputeError::ColumnFormatError(_) | ComputeError::SchemaError(_) => {
                        ("SCHEMA_ERROR", "Check the report headers")
                    }
                    ComputeError::EmptyRangeError { .. } => {
                        ("EMPTY_RANGE", "Run 'flux span' to see the available dates")
                    }
                    ComputeError::ParseError(_) | ComputeError::Csv(_) => {
                        ("PARSE_ERROR", "Check input format")
                    }
                    ComputeError::ClusteringError(_) => {
                        ("CLUSTERING_ERROR", "Try a smaller --min-cluster-size")
                    }
                    ComputeError::WorkbookError(_) => {
                        ("WORKBOOK_ERROR", "Check that the file is a valid spreadsheet")
                    }
                    ComputeError::ConfigError(_) => ("CONFIG_ERROR", "Check the config file"),
                    ComputeError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FluxCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No rows found in the mobility report".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
        }
    }
}
