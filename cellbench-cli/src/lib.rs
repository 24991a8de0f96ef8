#![warn(missing_docs)]
//! cellbench CLI Library
//!
//! Command-line front end of the cell-metrics pipeline. Use
//! `cellbench::run()` (or `cellbench_cli::run()`) as the body of `main`; the
//! same binary doubles as the worker process of the process strategy.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     cellbench_cli::run()
//! }
//! ```

mod config;
#[allow(missing_docs)]
mod executor;
#[allow(missing_docs)]
mod supervisor;

pub use config::*;
pub use executor::*;
pub use supervisor::*;

use cellbench_core::{CsvSource, WorkerMain};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Output format of reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Terminal tables
    Human,
    /// JSON documents
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{}' (expected human or json)", other)),
        }
    }
}

/// cellbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "cellbench")]
#[command(
    author,
    version,
    about = "cellbench - chunked cell-metrics pipeline with comparable execution strategies"
)]
pub struct Cli {
    /// Subcommand; defaults to Compare
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Measurement CSV (default: config or data/cells.csv)
    #[arg(long, global = true)]
    pub csv: Option<PathBuf>,

    /// Rows per chunk (default: config or 5000)
    #[arg(long, global = true)]
    pub chunksize: Option<usize>,

    /// Output format (default: config or human)
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Thread pool size of the thread strategy
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Worker processes of the process strategy
    #[arg(long, global = true)]
    pub processes: Option<usize>,

    /// Executable spawned as worker process (default: this binary)
    #[arg(long, global = true)]
    pub worker_binary: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by supervisor)
    #[arg(long, hide = true)]
    pub cell_worker: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once under one strategy and report timing, CPU and summary
    Benchmark {
        /// Execution strategy
        #[arg(long, value_enum)]
        mode: ExecutionMode,
    },
    /// Print the first metric rows, computed with the process strategy
    Rows {
        /// Number of rows to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Benchmark every strategy over the same input and check they agree (default)
    Compare,
    /// Print a default cellbench.toml
    Init,
}

/// Everything resolved from cellbench.toml and CLI overrides
#[derive(Debug, Clone)]
struct Settings {
    csv_path: PathBuf,
    chunksize: usize,
    format: OutputFormat,
    execution: ExecutionConfig,
}

impl Settings {
    /// Layer cellbench.toml defaults under CLI overrides
    fn resolve(cli: &Cli, config: &CellConfig) -> Self {
        let format = cli.format.unwrap_or_else(|| {
            config.output.format.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; using human output", e);
                OutputFormat::Human
            })
        });

        Self {
            csv_path: cli
                .csv
                .clone()
                .unwrap_or_else(|| config.data.csv_path.clone()),
            chunksize: cli.chunksize.unwrap_or(config.data.chunksize),
            format,
            execution: ExecutionConfig {
                threads: cli.threads.unwrap_or(config.runner.threads),
                processes: cli.processes.or(config.runner.processes),
                worker_binary: cli
                    .worker_binary
                    .clone()
                    .or_else(|| config.runner.worker_binary.clone()),
            },
        }
    }

    fn source(&self) -> anyhow::Result<CsvSource> {
        Ok(CsvSource::new(&self.csv_path, self.chunksize)?)
    }
}

/// Run the cellbench CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the cellbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Worker mode first; workers never log
    if cli.cell_worker {
        return run_worker_mode();
    }

    init_logging(cli.verbose);

    let config = CellConfig::discover().unwrap_or_default();
    let settings = Settings::resolve(&cli, &config);

    let output = match cli.command {
        Some(Commands::Benchmark { mode }) => run_benchmark(&settings, mode)?,
        Some(Commands::Rows { limit }) => run_rows(&settings, limit)?,
        Some(Commands::Compare) | None => run_compare(&settings)?,
        Some(Commands::Init) => CellConfig::default_toml(),
    };

    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        tracing::info!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "cellbench=debug"
    } else {
        "cellbench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // try_init: a host process may already own the global subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run as a worker process (IPC mode)
fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::new();
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

/// Benchmark one strategy over the configured source
fn benchmark_mode(settings: &Settings, mode: ExecutionMode) -> anyhow::Result<BenchmarkReport> {
    let source = settings.source()?;
    let executor = mode.executor(&settings.execution);

    tracing::info!(
        "Running {} execution over {} (chunksize {})",
        mode,
        source.path().display(),
        source.chunksize()
    );
    let result = benchmark_execution(|| executor.execute(&source))?;
    let report = BenchmarkReport::new(mode, &result);
    tracing::info!(
        "{}: {} rows in {:.3}s ({:.1}% CPU)",
        mode,
        report.rows_processed,
        report.time_seconds,
        report.cpu_percent
    );
    Ok(report)
}

fn run_benchmark(settings: &Settings, mode: ExecutionMode) -> anyhow::Result<String> {
    let report = benchmark_mode(settings, mode)?;
    Ok(match settings.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
        OutputFormat::Human => format_human_output(&report),
    })
}

fn run_rows(settings: &Settings, limit: usize) -> anyhow::Result<String> {
    let source = settings.source()?;
    let output = ExecutionMode::Process
        .executor(&settings.execution)
        .execute(&source)?;
    let records = row_records(&output.rows, limit);
    tracing::debug!("{} of {} rows", records.len(), output.rows.len());

    Ok(match settings.format {
        OutputFormat::Json => serde_json::to_string_pretty(&records)? + "\n",
        OutputFormat::Human => format_rows(&records),
    })
}

fn run_compare(settings: &Settings) -> anyhow::Result<String> {
    let mut results = Vec::with_capacity(ExecutionMode::ALL.len());
    for mode in ExecutionMode::ALL {
        results.push(benchmark_mode(settings, mode)?);
    }

    let report = CompareReport::new(&settings.csv_path, settings.chunksize, results);
    if !report.consistent {
        tracing::warn!("Strategies produced different rows or checksums");
    }

    let output = match settings.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)? + "\n",
        OutputFormat::Human => format_compare_output(&report),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_benchmark_command() {
        let cli = Cli::try_parse_from([
            "cellbench",
            "benchmark",
            "--mode",
            "thread",
            "--chunksize",
            "100",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Benchmark {
                mode: ExecutionMode::Thread
            })
        ));
        assert_eq!(cli.chunksize, Some(100));
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_benchmark_requires_mode() {
        assert!(Cli::try_parse_from(["cellbench", "benchmark"]).is_err());
        assert!(Cli::try_parse_from(["cellbench", "benchmark", "--mode", "gpu"]).is_err());
    }

    #[test]
    fn test_rows_default_limit() {
        let cli = Cli::try_parse_from(["cellbench", "rows"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Rows { limit: 20 })));
    }

    #[test]
    fn test_worker_flag_matches_protocol() {
        let cli = Cli::try_parse_from(["cellbench", cellbench_ipc::WORKER_FLAG]).unwrap();
        assert!(cli.cell_worker);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_settings_layering() {
        let mut config = CellConfig::default();
        config.data.chunksize = 250;
        config.runner.processes = Some(3);
        config.output.format = "json".to_string();

        let cli = Cli::try_parse_from(["cellbench", "--threads", "2", "compare"]).unwrap();
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.chunksize, 250);
        assert_eq!(settings.execution.threads, 2);
        assert_eq!(settings.execution.processes, Some(3));
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.csv_path, PathBuf::from("data/cells.csv"));

        let cli = Cli::try_parse_from(["cellbench", "--chunksize", "7", "--format", "human"])
            .unwrap();
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.chunksize, 7);
        assert_eq!(settings.format, OutputFormat::Human);
    }

    #[test]
    fn test_zero_chunksize_rejected() {
        let cli = Cli::try_parse_from(["cellbench", "--chunksize", "0", "rows"]).unwrap();
        let settings = Settings::resolve(&cli, &CellConfig::default());
        assert!(settings.source().is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
