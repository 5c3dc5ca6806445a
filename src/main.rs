use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use rx_clean::config::PipelineConfig;
use rx_clean::pipeline::{
    InputPaths, RunReport, default_alias, run_filter_pipeline, run_summary_pipeline,
};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Parser)]
#[command(
    name = "rx-clean",
    version,
    about = "Clean biobank prescription extracts stored as Parquet"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file; absent fields take their defaults
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Worker threads for batch processing
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Rows per record batch when reading Parquet
    #[arg(long = "batch-size", global = true)]
    batch_size: Option<usize>,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Keep prescriptions of the drug class of interest
    Filter(FilterArgs),
    /// First and last prescription date per participant
    Summarise(SummariseArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Demographic Parquet file or directory
    #[arg(long, value_name = "PATH")]
    demographics: PathBuf,

    /// Prescription Parquet file or directory
    #[arg(long, value_name = "PATH")]
    prescriptions: PathBuf,

    /// Write run statistics as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct FilterArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Directory of curated drug-name term lists
    #[arg(long = "patterns", value_name = "DIR")]
    pattern_dir: Option<PathBuf>,

    /// Formulary code prefix of the drug class
    #[arg(long = "code-prefix")]
    code_prefix: Option<String>,

    /// Output Parquet file
    #[arg(long, short, value_name = "PATH")]
    output: PathBuf,

    /// Stable path to point at the output [default: output path without its
    /// run suffix, e.g. statins_2024-10-17.parquet -> statins.parquet]
    #[arg(long, value_name = "PATH")]
    alias: Option<PathBuf>,
}

#[derive(Args)]
struct SummariseArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Output Parquet file
    #[arg(long, short, value_name = "PATH")]
    output: PathBuf,
}

impl InputArgs {
    fn paths(&self) -> InputPaths {
        InputPaths {
            demographics: self.demographics.clone(),
            prescriptions: self.prescriptions.clone(),
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if cli.quiet {
        config.show_progress = false;
    }
    if let Command::Filter(args) = &cli.command {
        if let Some(dir) = &args.pattern_dir {
            config.pattern_dir = Some(dir.clone());
        }
        if let Some(prefix) = &args.code_prefix {
            config.code_prefix = prefix.clone();
        }
    }

    config.validate()?;
    Ok(config)
}

fn write_report(report: &RunReport, path: Option<&PathBuf>) -> anyhow::Result<()> {
    if let Some(path) = path {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write run report {}", path.display()))?;
        info!("Run report written to {}", path.display());
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Filter(args) => {
            let alias = args
                .alias
                .clone()
                .unwrap_or_else(|| default_alias(&args.output));
            let report = run_filter_pipeline(&config, &args.inputs.paths(), &args.output, &alias)
                .await
                .context("Filter pipeline failed")?;
            write_report(&report, args.inputs.report.as_ref())?;
        }
        Command::Summarise(args) => {
            let report = run_summary_pipeline(&config, &args.inputs.paths(), &args.output)
                .await
                .context("Summary pipeline failed")?;
            write_report(&report, args.inputs.report.as_ref())?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
