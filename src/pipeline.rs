//! Pipeline driver
//!
//! Both pipelines share the same front half: load the demographic and
//! prescription extracts concurrently, build the date-of-birth lookup and
//! normalize every prescription batch. Pipeline A then keeps the drug class of
//! interest and publishes it under a stable alias; pipeline B reduces the
//! normalized stream to one first/last date row per participant.
//!
//! CPU-bound stages run on a dedicated rayon pool inside `spawn_blocking`.
//! Any failed batch aborts the run before anything is written, and an output
//! whose alias cannot be published is removed again.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::{DateRangeAccumulator, summaries_to_record_batch};
use crate::async_io::{SourceBatch, load_parquet_files_parallel_async};
use crate::config::PipelineConfig;
use crate::demographics::DemographicLookup;
use crate::error::{Result, RxCleanError, Stage, StageContext};
use crate::filter::{BatchFilter, DrugFilter, DrugMatchRules, DrugNameMap, MatchStats, non_empty};
use crate::normalize::{NormalizeStats, RecordNormalizer};
use crate::schema;
use crate::utils::io::{check_alias_path, publish_alias, write_parquet_atomic};
use crate::utils::logging::{
    create_batch_progress_bar, create_spinner, finish_progress_bar, log_stage_complete,
};

/// Locations of the two input extracts
#[derive(Debug, Clone)]
pub struct InputPaths {
    /// Parquet file or directory with participant dates of birth
    pub demographics: PathBuf,
    /// Parquet file or directory with prescription records
    pub prescriptions: PathBuf,
}

/// Which pipeline produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Filter,
    Summarise,
}

/// Statistics and outputs of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: PipelineKind,
    pub demographic_participants: usize,
    pub ambiguous_participants: usize,
    pub normalize: NormalizeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarised_participants: Option<usize>,
    pub rows_written: usize,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<PathBuf>,
    pub elapsed_secs: f64,
}

impl RunReport {
    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RxCleanError::config(format!("Failed to serialize run report: {e}")))?;
        std::fs::write(path, json).map_err(|e| RxCleanError::io(path, e))
    }

    fn log_summary(&self) {
        let n = &self.normalize;
        log::info!(
            "Normalized {} of {} records ({} dropped: {} missing participant, {} unparseable date, {} without date of birth, {} missing sentinel; {} dates of birth substituted)",
            n.rows_out,
            n.rows_in,
            n.dropped(),
            n.missing_participant,
            n.unparseable_date,
            n.lookup_not_found,
            n.missing_sentinel,
            n.dob_substituted
        );
        if let Some(m) = &self.matched {
            log::info!(
                "Matched {} of {} records ({} by name, {} by code only, {} code matches excluded)",
                m.rows_out,
                m.rows_in,
                m.matched_by_name,
                m.matched_by_code_only,
                m.excluded_code_matches
            );
            log::info!(
                "Named {} kept records from the generic name, {} from a brand name; {} unnamed",
                m.names.generic_from_name,
                m.names.generic_from_brand,
                m.names.unnamed
            );
        }
        if let Some(participants) = self.summarised_participants {
            log::info!("Summarised {participants} participants");
        }
    }
}

/// Counters from the shared front half of both pipelines
#[derive(Debug, Clone, Copy)]
pub struct NormalizeSummary {
    pub demographic_participants: usize,
    pub ambiguous_participants: usize,
    pub stats: NormalizeStats,
}

/// Normalized batches with their counters
#[derive(Debug)]
pub struct Normalized {
    pub summary: NormalizeSummary,
    pub batches: Vec<SourceBatch>,
}

/// Run a filter over every batch in parallel, keeping each batch's source
///
/// Errors are annotated with `stage` and the batch's file.
pub fn apply_filter<F: BatchFilter>(
    filter: &F,
    batches: Vec<SourceBatch>,
    stage: Stage,
    pb: &ProgressBar,
) -> Result<(Vec<SourceBatch>, F::Stats)> {
    let results = batches
        .into_par_iter()
        .map(|source| {
            let (batch, stats) = filter
                .filter(&source.batch)
                .in_stage(stage, source.path.as_path())?;
            pb.inc(1);
            Ok((
                SourceBatch {
                    path: source.path,
                    batch,
                },
                stats,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut total = F::Stats::default();
    let mut kept = Vec::with_capacity(results.len());
    for (source, stats) in results {
        total += stats;
        kept.push(source);
    }
    Ok((kept, total))
}

/// Build the lookup and normalize all prescription batches
pub fn normalize_sources(
    config: &PipelineConfig,
    inputs: &InputPaths,
    demographics: &[SourceBatch],
    prescriptions: Vec<SourceBatch>,
) -> Result<Normalized> {
    let lookup = DemographicLookup::from_batches(
        demographics.iter().map(|s| &s.batch),
        &config.columns,
    )
    .in_stage(Stage::LoadDemographics, &inputs.demographics)?;

    let start = Instant::now();
    let normalizer = RecordNormalizer::new(&lookup, config.columns.clone());
    let pb = create_batch_progress_bar(
        prescriptions.len() as u64,
        "Normalizing",
        config.show_progress,
    );
    let (batches, stats) = apply_filter(&normalizer, prescriptions, Stage::Normalize, &pb)?;
    finish_progress_bar(&pb, "Normalized");
    log_stage_complete(
        Stage::Normalize,
        &format!("{} of {} records kept", stats.rows_out, stats.rows_in),
        start.elapsed(),
    );

    Ok(Normalized {
        summary: NormalizeSummary {
            demographic_participants: lookup.len(),
            ambiguous_participants: lookup.ambiguous_count(),
            stats,
        },
        batches,
    })
}

/// Keep the drug class of interest from normalized batches and name it
pub fn match_sources(
    config: &PipelineConfig,
    rules: DrugMatchRules,
    names: DrugNameMap,
    normalized: Vec<SourceBatch>,
) -> Result<(Vec<RecordBatch>, MatchStats)> {
    let start = Instant::now();
    log::info!("Matching drug names and code prefix {}", rules.code_prefix());
    if names.is_empty() {
        log::warn!("No generic drug names configured; matched records stay unnamed");
    }
    let filter = DrugFilter::new(rules, names);
    let pb = create_batch_progress_bar(normalized.len() as u64, "Matching", config.show_progress);
    let (matched, stats) = apply_filter(&filter, normalized, Stage::Match, &pb)?;
    finish_progress_bar(&pb, "Matched");
    log_stage_complete(
        Stage::Match,
        &format!("{} of {} records kept", stats.rows_out, stats.rows_in),
        start.elapsed(),
    );

    Ok((non_empty(matched.into_iter().map(|s| s.batch).collect()), stats))
}

/// Reduce normalized batches to per-participant date ranges
pub fn summarise_sources(
    config: &PipelineConfig,
    normalized: &[SourceBatch],
) -> Result<DateRangeAccumulator> {
    let start = Instant::now();
    let pb = create_batch_progress_bar(normalized.len() as u64, "Summarising", config.show_progress);
    let acc = normalized
        .par_iter()
        .map(|source| {
            let partial = DateRangeAccumulator::from_batch(&source.batch)
                .in_stage(Stage::Aggregate, source.path.as_path());
            pb.inc(1);
            partial
        })
        .try_reduce(DateRangeAccumulator::new, |a, b| Ok(a.merge(b)))?;
    finish_progress_bar(&pb, "Summarised");
    log_stage_complete(
        Stage::Aggregate,
        &format!("{} participants", acc.len()),
        start.elapsed(),
    );
    Ok(acc)
}

fn thread_pool(config: &PipelineConfig) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| RxCleanError::Task(format!("Failed to build worker pool: {e}")))
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| RxCleanError::Task(format!("Task join error: {e}")))?
}

/// Load both extracts concurrently
pub async fn load_inputs(
    config: &PipelineConfig,
    inputs: &InputPaths,
) -> Result<(Vec<SourceBatch>, Vec<SourceBatch>)> {
    let batch_size = config.effective_batch_size();
    let demographic_columns = config.columns.demographic_columns();
    let prescription_columns = config.columns.prescription_columns();

    let spinner = create_spinner("Loading extracts", config.show_progress);
    let loaded = tokio::try_join!(
        load_parquet_files_parallel_async(
            &inputs.demographics,
            &demographic_columns,
            batch_size,
            Stage::LoadDemographics,
        ),
        load_parquet_files_parallel_async(
            &inputs.prescriptions,
            &prescription_columns,
            batch_size,
            Stage::LoadPrescriptions,
        ),
    )?;
    finish_progress_bar(&spinner, "Loaded extracts");
    Ok(loaded)
}

/// Default stable alias for an output path
///
/// A trailing run suffix of digits, `-` and `_` after the last `_` is dropped
/// from the file stem (`statins_2024-10-17.parquet` gives `statins.parquet`).
/// Without such a suffix `_latest` is appended instead, so the alias never
/// coincides with the output.
#[must_use]
pub fn default_alias(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = match stem.rsplit_once('_') {
        Some((base, run))
            if !base.is_empty()
                && run.starts_with(|c: char| c.is_ascii_digit())
                && run.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '_') =>
        {
            base.to_string()
        }
        _ => format!("{stem}_latest"),
    };

    let mut alias = output.with_file_name(base);
    if let Some(ext) = output.extension() {
        alias.set_extension(ext);
    }
    alias
}

fn check_alias(output: &Path, alias: &Path) -> Result<()> {
    if alias == output {
        return Err(RxCleanError::config(format!(
            "Alias {} must differ from the output path",
            alias.display()
        )));
    }
    check_alias_path(alias)
}

/// Pipeline A: filter prescriptions to the drug class of interest
///
/// The output is written atomically to `output` and `alias` is then pointed
/// at it. An alias path that cannot be replaced fails the run before any
/// input is read; if publishing fails after the write, the output is removed.
pub async fn run_filter_pipeline(
    config: &PipelineConfig,
    inputs: &InputPaths,
    output: &Path,
    alias: &Path,
) -> Result<RunReport> {
    let start = Instant::now();
    config.validate()?;
    check_alias(output, alias).in_stage(Stage::Publish, alias)?;

    let pattern_dir = config.pattern_dir.clone().unwrap_or_default();
    let rules = DrugMatchRules::from_config(config).in_stage(Stage::LoadPatterns, &pattern_dir)?;
    let names = DrugNameMap::new(&config.drug_names)?;

    let (demographics, prescriptions) = load_inputs(config, inputs).await?;

    let pool = thread_pool(config)?;
    let (normalized, matched, match_stats) = {
        let config = config.clone();
        let inputs = inputs.clone();
        blocking(move || {
            pool.install(|| {
                let Normalized { summary, batches } =
                    normalize_sources(&config, &inputs, &demographics, prescriptions)?;
                let (matched, stats) = match_sources(&config, rules, names, batches)?;
                Ok((summary, matched, stats))
            })
        })
        .await?
    };

    let rows_written = {
        let output = output.to_path_buf();
        blocking(move || {
            write_parquet_atomic(&output, schema::matched_schema(), &matched)
                .in_stage(Stage::Write, &output)
        })
        .await?
    };

    let publish_start = Instant::now();
    if let Err(e) = publish_alias(output, alias) {
        if let Err(cleanup) = std::fs::remove_file(output) {
            log::warn!("Failed to remove unpublished output {}: {cleanup}", output.display());
        }
        return Err(e.in_stage(Stage::Publish, alias));
    }
    log_stage_complete(
        Stage::Publish,
        &format!("{} -> {}", alias.display(), output.display()),
        publish_start.elapsed(),
    );

    let report = RunReport {
        pipeline: PipelineKind::Filter,
        demographic_participants: normalized.demographic_participants,
        ambiguous_participants: normalized.ambiguous_participants,
        normalize: normalized.stats,
        matched: Some(match_stats),
        summarised_participants: None,
        rows_written,
        output: output.to_path_buf(),
        alias: Some(alias.to_path_buf()),
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    report.log_summary();
    Ok(report)
}

/// Pipeline B: first and last prescription date per participant
pub async fn run_summary_pipeline(
    config: &PipelineConfig,
    inputs: &InputPaths,
    output: &Path,
) -> Result<RunReport> {
    let start = Instant::now();
    config.validate()?;

    let (demographics, prescriptions) = load_inputs(config, inputs).await?;

    let pool = thread_pool(config)?;
    let (normalized, summary) = {
        let config = config.clone();
        let inputs = inputs.clone();
        blocking(move || {
            pool.install(|| {
                let Normalized { summary, batches } =
                    normalize_sources(&config, &inputs, &demographics, prescriptions)?;
                let summaries = summarise_sources(&config, &batches)?
                    .into_summaries()
                    .and_then(|s| summaries_to_record_batch(&s))
                    .in_stage(Stage::Aggregate, &inputs.prescriptions)?;
                Ok((summary, summaries))
            })
        })
        .await?
    };

    let participants = summary.num_rows();
    let rows_written = {
        let output = output.to_path_buf();
        blocking(move || {
            write_parquet_atomic(&output, schema::summary_schema(), &[summary])
                .in_stage(Stage::Write, &output)
        })
        .await?
    };

    let report = RunReport {
        pipeline: PipelineKind::Summarise,
        demographic_participants: normalized.demographic_participants,
        ambiguous_participants: normalized.ambiguous_participants,
        normalize: normalized.stats,
        matched: None,
        summarised_participants: Some(participants),
        rows_written,
        output: output.to_path_buf(),
        alias: None,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    report.log_summary();
    Ok(report)
}
