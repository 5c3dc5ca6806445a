//! Cleaning of biobank prescription extracts stored as Parquet.
//!
//! Resolves sentinel issue dates against participant dates of birth, keeps
//! prescriptions of a drug class by curated name list and formulary code
//! (naming them by generic and brand), and summarises first and last
//! prescription dates per participant.

pub mod aggregate;
pub mod async_io;
pub mod config;
pub mod demographics;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod schema;
pub mod sentinel;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{ColumnNames, PipelineConfig};
pub use error::{Result, RxCleanError, Stage};

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Cleaning stages
pub use aggregate::{DateRangeAccumulator, ParticipantDateSummary};
pub use demographics::{DemographicLookup, LookupNotFound};
pub use filter::{BatchFilter, DrugFilter, DrugMatchRules, DrugNameMap, MatchStats, NameStats};
pub use normalize::{DropReason, NormalizeStats, RecordNormalizer};
pub use sentinel::{DOB_DATES, MISSING_DATES, Resolution};

// Pipelines
pub use pipeline::{InputPaths, RunReport, default_alias, run_filter_pipeline, run_summary_pipeline};
