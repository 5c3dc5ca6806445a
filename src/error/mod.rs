//! Error handling for the prescription cleaning pipeline.
//!
//! Only batch- and file-level failures are errors. Record-level problems
//! (unparseable dates, participants without a unique date of birth) are
//! recovered by the normalizer and surface as [`crate::normalize::DropReason`]
//! counts instead.

pub mod util;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Pipeline stage in which a fatal error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadPatterns,
    LoadDemographics,
    LoadPrescriptions,
    Normalize,
    Match,
    Aggregate,
    Write,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadPatterns => "load patterns",
            Self::LoadDemographics => "load demographics",
            Self::LoadPrescriptions => "load prescriptions",
            Self::Normalize => "normalize",
            Self::Match => "match",
            Self::Aggregate => "aggregate",
            Self::Write => "write",
            Self::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Specialized error type for the cleaning pipeline
#[derive(Debug, thiserror::Error)]
pub enum RxCleanError {
    /// Error opening, reading or writing a file
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error from an Arrow compute kernel or batch construction
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Expected column absent or of an unsupported type
    #[error("Schema error: {0}")]
    Schema(String),

    /// Curated term list produced an invalid pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// A fatal error annotated with the stage and file it came from
    #[error("{stage} failed for {}: {source}", path.display())]
    Stage {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: Box<RxCleanError>,
    },
}

impl RxCleanError {
    /// IO error bound to the path that caused it
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Column missing from a batch
    pub fn column_not_found(column: &str) -> Self {
        Self::Schema(format!("Column '{column}' not found"))
    }

    /// Column present but not of a usable type
    pub fn column_type(column: &str, expected: &str, actual: &arrow::datatypes::DataType) -> Self {
        Self::Schema(format!(
            "Column '{column}' has type {actual:?}, expected {expected}"
        ))
    }

    /// Wrap this error with the stage and file that produced it
    #[must_use]
    pub fn in_stage(self, stage: Stage, path: impl AsRef<Path>) -> Self {
        match self {
            // Keep the innermost, most specific annotation
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                path: path.as_ref().to_path_buf(),
                source: Box::new(other),
            },
        }
    }

    /// Stage that failed, if the error has been annotated
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Extension trait for attaching stage context to results
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(self, stage: Stage, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| e.in_stage(stage, path))
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, RxCleanError>;
