//! Log messages for file access and pipeline stages
//!
//! File reads and writes log a start line at debug level and a completion
//! line with counts at info level. Stage lines carry the [`Stage`] name so a
//! run's log reads as the sequence of stages it went through.

use std::path::Path;
use std::time::Duration;

use crate::error::Stage;

/// What was done to a file or directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
    Scan,
}

impl FileAction {
    fn present(self) -> &'static str {
        match self {
            Self::Read => "Reading",
            Self::Write => "Writing",
            Self::Scan => "Scanning",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Write => "Wrote",
            Self::Scan => "Found",
        }
    }

    fn preposition(self) -> &'static str {
        match self {
            Self::Read => "from",
            Self::Write => "to",
            Self::Scan => "in",
        }
    }
}

/// Log the start of a file operation
pub fn log_file_start(action: FileAction, path: &Path) {
    log::debug!("{} {}", action.present(), path.display());
}

/// Log a completed file operation
///
/// `unit` names what `count` counts, e.g. `"batches"` or `"rows"`.
pub fn log_file_complete(
    action: FileAction,
    path: &Path,
    count: usize,
    unit: &str,
    elapsed: Option<Duration>,
) {
    match elapsed {
        Some(duration) => log::info!(
            "{} {count} {unit} {} {} in {duration:.2?}",
            action.past(),
            action.preposition(),
            path.display()
        ),
        None => log::info!(
            "{} {count} {unit} {} {}",
            action.past(),
            action.preposition(),
            path.display()
        ),
    }
}

/// Log that a pipeline stage has finished
pub fn log_stage_complete(stage: Stage, detail: &str, elapsed: Duration) {
    log::info!("[{stage}] {detail} ({elapsed:.2?})");
}

/// Log a recoverable problem, optionally tied to a file
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message}: {}", path.display()),
        None => log::warn!("{message}"),
    }
}
