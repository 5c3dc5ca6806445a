//! Logging utilities for output and progress tracking

pub mod log;
pub mod progress;

pub use self::log::{FileAction, log_file_complete, log_file_start, log_stage_complete, log_warning};
pub use self::progress::{create_batch_progress_bar, create_spinner, finish_progress_bar};
