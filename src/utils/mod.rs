//! Utility functions for Arrow columns, Parquet files and logging

pub mod arrow;
pub mod io;
pub mod logging;

pub use self::io::read_parquet;
