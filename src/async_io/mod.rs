//! Async Parquet file loading utilities

pub mod batch_ops;
pub mod file_ops;
pub mod parallel_ops;

pub use batch_ops::read_parquet_async;
pub use file_ops::{find_parquet_files_async, open_parquet_file_async, resolve_input_files_async};
pub use parallel_ops::{SourceBatch, load_parquet_files_parallel_async};
