//! IO utilities for Parquet input and atomic output

pub mod parquet;
pub mod writer;

pub use self::parquet::{create_projection, read_parquet};
pub use self::writer::{check_alias_path, publish_alias, write_parquet_atomic};
