//! Arrow utilities module
//!
//! Column access and type coercion for Arrow record batches.

pub mod array_utils;

pub use array_utils::{date_column, downcast_array, get_column, string_column, to_string_array};
