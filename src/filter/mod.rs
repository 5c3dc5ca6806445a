//! Row filters over prescription record batches
//!
//! [`core`] holds the mask plumbing and the [`BatchFilter`] trait shared by
//! the record normalizer and the drug matcher in [`drug`]. [`names`] gives
//! matched records their standardised generic and brand names.

pub mod core;
pub mod drug;
pub mod names;

pub use self::core::{BatchFilter, filter_arrays, filter_columns, filter_record_batch, non_empty};
pub use self::drug::{DrugFilter, DrugMatchRules, MatchStats, clean_bnf_code, strip_read_2_suffix};
pub use self::names::{DrugNameMap, NameStats, StandardNames};
