//! Drug-of-interest matching over normalized prescription batches
//!
//! A record is kept when
//!
//! ```text
//! name_match OR (code_match AND NOT excluded)
//! ```
//!
//! The exclusion pattern only suppresses code-prefix matches. A record whose
//! drug name is on the curated list is kept even if its name also matches an
//! exclusion term. Nulls follow three-valued logic and rows whose result is
//! null are dropped, so a null drug name with a matching code is not kept.
//!
//! Kept records have one trailing `"00"` removed from `read_2` and are given
//! standardised generic and brand names by a [`DrugNameMap`].

use std::ops::AddAssign;

use arrow::array::{Array, ArrayRef, BooleanArray, StringArray};
use arrow::compute::kernels::boolean::{and_kleene, not, or_kleene};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use regex::Regex;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Result, RxCleanError};
use crate::filter::core::{BatchFilter, array_ref, filter_arrays};
use crate::filter::names::{DrugNameMap, NameStats};
use crate::patterns::{exclusion_pattern, name_pattern};
use crate::schema::{self, BNF_CODE, DRUG_NAME, ISSUE_DATE, PARTICIPANT_ID, READ_2, TEXT_COLUMNS};
use crate::utils::arrow::{date_column, downcast_array, string_column};

/// Inclusion and exclusion rules for one drug class
#[derive(Debug, Clone)]
pub struct DrugMatchRules {
    name_pattern: Regex,
    code_prefix: String,
    exclusion: Regex,
}

impl DrugMatchRules {
    pub fn new(name_pattern: Regex, code_prefix: impl Into<String>, exclusion: Regex) -> Result<Self> {
        let code_prefix = code_prefix.into();
        if code_prefix.is_empty() || code_prefix.contains('.') {
            return Err(RxCleanError::config(format!(
                "Invalid code prefix '{code_prefix}'"
            )));
        }
        Ok(Self {
            name_pattern,
            code_prefix,
            exclusion,
        })
    }

    /// Build the rules from the curated term directory and configured terms
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let dir = config.pattern_dir.as_deref().ok_or_else(|| {
            RxCleanError::config("A curated pattern directory is required for drug matching")
        })?;
        Self::new(
            name_pattern(dir)?,
            config.code_prefix.clone(),
            exclusion_pattern(&config.exclusion_terms)?,
        )
    }

    #[must_use]
    pub fn code_prefix(&self) -> &str {
        &self.code_prefix
    }

    fn name_matches(&self, drug_name: &str) -> bool {
        self.name_pattern.is_match(&drug_name.to_lowercase())
    }

    fn is_excluded(&self, drug_name: &str) -> bool {
        self.exclusion.is_match(drug_name)
    }

    fn code_matches(&self, clean_code: &str) -> bool {
        clean_code.starts_with(&self.code_prefix)
    }
}

/// Formulary code with every `.` removed
#[must_use]
pub fn clean_bnf_code(code: &str) -> String {
    code.replace('.', "")
}

/// Clinical code with one trailing `"00"` removed
#[must_use]
pub fn strip_read_2_suffix(code: &str) -> &str {
    code.strip_suffix("00").unwrap_or(code)
}

/// Counters for the drug matcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub rows_in: usize,
    /// Kept through the curated name list
    pub matched_by_name: usize,
    /// Kept through the code prefix alone
    pub matched_by_code_only: usize,
    /// Code-prefix matches suppressed by an exclusion term
    pub excluded_code_matches: usize,
    pub rows_out: usize,
    /// How kept records were named
    pub names: NameStats,
}

impl AddAssign for MatchStats {
    fn add_assign(&mut self, other: Self) {
        self.rows_in += other.rows_in;
        self.matched_by_name += other.matched_by_name;
        self.matched_by_code_only += other.matched_by_code_only;
        self.excluded_code_matches += other.excluded_code_matches;
        self.rows_out += other.rows_out;
        self.names += other.names;
    }
}

/// Keeps records of the configured drug class
#[derive(Debug, Clone)]
pub struct DrugFilter {
    rules: DrugMatchRules,
    names: DrugNameMap,
}

impl DrugFilter {
    #[must_use]
    pub fn new(rules: DrugMatchRules, names: DrugNameMap) -> Self {
        Self { rules, names }
    }

    /// Per-row match result under three-valued logic
    fn match_mask(
        &self,
        drug_names: &StringArray,
        clean_codes: &StringArray,
    ) -> Result<(BooleanArray, MatchStats)> {
        let name_match: BooleanArray = drug_names
            .iter()
            .map(|v| v.map(|s| self.rules.name_matches(s)))
            .collect();
        let excluded: BooleanArray = drug_names
            .iter()
            .map(|v| v.map(|s| self.rules.is_excluded(s)))
            .collect();
        let code_match: BooleanArray = clean_codes
            .iter()
            .map(|v| v.map(|s| self.rules.code_matches(s)))
            .collect();

        let code_branch = and_kleene(&code_match, &not(&excluded)?)?;
        let mask = or_kleene(&name_match, &code_branch)?;

        let is_true = |a: &BooleanArray, i: usize| a.is_valid(i) && a.value(i);
        let mut stats = MatchStats {
            rows_in: mask.len(),
            ..Default::default()
        };
        for i in 0..mask.len() {
            if is_true(&name_match, i) {
                stats.matched_by_name += 1;
            } else if is_true(&code_branch, i) {
                stats.matched_by_code_only += 1;
            } else if is_true(&code_match, i) && is_true(&excluded, i) {
                stats.excluded_code_matches += 1;
            }
        }
        stats.rows_out = mask.true_count();

        Ok((mask, stats))
    }

    /// Match one normalized batch
    pub fn apply(&self, batch: &RecordBatch) -> Result<(RecordBatch, MatchStats)> {
        let normalized = schema::normalized_schema();
        let required: Vec<&str> = normalized.fields().iter().map(|f| f.name().as_str()).collect();
        schema::require_columns(batch, &required)?;

        let participant_ids = string_column(batch, PARTICIPANT_ID)?;
        let text = TEXT_COLUMNS
            .iter()
            .map(|name| string_column(batch, name))
            .collect::<Result<Vec<_>>>()?;
        let issue_dates = date_column(batch, ISSUE_DATE)?;

        let bnf_code = string_column(batch, BNF_CODE)?;
        let clean_codes: StringArray = bnf_code.iter().map(|v| v.map(clean_bnf_code)).collect();
        let drug_names = string_column(batch, DRUG_NAME)?;

        let (mask, mut stats) = self.match_mask(&drug_names, &clean_codes)?;

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(10);
        columns.push(array_ref(participant_ids));
        columns.extend(text.into_iter().map(array_ref));
        columns.push(array_ref(issue_dates));
        columns.push(array_ref(clean_codes));

        let mut kept = filter_arrays(&columns, &mask)?;
        let output = schema::matched_schema();

        // Kept rows only, so dropped records are never rewritten
        let read_2_index = output.index_of(READ_2)?;
        let read_2 = downcast_array::<StringArray>(&kept[read_2_index], READ_2, "Utf8")?;
        let stripped: StringArray = read_2.iter().map(|v| v.map(strip_read_2_suffix)).collect();
        kept[read_2_index] = array_ref(stripped);

        let drug_name_index = output.index_of(DRUG_NAME)?;
        let kept_names = downcast_array::<StringArray>(&kept[drug_name_index], DRUG_NAME, "Utf8")?;
        let (generic, brand, name_stats) = self.names.standardise_column(kept_names);
        stats.names = name_stats;
        kept.push(array_ref(generic));
        kept.push(array_ref(brand));

        Ok((RecordBatch::try_new(output, kept)?, stats))
    }
}

impl BatchFilter for DrugFilter {
    type Stats = MatchStats;

    fn filter(&self, batch: &RecordBatch) -> Result<(RecordBatch, MatchStats)> {
        self.apply(batch)
    }

    fn output_schema(&self) -> SchemaRef {
        schema::matched_schema()
    }
}
