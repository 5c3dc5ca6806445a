//! Configuration for the cleaning pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::util::safe_read_to_string;
use crate::error::{Result, RxCleanError};

/// Default number of rows per record batch when reading Parquet
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Environment variable overriding the configured batch size
pub const BATCH_SIZE_ENV: &str = "RX_CLEAN_BATCH_SIZE";

/// Formulary code prefix for lipid-regulating drugs
pub const DEFAULT_CODE_PREFIX: &str = "0212";

/// Drug-name terms that mark records as irrelevant devices or look-alike names
pub const DEFAULT_EXCLUSION_TERMS: &[&str] = &[
    "nystatin",
    "ecostatin",
    "sandostatin",
    "ostoguard",
    "sharpsguard",
    "lactose powder",
    "guardian opaque",
    "testing",
    "ileobag",
];

/// Generic statin names and the brand names they are sold under
pub const DEFAULT_DRUG_NAMES: &[(&str, &[&str])] = &[
    ("atorvastatin", &["lipitor"]),
    ("rosuvastatin", &["crestor", "ezallor"]),
    ("simvastatin", &["zocor", "flolipid", "inegy", "simvador"]),
    ("pitavastatin", &["livalo", "zypitamag", "nikita"]),
    ("pravastatin", &["pravachol", "lipostat"]),
    ("lovastatin", &["mevacor", "altroprev", "altocor"]),
    ("fluvastatin", &["lescol"]),
    ("cerivastatin", &["baycol", "lipobay"]),
];

/// The default generic to brand name map
#[must_use]
pub fn default_drug_names() -> BTreeMap<String, Vec<String>> {
    DEFAULT_DRUG_NAMES
        .iter()
        .map(|(generic, brands)| {
            (
                (*generic).to_string(),
                brands.iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

/// Names of the input columns
///
/// Output files always use the canonical names in [`crate::schema`]; these
/// only control where values are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub participant_id: String,
    pub read_2: String,
    pub bnf_code: String,
    pub dmd_code: String,
    pub drug_name: String,
    pub quantity: String,
    pub issue_date: String,
    pub date_of_birth: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            participant_id: "participant_id".to_string(),
            read_2: "read_2".to_string(),
            bnf_code: "bnf_code".to_string(),
            dmd_code: "dmd_code".to_string(),
            drug_name: "drug_name".to_string(),
            quantity: "quantity".to_string(),
            issue_date: "issue_date".to_string(),
            date_of_birth: "date_of_birth".to_string(),
        }
    }
}

impl ColumnNames {
    /// Prescription columns in output order
    #[must_use]
    pub fn prescription_columns(&self) -> Vec<&str> {
        vec![
            self.participant_id.as_str(),
            self.read_2.as_str(),
            self.bnf_code.as_str(),
            self.dmd_code.as_str(),
            self.drug_name.as_str(),
            self.quantity.as_str(),
            self.issue_date.as_str(),
        ]
    }

    #[must_use]
    pub fn demographic_columns(&self) -> Vec<&str> {
        vec![self.participant_id.as_str(), self.date_of_birth.as_str()]
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input column names
    pub columns: ColumnNames,
    /// Prefix matched against the formulary code with `.` removed
    pub code_prefix: String,
    /// Drug-name terms suppressing code-prefix matches
    pub exclusion_terms: Vec<String>,
    /// Directory of curated drug-name term lists
    pub pattern_dir: Option<PathBuf>,
    /// Generic names and their brand names, used to name matched records
    pub drug_names: BTreeMap<String, Vec<String>>,
    /// Rows per record batch when reading Parquet
    pub batch_size: usize,
    /// Worker threads for batch processing
    pub threads: usize,
    /// Show progress bars
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            code_prefix: DEFAULT_CODE_PREFIX.to_string(),
            exclusion_terms: DEFAULT_EXCLUSION_TERMS
                .iter()
                .map(ToString::to_string)
                .collect(),
            pattern_dir: None,
            drug_names: default_drug_names(),
            batch_size: DEFAULT_BATCH_SIZE,
            threads: num_cpus::get(),
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; absent fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "pipeline configuration")?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RxCleanError::config(format!("Invalid configuration {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Batch size after applying the environment override
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        std::env::var(BATCH_SIZE_ENV)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(self.batch_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.code_prefix.is_empty() {
            return Err(RxCleanError::config("code_prefix must not be empty"));
        }
        if self.code_prefix.contains('.') {
            return Err(RxCleanError::config(format!(
                "code_prefix '{}' is compared against codes with '.' removed and must not contain '.'",
                self.code_prefix
            )));
        }
        if self.batch_size == 0 {
            return Err(RxCleanError::config("batch_size must be positive"));
        }
        if self.threads == 0 {
            return Err(RxCleanError::config("threads must be positive"));
        }
        Ok(())
    }
}
