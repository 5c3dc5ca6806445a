//! Curated drug-name term lists
//!
//! The inclusion pattern is built from a directory of plain-text term lists,
//! one term per line below a single header line. The exclusion pattern is
//! built the same way from the configured term list.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::util::{safe_read_to_string, validate_directory};
use crate::error::{Result, RxCleanError};

/// Extension of curated term files
pub const TERM_FILE_EXTENSION: &str = "txt";

/// Term files in `dir`, sorted by name
pub fn find_term_files(dir: &Path) -> Result<Vec<PathBuf>> {
    validate_directory(dir, "curated pattern directory")?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| RxCleanError::io(dir, e))? {
        let path = entry.map_err(|e| RxCleanError::io(dir, e))?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(TERM_FILE_EXTENSION))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Terms of one file: lines after the header, trimmed and lowercased
fn parse_terms(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .skip(1)
        .map(|line| line.trim().to_lowercase())
        .filter(|term| !term.is_empty())
}

/// Load the deduplicated, sorted union of all term files in `dir`
pub fn load_terms(dir: &Path) -> Result<Vec<String>> {
    let files = find_term_files(dir)?;
    let mut terms = BTreeSet::new();

    for file in &files {
        let content = safe_read_to_string(file, "curated term list")?;
        let before = terms.len();
        terms.extend(parse_terms(&content));
        log::debug!(
            "{}: {} new terms",
            file.display(),
            terms.len() - before
        );
    }

    log::info!(
        "Loaded {} curated terms from {} files in {}",
        terms.len(),
        files.len(),
        dir.display()
    );
    Ok(terms.into_iter().collect())
}

/// Case-insensitive alternation of literal terms
///
/// Terms are escaped, so regex metacharacters in drug names match
/// themselves. An empty term list is rejected since the resulting pattern
/// could never match.
pub fn build_pattern<S: AsRef<str>>(terms: &[S], purpose: &str) -> Result<Regex> {
    let escaped: BTreeSet<String> = terms
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| regex::escape(&t))
        .collect();

    if escaped.is_empty() {
        return Err(RxCleanError::config(format!("No {purpose} terms given")));
    }

    let alternation = escaped.into_iter().collect::<Vec<_>>().join("|");
    Ok(Regex::new(&format!("(?i)(?:{alternation})"))?)
}

/// Inclusion pattern from a curated term directory
pub fn name_pattern(dir: &Path) -> Result<Regex> {
    let terms = load_terms(dir)?;
    build_pattern(&terms, "drug-name").map_err(|e| match e {
        RxCleanError::Config(_) => RxCleanError::config(format!(
            "No drug-name terms found in {}",
            dir.display()
        )),
        other => other,
    })
}

/// Exclusion pattern from configured terms
pub fn exclusion_pattern<S: AsRef<str>>(terms: &[S]) -> Result<Regex> {
    build_pattern(terms, "exclusion")
}
