//! Generic and brand name standardisation of matched records
//!
//! Free-text drug names are searched for a configured set of generic names
//! and their brand names. The generic name comes from the text when it names
//! one directly, otherwise from the brand it names.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use arrow::array::{Array, StringArray};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{Result, RxCleanError};

/// Case-insensitive search pattern trying longer terms first
///
/// At a given position the longest term wins, so `"simvador"` is preferred
/// over a shorter brand sharing its prefix.
fn search_pattern(terms: &[&str]) -> Result<Option<Regex>> {
    if terms.is_empty() {
        return Ok(None);
    }
    let mut escaped: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    escaped.dedup();
    Ok(Some(Regex::new(&format!("(?i)(?:{})", escaped.join("|")))?))
}

/// Standardised names found in one drug name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardNames {
    pub generic: Option<String>,
    pub brand: Option<String>,
}

/// Generic names and the brand names they are sold under
#[derive(Debug, Clone)]
pub struct DrugNameMap {
    generic: Option<Regex>,
    brand: Option<Regex>,
    brand_to_generic: FxHashMap<String, String>,
}

impl DrugNameMap {
    /// Build the map from generic names to brand names
    ///
    /// Names are lowercased. A brand listed under several generics resolves
    /// to the first generic in name order.
    pub fn new(generic_to_brands: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut generics = Vec::with_capacity(generic_to_brands.len());
        let mut brand_to_generic = FxHashMap::default();

        for (generic, brands) in generic_to_brands {
            let generic = generic.trim().to_lowercase();
            if generic.is_empty() {
                return Err(RxCleanError::config("Generic drug names must not be empty"));
            }
            for brand in brands {
                let brand = brand.trim().to_lowercase();
                if brand.is_empty() {
                    return Err(RxCleanError::config(format!(
                        "Empty brand name listed for {generic}"
                    )));
                }
                brand_to_generic.entry(brand).or_insert_with(|| generic.clone());
            }
            generics.push(generic);
        }

        let generic_terms: Vec<&str> = generics.iter().map(String::as_str).collect();
        let brand_terms: Vec<&str> = brand_to_generic.keys().map(String::as_str).collect();

        Ok(Self {
            generic: search_pattern(&generic_terms)?,
            brand: search_pattern(&brand_terms)?,
            brand_to_generic,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generic.is_none()
    }

    fn find(pattern: Option<&Regex>, text: &str) -> Option<String> {
        pattern
            .and_then(|re| re.find(text))
            .map(|m| m.as_str().to_lowercase())
    }

    fn resolve(&self, drug_name: &str) -> (StandardNames, Option<NameSource>) {
        let brand = Self::find(self.brand.as_ref(), drug_name);
        if let Some(generic) = Self::find(self.generic.as_ref(), drug_name) {
            return (
                StandardNames {
                    generic: Some(generic),
                    brand,
                },
                Some(NameSource::Text),
            );
        }
        let generic = brand
            .as_ref()
            .and_then(|b| self.brand_to_generic.get(b).cloned());
        let source = generic.as_ref().map(|_| NameSource::Brand);
        (StandardNames { generic, brand }, source)
    }

    /// Leftmost generic and brand names in a drug name
    #[must_use]
    pub fn standardise(&self, drug_name: &str) -> StandardNames {
        self.resolve(drug_name).0
    }

    /// Generic and brand name columns for a drug name column
    #[must_use]
    pub fn standardise_column(&self, drug_names: &StringArray) -> (StringArray, StringArray, NameStats) {
        let mut stats = NameStats::default();
        let mut generics = Vec::with_capacity(drug_names.len());
        let mut brands = Vec::with_capacity(drug_names.len());

        for value in drug_names.iter() {
            let (names, source) = value.map(|s| self.resolve(s)).unwrap_or_default();
            match source {
                Some(NameSource::Text) => stats.generic_from_name += 1,
                Some(NameSource::Brand) => stats.generic_from_brand += 1,
                None => stats.unnamed += 1,
            }
            generics.push(names.generic);
            brands.push(names.brand);
        }

        (StringArray::from(generics), StringArray::from(brands), stats)
    }
}

#[derive(Debug, Clone, Copy)]
enum NameSource {
    Text,
    Brand,
}

/// Counters for name standardisation of kept records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NameStats {
    /// Generic name present in the drug name
    pub generic_from_name: usize,
    /// Generic name inferred from a brand name
    pub generic_from_brand: usize,
    /// Neither a generic nor a known brand name found
    pub unnamed: usize,
}

impl AddAssign for NameStats {
    fn add_assign(&mut self, other: Self) {
        self.generic_from_name += other.generic_from_name;
        self.generic_from_brand += other.generic_from_brand;
        self.unnamed += other.unnamed;
    }
}
