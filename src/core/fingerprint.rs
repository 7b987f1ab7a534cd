// File: src/core/fingerprint.rs
//! Cache keys for normalized queries.
//!
//! Key: blake3 of the canonical JSON form
//! `{"filters":{k:v,...},"ingredients":[...]}`, where ingredient names and
//! filter keys are in sorted order. Set or map insertion order never reaches
//! the hash.

use crate::core::types::{CanonicalName, NormalizedQuery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Deterministic key derived from a [`NormalizedQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct CanonicalForm<'a> {
    filters: BTreeMap<&'a str, &'a str>,
    ingredients: Vec<&'a CanonicalName>,
}

pub fn fingerprint(query: &NormalizedQuery) -> Fingerprint {
    let mut ingredients: Vec<&CanonicalName> = query.ingredients.iter().collect();
    ingredients.sort();
    // Empty values mean "no filter"; NormalizedQuery already drops them on
    // insert, this covers queries built field by field.
    let filters = query
        .filters
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let form = CanonicalForm { filters, ingredients };
    let mut hasher = blake3::Hasher::new();
    // Serializing a struct of maps and strings cannot fail.
    if let Ok(bytes) = serde_json::to_vec(&form) {
        hasher.update(&bytes);
    }
    Fingerprint(hasher.finalize().to_hex().to_string())
}
