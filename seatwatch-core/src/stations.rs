//! Station resolver
//!
//! Maps free-text station input to canonical station keys from the catalog
//! (`stations.json`, an object of `canonical key -> short name`).
//!
//! Matching is Turkish-locale aware: `I` lowers to `ı` and `İ` to `i`, and
//! alphabetical ties are broken with the Turkish letter order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Turkish alphabet, lowercase, in collation order.
const TR_ALPHABET: &str = "abcçdefgğhıijklmnoöpqrsştuüvwxyz";

#[derive(Error, Debug)]
pub enum StationCatalogError {
    #[error("Failed to read station catalog {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid station catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Station catalog is empty")]
    Empty,
}

/// How a resolved input should be handled by the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationMatch {
    NotFound,
    Unique(String),
    Ambiguous(Vec<String>),
}

impl From<Vec<String>> for StationMatch {
    fn from(mut ranked: Vec<String>) -> Self {
        match ranked.len() {
            0 => StationMatch::NotFound,
            1 => StationMatch::Unique(ranked.remove(0)),
            _ => StationMatch::Ambiguous(ranked),
        }
    }
}

#[derive(Debug, Clone)]
struct Station {
    key: String,
    key_lower: String,
    short_lower: String,
}

#[derive(Debug, Clone)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    pub fn new<K, S>(entries: impl IntoIterator<Item = (K, S)>) -> Self
    where
        K: Into<String>,
        S: AsRef<str>,
    {
        let stations = entries
            .into_iter()
            .map(|(key, short)| {
                let key = key.into();
                Station {
                    key_lower: normalize(&key),
                    short_lower: normalize(short.as_ref()),
                    key,
                }
            })
            .collect();
        Self { stations }
    }

    pub fn from_json(json: &str) -> Result<Self, StationCatalogError> {
        let map: BTreeMap<String, String> = serde_json::from_str(json)?;
        if map.is_empty() {
            return Err(StationCatalogError::Empty);
        }
        Ok(Self::new(map))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StationCatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| StationCatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(stations = catalog.len(), path = %path.display(), "Station catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Ranked station keys matching `input`.
    ///
    /// Exact short-name matches sort first, then short names starting with the
    /// input, then everything else; ties go alphabetical by key. When the top
    /// match is an exact short-name match the result collapses to that one key.
    pub fn resolve(&self, input: &str) -> Vec<String> {
        let needle = normalize(input);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<&Station> = self
            .stations
            .iter()
            .filter(|s| s.short_lower.contains(&needle) || s.key_lower.contains(&needle))
            .collect();

        matches.sort_by(|a, b| {
            let a_exact = a.short_lower == needle;
            let b_exact = b.short_lower == needle;
            let a_starts = a.short_lower.starts_with(&needle);
            let b_starts = b.short_lower.starts_with(&needle);
            b_exact
                .cmp(&a_exact)
                .then(b_starts.cmp(&a_starts))
                .then_with(|| collate(&a.key, &b.key))
        });

        if let Some(top) = matches.first() {
            if top.short_lower == needle {
                return vec![top.key.clone()];
            }
        }

        matches.into_iter().map(|s| s.key.clone()).collect()
    }

    pub fn lookup(&self, input: &str) -> StationMatch {
        self.resolve(input).into()
    }
}

/// Turkish-locale lowercase with surrounding whitespace trimmed.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        match c {
            'I' => out.push('ı'),
            'İ' => out.push('i'),
            other => out.extend(other.to_lowercase()),
        }
    }
    out
}

/// Alphabetical comparison using Turkish letter order, case-insensitive first.
pub fn collate(a: &str, b: &str) -> Ordering {
    let a_lower = normalize(a);
    let b_lower = normalize(b);
    a_lower
        .chars()
        .map(collation_rank)
        .cmp(b_lower.chars().map(collation_rank))
        .then_with(|| a.cmp(b))
}

fn collation_rank(c: char) -> u32 {
    match TR_ALPHABET.chars().position(|letter| letter == c) {
        Some(idx) => 0x1000 + idx as u32,
        None if (c as u32) < 0x1000 && !c.is_alphabetic() => c as u32,
        None => 0x2000 + c as u32,
    }
}
