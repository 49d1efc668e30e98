//! Month catalog: which months a dataset has, and where each one lives.

use crate::month::MonthKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque reference to one month's stored file, as the store reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileLocation(String);

impl FileLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from month key to file location for one (bucket, dataset) pair.
///
/// Keys are held sorted, so insertion order from the store never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCatalog {
    entries: BTreeMap<MonthKey, FileLocation>,
}

impl MonthCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, month: impl Into<MonthKey>, location: FileLocation) {
        self.entries.insert(month.into(), location);
    }

    pub fn get(&self, month: &MonthKey) -> Option<&FileLocation> {
        self.entries.get(month)
    }

    pub fn contains(&self, month: &MonthKey) -> bool {
        self.entries.contains_key(month)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest key present.
    pub fn first(&self) -> Option<&MonthKey> {
        self.entries.keys().next()
    }

    /// Largest key present.
    pub fn last(&self) -> Option<&MonthKey> {
        self.entries.keys().next_back()
    }

    /// Keys in ascending order.
    pub fn months(&self) -> impl Iterator<Item = &MonthKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &FileLocation)> {
        self.entries.iter()
    }

    /// BLAKE3 over the sorted `key=location` lines.
    ///
    /// Two listings with the same fingerprint describe the same set of files.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (month, location) in &self.entries {
            hasher.update(month.as_str().as_bytes());
            hasher.update(b"=");
            hasher.update(location.as_str().as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl<K: Into<MonthKey>> FromIterator<(K, FileLocation)> for MonthCatalog {
    fn from_iter<I: IntoIterator<Item = (K, FileLocation)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
