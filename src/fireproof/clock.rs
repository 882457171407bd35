use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One immutable unit of causal history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrdtEntry {
    pub data: String,
    pub cid: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl CrdtEntry {
    pub fn new(cid: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            data: String::new(),
            cid: cid.into(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Frontier of a causal DAG: the entries no later entry has named as a parent.
///
/// Serializes as a JSON object keyed by cid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockHead {
    heads: HashMap<String, CrdtEntry>,
}

impl ClockHead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `entry` a head and retire the heads it descends from.
    ///
    /// Merging an entry twice leaves the frontier unchanged.
    pub fn merge(&mut self, entry: CrdtEntry) {
        let parents = entry.parents.clone();
        self.heads.insert(entry.cid.clone(), entry);
        for parent in &parents {
            self.heads.remove(parent);
        }
    }

    /// Merge every entry of a batch, in order.
    pub fn merge_all(&mut self, entries: impl IntoIterator<Item = CrdtEntry>) {
        for entry in entries {
            self.merge(entry);
        }
    }

    pub fn contains(&self, cid: &str) -> bool {
        self.heads.contains_key(cid)
    }

    pub fn get(&self, cid: &str) -> Option<&CrdtEntry> {
        self.heads.get(cid)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CrdtEntry> {
        self.heads.values()
    }

    pub fn cids(&self) -> impl Iterator<Item = &str> {
        self.heads.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn clear(&mut self) {
        self.heads.clear();
    }
}
