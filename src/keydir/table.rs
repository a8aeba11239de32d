//! Key directory implementation
//!
//! HashMap-based; keys are unordered.

use std::collections::hash_map::{self, HashMap};

use super::KeyDirEntry;

/// In-memory index of live keys
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyDir {
    entries: HashMap<String, KeyDirEntry>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `key` at a new location, returning the entry it replaced
    pub fn insert(&mut self, key: impl Into<String>, entry: KeyDirEntry) -> Option<KeyDirEntry> {
        self.entries.insert(key.into(), entry)
    }

    pub fn get(&self, key: &str) -> Option<&KeyDirEntry> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<KeyDirEntry> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, KeyDirEntry> {
        self.entries.iter()
    }

    /// Owned copy of all keys, unordered
    pub fn snapshot_keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a KeyDir {
    type Item = (&'a String, &'a KeyDirEntry);
    type IntoIter = hash_map::Iter<'a, String, KeyDirEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
