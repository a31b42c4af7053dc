//! The id → chunk key index and the per-locale chunk manifest.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::chunk::CHUNK_FORMAT_VERSION;
use super::partition::ChunkKey;
use crate::lexicon::types::error::Result;
use crate::lexicon::utils;

/// File name of the published id index inside a locale's chunk directory.
pub const ENTRY_INDEX_FILE: &str = "entry-index.json";

/// File name of the published manifest inside a locale's chunk directory.
pub const MANIFEST_FILE: &str = "meta.json";

/// Resolves an entry id to the chunk that holds it.
///
/// Queried synchronously and locally; an implementation must not perform I/O
/// per lookup.
pub trait EntryIndex {
    fn chunk_key_of(&self, id: &str) -> Option<ChunkKey>;
}

/// An [`EntryIndex`] held entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticEntryIndex {
    keys: HashMap<String, ChunkKey>,
}

impl StaticEntryIndex {
    /// Loads a published `entry-index.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let keys: HashMap<String, ChunkKey> = utils::read_json_file(path)?;
        Ok(Self { keys })
    }

    /// Writes the index as `{ id: chunkKey }` with ids sorted.
    pub fn save(&self, path: &Path) -> Result<u64> {
        let sorted: BTreeMap<&str, ChunkKey> =
            self.keys.iter().map(|(id, key)| (id.as_str(), *key)).collect();
        utils::write_json_atomic(path, &sorted)
    }

    pub fn insert(&mut self, id: impl Into<String>, key: ChunkKey) -> Option<ChunkKey> {
        self.keys.insert(id.into(), key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl EntryIndex for StaticEntryIndex {
    fn chunk_key_of(&self, id: &str) -> Option<ChunkKey> {
        self.keys.get(id).copied()
    }
}

impl From<HashMap<String, ChunkKey>> for StaticEntryIndex {
    fn from(keys: HashMap<String, ChunkKey>) -> Self {
        Self { keys }
    }
}

impl<'a> FromIterator<(&'a str, ChunkKey)> for StaticEntryIndex {
    fn from_iter<T: IntoIterator<Item = (&'a str, ChunkKey)>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().map(|(id, key)| (id.to_string(), key)).collect(),
        }
    }
}

/// `meta.json`: what a locale's chunk directory contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkManifest {
    pub version: u32,
    pub total_entries: usize,
    pub chunks: Vec<ManifestChunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChunk {
    pub chunk_key: ChunkKey,
    pub count: usize,
    pub file: String,
}

impl ChunkManifest {
    pub fn new(chunks: Vec<ManifestChunk>) -> Self {
        Self {
            version: CHUNK_FORMAT_VERSION,
            total_entries: chunks.iter().map(|chunk| chunk.count).sum(),
            chunks,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        utils::read_json_file(path)
    }

    pub fn save(&self, path: &Path) -> Result<u64> {
        utils::write_json_atomic(path, self)
    }
}
