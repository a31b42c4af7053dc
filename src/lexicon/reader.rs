use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::codec::compact::parse_entry;
use super::codec::decode;
use super::format::chunk::{self, RawChunk};
use super::format::index::{ChunkManifest, EntryIndex, StaticEntryIndex, ENTRY_INDEX_FILE, MANIFEST_FILE};
use super::format::partition::ChunkKey;
use super::iter::{ChunksIterator, EntriesIterator};
use super::types::error::{CacheError, LexiconError, Result};
use super::types::models::OriginalEntry;

/// Synchronous reader over one locale's published chunk directory.
///
/// Reads `meta.json` and `entry-index.json` up front. Chunk files are read
/// on demand and not cached; use [`ChunkCache`](crate::ChunkCache) for that.
#[derive(Debug)]
pub struct ChunkStore {
    dir: PathBuf,
    manifest: ChunkManifest,
    index: StaticEntryIndex,
}

impl ChunkStore {
    /// Opens a published locale directory.
    ///
    /// # Errors
    /// Returns an error if:
    /// - `meta.json` or `entry-index.json` is missing or unreadable
    /// - the manifest lists a chunk whose file does not exist
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Opening chunk store: {}", dir.display());

        let manifest = ChunkManifest::load(&dir.join(MANIFEST_FILE))?;
        for listed in &manifest.chunks {
            if !dir.join(&listed.file).is_file() {
                return Err(LexiconError::InvalidFormat(format!(
                    "Manifest lists '{}' but {} does not exist",
                    listed.chunk_key,
                    dir.join(&listed.file).display()
                )));
            }
        }
        let index = StaticEntryIndex::load(&dir.join(ENTRY_INDEX_FILE))?;
        debug!(
            "Store has {} chunks, {} entries, {} indexed ids",
            manifest.chunks.len(),
            manifest.total_entries,
            index.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            index,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &ChunkManifest {
        &self.manifest
    }

    pub fn index(&self) -> &StaticEntryIndex {
        &self.index
    }

    /// Total number of entries, as recorded in the manifest.
    pub fn num_entries(&self) -> usize {
        self.manifest.total_entries
    }

    pub fn chunk_path(&self, key: ChunkKey) -> PathBuf {
        self.dir.join(chunk::file_name(key))
    }

    /// Reads and parses one chunk file.
    pub fn read_chunk(&self, key: ChunkKey) -> Result<RawChunk> {
        let path = self.chunk_path(key);
        let bytes = fs::read(&path).map_err(|e| LexiconError::io(&path, e))?;
        let raw = RawChunk::parse(&bytes)?;
        if raw.key() != key {
            return Err(LexiconError::InvalidFormat(format!(
                "{} holds chunk '{}', expected '{}'",
                path.display(),
                raw.key(),
                key
            )));
        }
        Ok(raw)
    }

    /// Random access by id: resolves the chunk through the index, then
    /// decodes only that chunk up to the matching entry.
    pub fn get(&self, id: &str) -> Result<OriginalEntry> {
        let key = self
            .index
            .chunk_key_of(id)
            .ok_or_else(|| CacheError::NotIndexed { id: id.to_string() })?;
        let raw = self.read_chunk(key)?;

        for (position, value) in raw.entries.iter().enumerate() {
            if value.get("i").and_then(|v| v.as_str()) == Some(id) {
                let compact = parse_entry(value, position)?;
                return Ok(decode(&compact, &raw.metadata.category_id)?);
            }
        }
        Err(CacheError::NotFound {
            id: id.to_string(),
            chunk_key: key,
        }
        .into())
    }

    /// Iterates over every chunk in manifest order.
    pub fn iter_chunks(&self) -> ChunksIterator<'_> {
        ChunksIterator::new(self)
    }

    /// Iterates over every entry of every chunk.
    ///
    /// This is a shortcut for `store.iter_chunks().with_entries()`.
    pub fn iter_entries(&self) -> EntriesIterator<'_> {
        self.iter_chunks().with_entries()
    }
}
