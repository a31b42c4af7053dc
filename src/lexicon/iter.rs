//! Iterators for sequential access to published entries.
//!
//! The design is layered, each level adding one step of work:
//!
//! 1. [`DecodedEntries`] - Decodes the raw entries of one chunk, one at a time
//! 2. [`ChunksIterator`] - Reads every chunk of a [`ChunkStore`] in manifest order
//! 3. [`EntriesIterator`] - Chains the two: `(key, entry)` across the whole store
//!
//! Every level yields `Result`s, so one bad entry or one unreadable chunk does
//! not end the iteration.
//!
//! # Example
//! ```no_run
//! # use lexchunk::ChunkStore;
//! # let store = ChunkStore::open("data/chunks/en").unwrap();
//! for result in store.iter_entries() {
//!     let (key, entry) = result.unwrap();
//!     println!("{} {}: {}", key, entry.id, entry.primary_word);
//! }
//! ```

use std::vec::IntoIter;

use super::codec::compact::parse_entry;
use super::codec::decode;
use super::format::chunk::RawChunk;
use super::format::partition::ChunkKey;
use super::reader::ChunkStore;
use super::types::error::{DecodeError, Result};
use super::types::models::OriginalEntry;

/// Iterator decoding the entries of one [`RawChunk`] in stored order.
///
/// Created by [`RawChunk::decoded()`].
pub struct DecodedEntries<'a> {
    chunk: &'a RawChunk,
    position: usize,
}

impl<'a> DecodedEntries<'a> {
    pub(crate) fn new(chunk: &'a RawChunk) -> Self {
        Self { chunk, position: 0 }
    }
}

impl Iterator for DecodedEntries<'_> {
    type Item = std::result::Result<OriginalEntry, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.chunk.entries.get(self.position)?;
        let position = self.position;
        self.position += 1;
        Some(
            parse_entry(value, position)
                .and_then(|compact| decode(&compact, &self.chunk.metadata.category_id)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk.entries.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DecodedEntries<'_> {}

/// Iterator over the chunks of a store, in manifest order.
///
/// Created by [`ChunkStore::iter_chunks()`].
pub struct ChunksIterator<'a> {
    store: &'a ChunkStore,
    keys: IntoIter<ChunkKey>,
}

impl<'a> ChunksIterator<'a> {
    pub(super) fn new(store: &'a ChunkStore) -> Self {
        let keys: Vec<ChunkKey> = store.manifest().chunks.iter().map(|c| c.chunk_key).collect();
        Self {
            store,
            keys: keys.into_iter(),
        }
    }

    /// Transforms this iterator to yield decoded entries instead of chunks.
    pub fn with_entries(self) -> EntriesIterator<'a> {
        EntriesIterator {
            chunks: self,
            current: None,
            position: 0,
        }
    }
}

impl Iterator for ChunksIterator<'_> {
    type Item = Result<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        Some(self.store.read_chunk(key))
    }
}

/// Iterator over `(key, entry)` pairs across a whole store.
///
/// Created by [`ChunksIterator::with_entries()`].
pub struct EntriesIterator<'a> {
    chunks: ChunksIterator<'a>,
    current: Option<RawChunk>,
    position: usize,
}

impl Iterator for EntriesIterator<'_> {
    type Item = Result<(ChunkKey, OriginalEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = &self.current {
                if let Some(value) = chunk.entries.get(self.position) {
                    let position = self.position;
                    self.position += 1;
                    let decoded = parse_entry(value, position)
                        .and_then(|compact| decode(&compact, &chunk.metadata.category_id));
                    return Some(decoded.map(|entry| (chunk.key(), entry)).map_err(Into::into));
                }
            }

            // Current chunk exhausted; load the next one
            match self.chunks.next()? {
                Ok(chunk) => {
                    self.current = Some(chunk);
                    self.position = 0;
                }
                Err(e) => {
                    self.current = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bad_entries_do_not_stop_the_iteration() {
        let raw: RawChunk = serde_json::from_value(json!({
            "metadata": { "version": 2, "chunkKey": "ㄱ", "entryCount": 3, "categoryId": "c" },
            "entries": [
                { "i": "a", "k": "가", "r": "ga", "t": { "w": "a", "x": "a" } },
                { "i": "b", "k": "가", "r": "ga", "h": 2, "t": { "w": "b", "x": "b" } },
                { "i": "c", "k": "가", "r": "ga", "t": { "w": "c", "x": "c" } }
            ]
        }))
        .unwrap();

        let decoded = raw.decoded();
        assert_eq!(decoded.len(), 3);
        let results: Vec<_> = decoded.collect();
        assert_eq!(results[0].as_ref().unwrap().category_id, "c");
        assert_eq!(results[1].as_ref().unwrap_err().entry_id, "b");
        assert_eq!(results[2].as_ref().unwrap().id, "c");
    }
}
