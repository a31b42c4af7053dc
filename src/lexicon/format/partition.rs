//! Chunk keys and corpus partitioning.
//!
//! A precomposed Hangul syllable (U+AC00..=U+D7A3) is laid out as
//! `0xAC00 + (initial * 21 + medial) * 28 + final`, so its initial consonant
//! is `(code - 0xAC00) / 588`. There are 19 initials; every other string
//! (Latin loanwords, numerals, bare jamo, the empty string) lands in `etc`.

use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::index::StaticEntryIndex;
use crate::lexicon::types::error::{LexiconError, Result};
use crate::lexicon::types::models::OriginalEntry;

const HANGUL_FIRST: u32 = 0xAC00;
const HANGUL_LAST: u32 = 0xD7A3;
const SYLLABLES_PER_INITIAL: u32 = 21 * 28;

const KEY_NAMES: [&str; 20] = [
    "ㄱ", "ㄲ", "ㄴ", "ㄷ", "ㄸ", "ㄹ", "ㅁ", "ㅂ", "ㅃ", "ㅅ", "ㅆ", "ㅇ", "ㅈ", "ㅉ", "ㅊ", "ㅋ",
    "ㅌ", "ㅍ", "ㅎ", "etc",
];

/// Identifier of one partition bucket.
///
/// Ordered by initial-consonant order with `etc` last, which is also the
/// order chunks are published and verified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey(u8);

impl ChunkKey {
    /// The catch-all bucket.
    pub const ETC: ChunkKey = ChunkKey(19);

    /// Every key, in publish order.
    pub fn all() -> impl Iterator<Item = ChunkKey> {
        (0..KEY_NAMES.len() as u8).map(ChunkKey)
    }

    pub fn as_str(self) -> &'static str {
        KEY_NAMES[self.0 as usize]
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ChunkKey {
    type Err = LexiconError;

    fn from_str(s: &str) -> Result<Self> {
        KEY_NAMES
            .iter()
            .position(|name| *name == s)
            .map(|position| ChunkKey(position as u8))
            .ok_or_else(|| LexiconError::InvalidFormat(format!("Unknown chunk key: {:?}", s)))
    }
}

impl Serialize for ChunkKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChunkKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Derives the chunk key of a word from its first character.
///
/// Total over all strings. The word is not trimmed: a leading space puts the
/// word in `etc`.
pub fn key_of(word: &str) -> ChunkKey {
    match word.chars().next().map(u32::from) {
        Some(code @ HANGUL_FIRST..=HANGUL_LAST) => {
            ChunkKey(((code - HANGUL_FIRST) / SYLLABLES_PER_INITIAL) as u8)
        }
        _ => ChunkKey::ETC,
    }
}

/// A corpus grouped by chunk key, plus the id index built along the way.
#[derive(Debug, Default)]
pub struct Partition {
    /// Entries per key, in corpus order within each chunk. Empty chunks are absent.
    pub chunks: BTreeMap<ChunkKey, Vec<OriginalEntry>>,
    pub index: StaticEntryIndex,
}

impl Partition {
    pub fn total_entries(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }
}

/// Groups a corpus by [`key_of`] of each entry's primary word.
///
/// # Errors
///
/// Returns [`LexiconError::DuplicateId`] when two entries share an id.
pub fn partition<I>(entries: I) -> Result<Partition>
where
    I: IntoIterator<Item = OriginalEntry>,
{
    let mut chunks: BTreeMap<ChunkKey, Vec<OriginalEntry>> = BTreeMap::new();
    let mut seen: HashMap<String, ChunkKey> = HashMap::new();

    for entry in entries {
        let key = key_of(&entry.primary_word);
        if let Some(first) = seen.insert(entry.id.clone(), key) {
            return Err(LexiconError::DuplicateId {
                id: entry.id,
                first,
                second: key,
            });
        }
        chunks.entry(key).or_default().push(entry);
    }

    for (key, entries) in &chunks {
        debug!("Chunk '{}': {} entries", key, entries.len());
    }
    info!("Partitioned {} entries into {} chunks", seen.len(), chunks.len());

    Ok(Partition {
        chunks,
        index: StaticEntryIndex::from(seen),
    })
}
