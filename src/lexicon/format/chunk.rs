//! The chunk artifact: a metadata header plus the compact entries of one key.

use log::{trace, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::partition::ChunkKey;
use crate::lexicon::codec::compact::CompactEntry;
use crate::lexicon::codec::encode;
use crate::lexicon::iter::DecodedEntries;
use crate::lexicon::types::error::{DecodeError, LexiconError, Result};
use crate::lexicon::types::models::OriginalEntry;
use crate::lexicon::utils;

/// Version written into every chunk header.
pub const CHUNK_FORMAT_VERSION: u32 = 2;

/// Entry id used in a [`DecodeError`] about the chunk envelope itself.
pub const ENVELOPE: &str = "*";

/// Matches chunk artifact file names such as `entries-ㄱ.json`.
static CHUNK_FILE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn chunk_file_regex() -> &'static Regex {
    CHUNK_FILE_PATTERN.get_or_init(|| Regex::new(r"^entries-(.+)\.json$").expect("Invalid chunk file regex pattern"))
}

/// Deterministic artifact file name for a chunk key.
pub fn file_name(key: ChunkKey) -> String {
    format!("entries-{}.json", key)
}

/// Lists the chunk artifacts present in `dir`, in key order.
///
/// Files that look like chunks but name an unknown key are skipped with a
/// warning. A missing directory yields an empty list.
pub fn chunk_files(dir: &Path) -> Result<Vec<(ChunkKey, PathBuf)>> {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LexiconError::io(dir, e)),
    };

    let mut files = Vec::new();
    for dir_entry in listing {
        let dir_entry = dir_entry.map_err(|e| LexiconError::io(dir, e))?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let Some(captures) = chunk_file_regex().captures(&name) else {
            continue;
        };
        match captures[1].parse::<ChunkKey>() {
            Ok(key) => files.push((key, dir_entry.path())),
            Err(_) => warn!("Ignoring {}: not a known chunk key", dir_entry.path().display()),
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub version: u32,
    pub chunk_key: ChunkKey,
    pub entry_count: usize,
    /// Default category of the chunk's entries. Entries in another category
    /// carry their own.
    #[serde(default)]
    pub category_id: String,
}

/// A chunk ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub metadata: ChunkMetadata,
    pub entries: Vec<CompactEntry>,
}

impl Chunk {
    /// Encodes the entries of one partition bucket, in the order given.
    pub fn build(key: ChunkKey, entries: &[OriginalEntry]) -> Self {
        let category_id = default_category(entries);
        trace!("Chunk '{}' default category: '{}'", key, category_id);
        let entries: Vec<CompactEntry> = entries
            .iter()
            .map(|entry| encode(entry, &category_id))
            .collect();
        Self {
            metadata: ChunkMetadata {
                version: CHUNK_FORMAT_VERSION,
                chunk_key: key,
                entry_count: entries.len(),
                category_id,
            },
            entries,
        }
    }
}

/// The most frequent category among `entries`; ties go to the one seen first.
pub fn default_category(entries: &[OriginalEntry]) -> String {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, entry) in entries.iter().enumerate() {
        counts.entry(entry.category_id.as_str()).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(category, _)| category.to_string())
        .unwrap_or_default()
}

/// A chunk as read back, with entries left as raw JSON so that each one can
/// fail to decode on its own.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawChunk {
    pub metadata: ChunkMetadata,
    pub entries: Vec<Value>,
}

impl RawChunk {
    /// Parses a chunk artifact. A leading byte-order mark is tolerated.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] with entry id [`ENVELOPE`] when the payload
    /// is not a chunk at all.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        let text = utils::decode_text(bytes);
        let chunk: RawChunk = serde_json::from_str(&text)
            .map_err(|err| DecodeError::new(ENVELOPE, "metadata", err.to_string()))?;

        if chunk.metadata.version != CHUNK_FORMAT_VERSION {
            warn!(
                "Chunk '{}' has format version {}, expected {}",
                chunk.metadata.chunk_key, chunk.metadata.version, CHUNK_FORMAT_VERSION
            );
        }
        if chunk.metadata.entry_count != chunk.entries.len() {
            warn!(
                "Chunk '{}' declares {} entries but holds {}",
                chunk.metadata.chunk_key,
                chunk.metadata.entry_count,
                chunk.entries.len()
            );
        }
        Ok(chunk)
    }

    pub fn key(&self) -> ChunkKey {
        self.metadata.chunk_key
    }

    /// Lazily decodes the entries one at a time.
    pub fn decoded(&self) -> DecodedEntries<'_> {
        DecodedEntries::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::format::partition::key_of;
    use crate::lexicon::types::models::Translation;
    use crate::lexicon::types::tables::{Difficulty, PartOfSpeech};

    fn entry(id: &str, category: &str) -> OriginalEntry {
        OriginalEntry {
            id: id.into(),
            primary_word: "가".into(),
            transliteration: "ga".into(),
            pronunciation: None,
            part_of_speech: PartOfSpeech::Verb,
            category_id: category.into(),
            difficulty: Difficulty::Beginner,
            frequency: None,
            tags: Vec::new(),
            has_dialogue_example: false,
            translation: Translation {
                word: "go".into(),
                explanation: "to go".into(),
                examples: None,
                variations: None,
            },
        }
    }

    #[test]
    fn default_category_is_the_majority_with_first_seen_ties() {
        let entries = [entry("a", "x"), entry("b", "y"), entry("c", "y")];
        assert_eq!(default_category(&entries), "y");

        let entries = [entry("a", "x"), entry("b", "y"), entry("c", "y"), entry("d", "x")];
        assert_eq!(default_category(&entries), "x");

        assert_eq!(default_category(&[]), "");
    }

    #[test]
    fn only_minority_categories_are_written_per_entry() {
        let chunk = Chunk::build(key_of("가"), &[entry("a", "x"), entry("b", "y"), entry("c", "x")]);
        assert_eq!(chunk.metadata.category_id, "x");
        assert_eq!(chunk.metadata.entry_count, 3);
        let overrides: Vec<_> = chunk.entries.iter().map(|e| e.category_id.as_deref()).collect();
        assert_eq!(overrides, [None, Some("y"), None]);
    }

    #[test]
    fn envelope_round_trips_with_bom() {
        let chunk = Chunk::build(key_of("가"), &[entry("a", "x")]);
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend(serde_json::to_vec(&chunk).unwrap());
        let raw = RawChunk::parse(&bytes).unwrap();
        assert_eq!(raw.metadata, chunk.metadata);
        assert_eq!(raw.entries.len(), 1);
        assert_eq!(file_name(raw.key()), "entries-ㄱ.json");
    }

    #[test]
    fn non_chunk_payload_is_an_envelope_error() {
        let err = RawChunk::parse(b"<html>404</html>").unwrap_err();
        assert_eq!(err.entry_id, ENVELOPE);
    }
}
