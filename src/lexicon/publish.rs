//! Publish pipeline: source records → chunk artifacts, id index and manifest.
//!
//! Untyped JSON enters the crate here, so this is also where schema drift is
//! caught. A categorical string outside its table stops the publish with a
//! [`SchemaError`] before anything is written.

use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::config::LexiconConfig;
use super::format::chunk::{self, Chunk};
use super::format::index::{ChunkManifest, ManifestChunk, ENTRY_INDEX_FILE, MANIFEST_FILE};
use super::format::partition::{partition, ChunkKey, Partition};
use super::types::error::{LexiconError, Result, SchemaError};
use super::types::models::OriginalEntry;
use super::types::tables::{Difficulty, EnumTable, Frequency, PartOfSpeech};
use super::utils;

/// One chunk written by [`publish_locale`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedChunk {
    pub key: ChunkKey,
    pub count: usize,
    pub bytes: u64,
}

/// What [`publish_locale`] produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub total_entries: usize,
    pub chunks: Vec<PublishedChunk>,
    /// Combined size of the source files read.
    pub source_bytes: u64,
    /// Combined size of the chunk files written.
    pub compact_bytes: u64,
}

impl PublishSummary {
    /// Size saved relative to the source, in percent.
    pub fn reduction_percent(&self) -> f64 {
        if self.source_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.compact_bytes as f64 / self.source_bytes as f64) * 100.0
    }
}

/// Source records of one locale, in load order.
#[derive(Debug, Default)]
pub struct SourceCorpus {
    pub entries: Vec<OriginalEntry>,
    pub files: Vec<PathBuf>,
    pub bytes: u64,
}

/// Checks the categorical fields of one raw source record against their
/// tables. `frequency` may be absent or null.
pub fn check_schema(record: &Value, position: usize) -> std::result::Result<(), SchemaError> {
    let entry_id = record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", position));

    check_field::<PartOfSpeech>(record, &entry_id, "partOfSpeech", false)?;
    check_field::<Difficulty>(record, &entry_id, "difficulty", false)?;
    check_field::<Frequency>(record, &entry_id, "frequency", true)?;
    Ok(())
}

fn check_field<T: EnumTable>(
    record: &Value,
    entry_id: &str,
    key: &str,
    optional: bool,
) -> std::result::Result<(), SchemaError> {
    let schema_error = |value: String| SchemaError {
        entry_id: entry_id.to_string(),
        field: T::FIELD,
        value,
    };
    match record.get(key) {
        // Missing required fields are reported by deserialization
        None => Ok(()),
        Some(Value::Null) if optional => Ok(()),
        Some(Value::String(name)) => T::from_name(name)
            .map(|_| ())
            .ok_or_else(|| schema_error(name.clone())),
        Some(other) => Err(schema_error(other.to_string())),
    }
}

/// Sorted `*.json` files directly inside `dir`.
fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for dir_entry in fs::read_dir(dir).map_err(|e| LexiconError::io(dir, e))? {
        let path = dir_entry.map_err(|e| LexiconError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every source file of a locale. Each file is a JSON array of
/// Original Entries.
///
/// # Errors
/// Returns an error if:
/// - a file cannot be read or is not a JSON array
/// - a categorical value is not in its table ([`LexiconError::Schema`])
/// - a record is otherwise not a valid entry ([`LexiconError::InvalidSource`])
pub fn load_source_dir(dir: &Path) -> Result<SourceCorpus> {
    let mut corpus = SourceCorpus::default();

    for path in source_files(dir)? {
        corpus.bytes += fs::metadata(&path).map_err(|e| LexiconError::io(&path, e))?.len();
        let records: Vec<Value> = utils::read_json_file(&path)?;
        debug!("{}: {} records", path.display(), records.len());

        for (position, record) in records.into_iter().enumerate() {
            check_schema(&record, position)?;
            let entry: OriginalEntry =
                serde_json::from_value(record).map_err(|e| LexiconError::InvalidSource {
                    path: path.clone(),
                    index: position,
                    reason: e.to_string(),
                })?;
            corpus.entries.push(entry);
        }
        corpus.files.push(path);
    }

    Ok(corpus)
}

/// Publishes one locale: reads `source_dir`, writes into `chunk_dir`.
///
/// Chunk files left over from an earlier publish whose key no longer has
/// entries are removed, so the directory always reflects exactly one run.
pub fn publish_locale(source_dir: &Path, chunk_dir: &Path) -> Result<PublishSummary> {
    info!("Publishing {} -> {}", source_dir.display(), chunk_dir.display());

    let corpus = load_source_dir(source_dir)?;
    let source_bytes = corpus.bytes;
    let Partition { chunks, index } = partition(corpus.entries)?;

    fs::create_dir_all(chunk_dir).map_err(|e| LexiconError::io(chunk_dir, e))?;
    for (key, stale) in chunk::chunk_files(chunk_dir)? {
        if !chunks.contains_key(&key) {
            info!("Removing stale chunk {}", stale.display());
            fs::remove_file(&stale).map_err(|e| LexiconError::io(&stale, e))?;
        }
    }

    let mut summary = PublishSummary {
        source_bytes,
        ..PublishSummary::default()
    };
    let mut manifest_chunks = Vec::with_capacity(chunks.len());

    for (key, entries) in &chunks {
        let file = chunk::file_name(*key);
        let bytes = utils::write_json_atomic(&chunk_dir.join(&file), &Chunk::build(*key, entries))?;
        debug!("Wrote {} ({} entries, {} bytes)", file, entries.len(), bytes);

        summary.total_entries += entries.len();
        summary.compact_bytes += bytes;
        summary.chunks.push(PublishedChunk {
            key: *key,
            count: entries.len(),
            bytes,
        });
        manifest_chunks.push(ManifestChunk {
            chunk_key: *key,
            count: entries.len(),
            file,
        });
    }

    index.save(&chunk_dir.join(ENTRY_INDEX_FILE))?;
    ChunkManifest::new(manifest_chunks).save(&chunk_dir.join(MANIFEST_FILE))?;

    info!(
        "Published {} entries in {} chunks ({} -> {} bytes)",
        summary.total_entries,
        summary.chunks.len(),
        summary.source_bytes,
        summary.compact_bytes
    );
    Ok(summary)
}

/// Publishes every configured (or discovered) locale.
pub fn publish_all(config: &LexiconConfig) -> Result<Vec<(String, PublishSummary)>> {
    config
        .resolve_locales()?
        .into_iter()
        .map(|locale| {
            let summary = publish_locale(&config.source_dir.join(&locale), &config.chunk_dir.join(&locale))?;
            Ok((locale, summary))
        })
        .collect()
}
