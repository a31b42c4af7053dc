//! Error types for the lexchunk crate.
//!
//! The taxonomy follows the lifecycle of an entry:
//! - [`SchemaError`]: publish time, a categorical value outside its table. Fatal.
//! - [`DecodeError`]: read time, one malformed compact entry. Recoverable by skipping it.
//! - [`FetchError`]: read time, transport failure for a chunk. Recoverable by retrying.
//! - [`CacheError`]: everything the retrieval cache can surface to a caller.
//!
//! Verifier mismatches are report records, not errors; see
//! [`Mismatch`](crate::lexicon::verify::Mismatch).

use std::path::PathBuf;
use thiserror::Error;

use crate::lexicon::format::partition::ChunkKey;

/// A categorical value that is not present in its enumeration table.
///
/// Indicates drift between the corpus and the schema. Must block publication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Schema error in entry '{entry_id}': {field} = {value:?} is not in the {field} table")]
pub struct SchemaError {
    pub entry_id: String,
    pub field: &'static str,
    pub value: String,
}

/// A compact entry that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Decode error in entry '{entry_id}', field '{field}': {reason}")]
pub struct DecodeError {
    /// The entry id, `#<position>` when the raw entry carries no readable id,
    /// or `*` when the chunk envelope itself is malformed.
    pub entry_id: String,
    pub field: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(entry_id: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A chunk artifact could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch chunk '{chunk_key}' from {path}: {reason}")]
pub struct FetchError {
    pub chunk_key: ChunkKey,
    pub path: String,
    pub reason: String,
    /// Transport status code, when the transport has one.
    pub status: Option<u16>,
}

/// Errors surfaced by the chunk retrieval cache.
///
/// `Clone` so that one in-flight fetch can hand the same outcome to every
/// caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The chunk payload could not be decoded (bad envelope, or an invalid
    /// entry under [`DecodePolicy::Abort`](crate::lexicon::cache::DecodePolicy)).
    #[error("Chunk '{chunk_key}' could not be decoded: {source}")]
    Decode {
        chunk_key: ChunkKey,
        #[source]
        source: DecodeError,
    },

    /// The index collaborator does not know this id.
    #[error("Entry '{id}' is not present in the entry index")]
    NotIndexed { id: String },

    /// The chunk resolved, but the id is not in it. Points at a stale index.
    #[error("Entry '{id}' not found in resolved chunk '{chunk_key}'")]
    NotFound { id: String, chunk_key: ChunkKey },

    #[error("The cache state lock was poisoned")]
    LockPoisoned,
}

/// The primary error type for all other operations in this crate.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The same id appears twice in the corpus.
    #[error("Duplicate entry id '{id}' (first seen in chunk '{first}', again in chunk '{second}')")]
    DuplicateId {
        id: String,
        first: ChunkKey,
        second: ChunkKey,
    },

    /// A source record that is not a well-formed Original Entry.
    #[error("Invalid source entry #{index} in {path}: {reason}")]
    InvalidSource {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    /// A file or directory that does not follow the published layout.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl LexiconError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// A convenience `Result` type alias using the crate's `LexiconError` type.
pub type Result<T> = std::result::Result<T, LexiconError>;
