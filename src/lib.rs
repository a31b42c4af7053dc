//! # lexchunk
//!
//! A lossless compact codec for dictionary entries, with chunked publishing
//! and a deduplicating retrieval cache.
//!
//! Entries are encoded with pinned enumeration indices and omit-if-default
//! field elision, partitioned into chunks by the initial consonant of their
//! headword, and published as static JSON artifacts. A [`ChunkCache`] fetches
//! and decodes chunks on demand, issuing at most one fetch per chunk at a
//! time. A [`Verifier`] checks that every published entry decodes back to its
//! source record.
pub mod lexicon;

// Re-export the main types for convenience
pub use lexicon::{
    cache::{CacheConfig, CacheStats, ChunkCache, DecodePolicy, EntryMap},
    codec::{compact::CompactEntry, decode, encode},
    config::LexiconConfig,
    fetch::{ChunkFetcher, DirFetcher},
    format::{
        chunk::{Chunk, ChunkMetadata, RawChunk},
        index::{ChunkManifest, EntryIndex, StaticEntryIndex},
        partition::{key_of, partition, ChunkKey},
    },
    models::{LeveledExamples, OriginalEntry, Pronunciation, Translation, Variations},
    publish::{publish_locale, PublishSummary},
    reader::ChunkStore,
    tables::{Difficulty, EnumTable, Frequency, PartOfSpeech},
    verify::{Mismatch, Verifier, VerifyReport},
    CacheError, DecodeError, FetchError, LexiconError, Result, SchemaError,
};

#[cfg(feature = "http")]
pub use lexicon::fetch::HttpFetcher;
