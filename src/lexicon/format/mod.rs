//! Published layout: chunk keys, chunk artifacts, the id index and the manifest.
//!
//! # Module Organization
//!
//! - [`partition`]: Derives chunk keys and groups a corpus by key
//! - [`chunk`]: Builds and parses chunk artifacts
//! - [`index`]: The id → chunk key index and the per-locale manifest
//!
//! # Layout
//!
//! ```text
//! <chunk_dir>/<locale>/
//! ┌──────────────────────┐
//! │  meta.json           │ ← index::ChunkManifest
//! ├──────────────────────┤
//! │  entry-index.json    │ ← index::StaticEntryIndex
//! ├──────────────────────┤
//! │  entries-ㄱ.json     │ ← chunk::Chunk / chunk::RawChunk
//! │  entries-ㄲ.json     │
//! │  ...                 │
//! │  entries-etc.json    │
//! └──────────────────────┘
//! ```

pub mod chunk;
pub mod index;
pub mod partition;
