//! Core lexicon module: codec, chunk layout, retrieval and verification.

pub mod cache;
pub mod codec;
pub mod config;
pub mod fetch;
pub mod format;
pub mod iter;
pub mod publish;
pub mod reader;
pub mod types;
pub mod utils;
pub mod verify;

pub use types::error::{CacheError, DecodeError, FetchError, LexiconError, Result, SchemaError};
pub use types::models;
pub use types::tables;
