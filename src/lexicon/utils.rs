//! File helpers shared by the publish, read and verify paths.

use encoding_rs::UTF_8;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::types::error::{LexiconError, Result};

/// Decodes UTF-8 text, removing a leading byte-order mark.
///
/// Invalid sequences are replaced rather than rejected; the JSON parser
/// reports the resulting garbage with a position.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, _) = UTF_8.decode_with_bom_removal(bytes);
    text
}

/// Reads a JSON file into `T`.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| LexiconError::io(path, e))?;
    serde_json::from_str(&decode_text(&bytes)).map_err(|e| LexiconError::json(path, e))
}

/// Serializes `value` as compact JSON and writes it atomically: the data goes
/// to a temporary file in the target directory, which then replaces `path`.
///
/// Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64> {
    let bytes = serde_json::to_vec(value).map_err(|e| LexiconError::json(path, e))?;

    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir).map_err(|e| LexiconError::io(parent_dir, e))?;

    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| LexiconError::io(parent_dir, e))?;
    temp_file
        .write_all(&bytes)
        .map_err(|e| LexiconError::io(temp_file.path(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| LexiconError::io(path, e.error))?;

    Ok(bytes.len() as u64)
}
