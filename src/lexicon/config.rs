//! `lexchunk.toml` configuration.

use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::types::error::{LexiconError, Result};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "lexchunk.toml";

/// Paths and limits for the publish and verify commands.
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LexiconConfig {
    /// `<source_dir>/<locale>/*.json`, each file an array of entries.
    pub source_dir: PathBuf,
    /// `<chunk_dir>/<locale>/` receives the published artifacts.
    pub chunk_dir: PathBuf,
    /// Locales to process. Empty means every subdirectory of `source_dir`.
    pub locales: Vec<String>,
    /// Maximum number of mismatches the verifier prints.
    pub report_cap: usize,
    /// Fetch path template for the retrieval cache; `{locale}` and `{key}`
    /// are substituted.
    pub url_template: String,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/source"),
            chunk_dir: PathBuf::from("data/chunks"),
            locales: Vec::new(),
            report_cap: 10,
            url_template: "/data/chunks/{locale}/entries-{key}.json".to_string(),
        }
    }
}

impl LexiconConfig {
    /// Loads configuration from `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| LexiconError::io(path, e))?;
        toml::from_str(&contents).map_err(|source| LexiconError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` when given. Otherwise loads `lexchunk.toml` from the
    /// working directory if it exists, and falls back to defaults if not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        match fs::metadata(default_path) {
            Ok(_) => Self::load(default_path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No {} found; using defaults", DEFAULT_CONFIG_FILE);
                Ok(Self::default())
            }
            Err(e) => Err(LexiconError::io(default_path, e)),
        }
    }

    /// Locales to process: the configured list, or the subdirectories of
    /// `source_dir` in name order.
    pub fn resolve_locales(&self) -> Result<Vec<String>> {
        if !self.locales.is_empty() {
            return Ok(self.locales.clone());
        }
        list_subdirs(&self.source_dir)
    }
}

/// Names of the immediate subdirectories of `dir`, sorted.
pub fn list_subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| LexiconError::io(dir, e))? {
        let entry = entry.map_err(|e| LexiconError::io(dir, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: LexiconConfig = toml::from_str("report_cap = 3\nlocales = [\"en\"]").unwrap();
        assert_eq!(config.report_cap, 3);
        assert_eq!(config.locales, ["en"]);
        assert_eq!(config.chunk_dir, PathBuf::from("data/chunks"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "chunk_size = 5").unwrap();
        assert!(matches!(LexiconConfig::load(&path), Err(LexiconError::Config { .. })));
    }

    #[test]
    fn locales_are_discovered_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for locale in ["ko", "en", "ja"] {
            fs::create_dir(dir.path().join(locale)).unwrap();
        }
        fs::write(dir.path().join("README.md"), "").unwrap();
        let config = LexiconConfig {
            source_dir: dir.path().to_path_buf(),
            ..LexiconConfig::default()
        };
        assert_eq!(config.resolve_locales().unwrap(), ["en", "ja", "ko"]);
    }
}
