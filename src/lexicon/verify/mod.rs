//! Round-trip verification of published chunks against their source records.
//!
//! For every locale the source corpus is re-partitioned and each published
//! chunk is compared position by position: the published entry is decoded,
//! both sides are normalized, and the results must be structurally equal.
//! Chunks are independent and are checked in parallel.

pub mod normalize;

use log::{debug, info};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::config::LexiconConfig;
use super::format::chunk::{self, RawChunk};
use super::format::partition::{partition, ChunkKey};
use super::publish::load_source_dir;
use super::types::error::{LexiconError, Result};
use super::types::models::OriginalEntry;

pub use normalize::{deep_equal, normalize};

/// One failed entry or chunk. A report record, never returned as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub locale: String,
    pub chunk_file: String,
    /// Position in the chunk; `None` for a chunk-level failure.
    pub index: Option<usize>,
    pub id: Option<String>,
    pub detail: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.locale, self.chunk_file)?;
        if let Some(index) = self.index {
            write!(f, " #{}", index)?;
        }
        if let Some(id) = &self.id {
            write!(f, " ({})", id)?;
        }
        write!(f, ": {}", self.detail)
    }
}

/// Tally of one verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn is_lossless(&self) -> bool {
        self.failed == 0
    }

    pub fn pass_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.passed as f64 / self.total as f64 * 100.0
    }

    pub fn merge(&mut self, other: VerifyReport) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.mismatches.extend(other.mismatches);
    }

    /// Human-readable summary with at most `cap` mismatch lines.
    pub fn render(&self, cap: usize) -> String {
        let mut out = format!(
            "Total: {}  Passed: {}  Failed: {}  ({:.2}%)\n",
            self.total,
            self.passed,
            self.failed,
            self.pass_percent()
        );
        for mismatch in self.mismatches.iter().take(cap) {
            out.push_str(&format!("  {}\n", mismatch));
        }
        if self.mismatches.len() > cap {
            out.push_str(&format!("  ... and {} more\n", self.mismatches.len() - cap));
        }
        out
    }

    fn pass(&mut self) {
        self.total += 1;
        self.passed += 1;
    }

    fn fail(&mut self, count: usize, mismatch: Mismatch) {
        self.total += count;
        self.failed += count;
        self.mismatches.push(mismatch);
    }
}

/// Verifies published chunk directories against their sources.
#[derive(Debug, Clone)]
pub struct Verifier {
    source_dir: PathBuf,
    chunk_dir: PathBuf,
    locales: Vec<String>,
}

impl Verifier {
    /// Builds a verifier for the locales `config` names or discovers.
    pub fn from_config(config: &LexiconConfig) -> Result<Self> {
        Ok(Self {
            source_dir: config.source_dir.clone(),
            chunk_dir: config.chunk_dir.clone(),
            locales: config.resolve_locales()?,
        })
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Verifies every locale and merges the reports in locale order.
    pub fn run(&self) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        for locale in &self.locales {
            report.merge(self.verify_locale(locale)?);
        }
        Ok(report)
    }

    /// Verifies one locale.
    ///
    /// # Errors
    ///
    /// Only for an unusable source side (unreadable files, schema errors,
    /// duplicate ids). Problems on the published side are mismatches.
    pub fn verify_locale(&self, locale: &str) -> Result<VerifyReport> {
        let source_dir = self.source_dir.join(locale);
        let chunk_dir = self.chunk_dir.join(locale);
        info!("Verifying locale '{}' ({})", locale, chunk_dir.display());

        let corpus = load_source_dir(&source_dir)?;
        let expected = partition(corpus.entries)?.chunks;
        let published: BTreeMap<ChunkKey, PathBuf> = chunk::chunk_files(&chunk_dir)?.into_iter().collect();

        let keys: Vec<ChunkKey> = expected
            .keys()
            .chain(published.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let reports: Vec<VerifyReport> = keys
            .par_iter()
            .map(|key| {
                verify_chunk(
                    locale,
                    *key,
                    expected.get(key).map(Vec::as_slice),
                    published.get(key).map(PathBuf::as_path),
                )
            })
            .collect();

        let mut report = VerifyReport::default();
        for chunk_report in reports {
            report.merge(chunk_report);
        }
        debug!(
            "Locale '{}': {}/{} entries passed",
            locale, report.passed, report.total
        );
        Ok(report)
    }
}

fn verify_chunk(
    locale: &str,
    key: ChunkKey,
    expected: Option<&[OriginalEntry]>,
    published: Option<&Path>,
) -> VerifyReport {
    let chunk_file = chunk::file_name(key);
    let mismatch = |index: Option<usize>, id: Option<&str>, detail: String| Mismatch {
        locale: locale.to_string(),
        chunk_file: chunk_file.clone(),
        index,
        id: id.map(str::to_string),
        detail,
    };
    let mut report = VerifyReport::default();

    let raw = published.map(|path| {
        fs::read(path)
            .map_err(|e| LexiconError::io(path, e).to_string())
            .and_then(|bytes| RawChunk::parse(&bytes).map_err(|e| e.to_string()))
    });

    let (expected, raw) = match (expected, raw) {
        (Some(expected), Some(Ok(raw))) => (expected, raw),
        (Some(expected), None) => {
            report.fail(expected.len(), mismatch(None, None, "chunk file is missing".into()));
            return report;
        }
        (Some(expected), Some(Err(reason))) => {
            report.fail(expected.len(), mismatch(None, None, format!("chunk is unreadable: {}", reason)));
            return report;
        }
        (None, Some(Ok(raw))) => {
            let detail = "published chunk has no source entries".to_string();
            report.fail(raw.entries.len().max(1), mismatch(None, None, detail));
            return report;
        }
        (None, Some(Err(reason))) => {
            let detail = format!("unexpected chunk is unreadable: {}", reason);
            report.fail(1, mismatch(None, None, detail));
            return report;
        }
        (None, None) => return report,
    };

    let mut decoded = raw.decoded();
    for index in 0..expected.len().max(raw.entries.len()) {
        let original = expected.get(index);
        let id = original.map(|entry| entry.id.as_str());
        match (original, decoded.next()) {
            (Some(original), Some(Ok(entry))) if entry.id != original.id => {
                let detail = format!("found entry '{}' at this position", entry.id);
                report.fail(1, mismatch(Some(index), id, detail));
            }
            (Some(original), Some(Ok(entry))) => match deep_equal(&normalize(original), &normalize(&entry)) {
                None => report.pass(),
                Some(path) => report.fail(1, mismatch(Some(index), id, format!("differs at {}", path))),
            },
            (Some(_), Some(Err(e))) => report.fail(1, mismatch(Some(index), id, e.to_string())),
            (Some(_), None) => report.fail(1, mismatch(Some(index), id, "missing from chunk".into())),
            (None, Some(result)) => {
                let extra = result.map(|entry| entry.id).ok();
                report.fail(1, mismatch(Some(index), extra.as_deref(), "not in source".into()));
            }
            (None, None) => break,
        }
    }
    report
}
