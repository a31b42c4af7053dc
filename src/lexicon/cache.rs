//! Chunk retrieval cache with per-key request deduplication.
//!
//! Each chunk key is in one of three states:
//!
//! ```text
//!   Absent ──request──▶ Pending ──fetch ok──▶ Resolved
//!      ▲                   │
//!      └────fetch error────┘
//! ```
//!
//! ## Deduplication
//!
//! The first `request` for an absent key registers a shared fetch future
//! under the state lock, before anything is awaited. Later callers find the
//! `Pending` entry and await the same future, so there is at most one
//! outstanding fetch per key no matter how many callers arrive.
//!
//! The fetch itself runs in a spawned Tokio task. A caller that stops
//! waiting does not cancel it: the chunk still lands in the cache for the
//! next caller.
//!
//! ## Clearing
//!
//! `clear` drops every entry and bumps a generation counter. A fetch started
//! before the clear still completes, but its result is discarded on arrival.
//! Its failure, if any, still counts in [`CacheStats::failures`].

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::runtime::Handle;

use super::config::LexiconConfig;
use super::fetch::{chunk_path, ChunkFetcher};
use super::format::chunk::RawChunk;
use super::format::index::EntryIndex;
use super::format::partition::{key_of, ChunkKey};
use super::types::error::{CacheError, DecodeError, FetchError};
use super::types::models::OriginalEntry;

/// Decoded entries of one chunk, by id.
pub type EntryMap = HashMap<String, Arc<OriginalEntry>>;

type FetchResult = Result<Arc<DecodedChunk>, CacheError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// What to do with an entry that fails to decode.
/// A resolved chunk: the entries that decoded, and why the others did not.
#[derive(Debug)]
struct DecodedChunk {
    entries: Arc<EntryMap>,
    /// Skipped under [`DecodePolicy::SkipInvalid`], by entry id.
    rejected: HashMap<String, DecodeError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Log the entry at `warn` and leave it out of the chunk. A `lookup` of
    /// its id reports the decode error.
    #[default]
    SkipInvalid,
    /// Fail the whole chunk with [`CacheError::Decode`].
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub locale: String,
    /// Fetch path template with `{locale}` and `{key}` placeholders.
    pub url_template: String,
    pub decode_policy: DecodePolicy,
}

impl CacheConfig {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            url_template: LexiconConfig::default().url_template,
            decode_policy: DecodePolicy::default(),
        }
    }

    /// Takes the template from a loaded [`LexiconConfig`].
    pub fn from_config(config: &LexiconConfig, locale: impl Into<String>) -> Self {
        Self {
            url_template: config.url_template.clone(),
            ..Self::new(locale)
        }
    }

    pub fn with_decode_policy(mut self, decode_policy: DecodePolicy) -> Self {
        self.decode_policy = decode_policy;
        self
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a resolved chunk
    pub ready_hits: u64,
    /// Requests that joined a fetch already in flight
    pub inflight_joins: u64,
    /// Fetches issued to the transport
    pub fetches: u64,
    /// Fetches that ended in an error (transport or decode)
    pub failures: u64,
}

enum ChunkState {
    Pending(SharedFetch),
    Resolved(Arc<DecodedChunk>),
}

#[derive(Default)]
struct CacheState {
    chunks: HashMap<ChunkKey, ChunkState>,
    generation: u64,
}

struct Inner<F> {
    fetcher: F,
    index: Arc<dyn EntryIndex + Send + Sync>,
    config: CacheConfig,
    state: Mutex<CacheState>,
    stats: RwLock<CacheStats>,
}

/// Handle to one chunk cache. Clones share the same state.
///
/// Fetches run on tasks spawned onto the current Tokio runtime. A request
/// made outside a runtime fails with a [`CacheError::Fetch`] and leaves the
/// cache usable.
pub struct ChunkCache<F> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for ChunkCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> fmt::Debug for ChunkCache<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCache")
            .field("locale", &self.inner.config.locale)
            .field("resolved", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: ChunkFetcher> ChunkCache<F> {
    pub fn new<I>(fetcher: F, index: I, config: CacheConfig) -> Self
    where
        I: EntryIndex + Send + Sync + 'static,
    {
        Self::with_shared_index(fetcher, Arc::new(index), config)
    }

    /// Like [`new`](Self::new), for an index that is shared with other owners.
    pub fn with_shared_index(
        fetcher: F,
        index: Arc<dyn EntryIndex + Send + Sync>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                index,
                config,
                state: Mutex::new(CacheState::default()),
                stats: RwLock::new(CacheStats::default()),
            }),
        }
    }

    /// Returns the decoded entries of chunk `key`, fetching it at most once.
    ///
    /// # Errors
    ///
    /// A [`CacheError::Fetch`] or [`CacheError::Decode`] from the fetch this
    /// call started or joined. Nothing is cached on failure; calling again
    /// retries.
    pub async fn request(&self, key: ChunkKey) -> Result<Arc<EntryMap>, CacheError> {
        self.resolve(key).await.map(|chunk| Arc::clone(&chunk.entries))
    }

    async fn resolve(&self, key: ChunkKey) -> FetchResult {
        let fetch = {
            let mut guard = self.inner.state.lock().map_err(|_| CacheError::LockPoisoned)?;
            let state = &mut *guard;
            match state.chunks.get(&key) {
                Some(ChunkState::Resolved(chunk)) => {
                    self.inner.bump(|stats| stats.ready_hits += 1);
                    return Ok(Arc::clone(chunk));
                }
                Some(ChunkState::Pending(fetch)) => {
                    debug!("Joining in-flight fetch for chunk '{}'", key);
                    self.inner.bump(|stats| stats.inflight_joins += 1);
                    fetch.clone()
                }
                None => {
                    let runtime = Handle::try_current().map_err(|e| {
                        CacheError::Fetch(self.inner.fetch_error(key, format!("no Tokio runtime: {}", e)))
                    })?;
                    debug!("Chunk '{}': Absent -> Pending", key);
                    self.inner.bump(|stats| stats.fetches += 1);
                    let fetch = Inner::start_fetch(&self.inner, &runtime, key, state.generation);
                    state.chunks.insert(key, ChunkState::Pending(fetch.clone()));
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Finds an entry by id through the index collaborator.
    ///
    /// # Errors
    ///
    /// [`CacheError::NotIndexed`] when the index does not know `id`,
    /// [`CacheError::Decode`] when its entry was skipped as malformed,
    /// [`CacheError::NotFound`] when its chunk resolved without it, or any
    /// error from [`request`](Self::request).
    pub async fn lookup(&self, id: &str) -> Result<Arc<OriginalEntry>, CacheError> {
        let key = self
            .inner
            .index
            .chunk_key_of(id)
            .ok_or_else(|| CacheError::NotIndexed { id: id.to_string() })?;
        let chunk = self.resolve(key).await?;
        if let Some(entry) = chunk.entries.get(id) {
            return Ok(Arc::clone(entry));
        }
        Err(match chunk.rejected.get(id) {
            Some(source) => CacheError::Decode {
                chunk_key: key,
                source: source.clone(),
            },
            None => CacheError::NotFound {
                id: id.to_string(),
                chunk_key: key,
            },
        })
    }

    /// Warms the chunk that `word` belongs to. Never fails; errors are
    /// logged at `debug` and dropped.
    pub async fn preload(&self, word: &str) {
        let key = key_of(word);
        if self.is_resolved(key) || self.is_pending(key) {
            return;
        }
        if let Err(e) = self.request(key).await {
            debug!("Preload of chunk '{}' failed: {}", key, e);
        }
    }

    /// Drops every resolved and pending chunk. Also recovers a cache whose
    /// state lock was poisoned.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.inner.state.is_poisoned() {
            warn!("Resetting cache state after a panic");
            self.inner.state.clear_poison();
        }
        debug!(
            "Clearing {} chunks (generation {})",
            state.chunks.len(),
            state.generation
        );
        state.chunks.clear();
        state.generation += 1;
    }

    pub fn is_resolved(&self, key: ChunkKey) -> bool {
        matches!(self.inner.lock_state().chunks.get(&key), Some(ChunkState::Resolved(_)))
    }

    pub fn is_pending(&self, key: ChunkKey) -> bool {
        matches!(self.inner.lock_state().chunks.get(&key), Some(ChunkState::Pending(_)))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }
}

impl<F> ChunkCache<F> {
    /// Number of resolved chunks.
    pub fn len(&self) -> usize {
        self.inner
            .lock_state()
            .chunks
            .values()
            .filter(|state| matches!(state, ChunkState::Resolved(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        *self.inner.stats.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F> Inner<F> {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self, update: impl FnOnce(&mut CacheStats)) {
        update(&mut self.stats.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Records the outcome of a fetch started in `generation`.
    fn complete(&self, key: ChunkKey, generation: u64, outcome: &FetchResult) {
        if outcome.is_err() {
            self.bump(|stats| stats.failures += 1);
        }
        let mut state = self.lock_state();
        if state.generation != generation {
            debug!("Discarding chunk '{}' fetched before a clear", key);
            return;
        }
        match outcome {
            Ok(chunk) => {
                debug!(
                    "Chunk '{}': Pending -> Resolved ({} entries, {} rejected)",
                    key,
                    chunk.entries.len(),
                    chunk.rejected.len()
                );
                state.chunks.insert(key, ChunkState::Resolved(Arc::clone(chunk)));
            }
            Err(e) => {
                debug!("Chunk '{}': Pending -> Absent ({})", key, e);
                state.chunks.remove(&key);
            }
        }
    }
}

impl<F: ChunkFetcher> Inner<F> {
    fn fetch_error(&self, key: ChunkKey, reason: String) -> FetchError {
        FetchError {
            chunk_key: key,
            path: chunk_path(&self.config.url_template, &self.config.locale, key),
            reason,
            status: None,
        }
    }

    fn start_fetch(this: &Arc<Self>, runtime: &Handle, key: ChunkKey, generation: u64) -> SharedFetch {
        let inner = Arc::clone(this);
        let task_path = chunk_path(&this.config.url_template, &this.config.locale, key);

        let task = runtime.spawn(async move {
            let outcome = match inner.fetcher.fetch(key, &task_path).await {
                Ok(bytes) => decode_payload(key, &bytes, inner.config.decode_policy),
                Err(e) => Err(CacheError::Fetch(e)),
            };
            inner.complete(key, generation, &outcome);
            outcome
        });

        let inner = Arc::clone(this);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    // The task died before it could record anything
                    let reason = format!("fetch task failed: {}", join_error);
                    let outcome = Err(CacheError::Fetch(inner.fetch_error(key, reason)));
                    inner.complete(key, generation, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Parses a chunk payload into an id → entry map under `policy`.
fn decode_payload(key: ChunkKey, bytes: &[u8], policy: DecodePolicy) -> FetchResult {
    let raw = RawChunk::parse(bytes).map_err(|source| CacheError::Decode { chunk_key: key, source })?;
    if raw.key() != key {
        warn!("Payload fetched for chunk '{}' is labelled '{}'", key, raw.key());
    }

    let mut entries = EntryMap::with_capacity(raw.entries.len());
    let mut rejected = HashMap::new();
    for result in raw.decoded() {
        match result {
            Ok(entry) => {
                entries.insert(entry.id.clone(), Arc::new(entry));
            }
            Err(source) if policy == DecodePolicy::Abort => {
                return Err(CacheError::Decode { chunk_key: key, source });
            }
            Err(e) => {
                warn!("Skipping entry in chunk '{}': {}", key, e);
                rejected.insert(e.entry_id.clone(), e);
            }
        }
    }
    Ok(Arc::new(DecodedChunk {
        entries: Arc::new(entries),
        rejected,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::format::index::StaticEntryIndex;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        payload: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChunkFetcher for StaticFetcher {
        async fn fetch(&self, _key: ChunkKey, _path: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn payload(entries: serde_json::Value) -> Vec<u8> {
        let count = entries.as_array().map(Vec::len).unwrap_or(0);
        serde_json::to_vec(&json!({
            "metadata": { "version": 2, "chunkKey": "ㄱ", "entryCount": count, "categoryId": "basics" },
            "entries": entries
        }))
        .unwrap()
    }

    fn cache(entries: serde_json::Value, policy: DecodePolicy) -> (ChunkCache<StaticFetcher>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = StaticFetcher {
            payload: payload(entries),
            calls: Arc::clone(&calls),
        };
        let index: StaticEntryIndex = [("go-1", key_of("가"))].into_iter().collect();
        let config = CacheConfig::new("en").with_decode_policy(policy);
        (ChunkCache::new(fetcher, index, config), calls)
    }

    #[tokio::test]
    async fn resolved_chunk_is_served_without_fetching() {
        let (cache, calls) = cache(
            json!([{ "i": "go-1", "k": "가다", "r": "gada", "s": 1, "t": { "w": "go", "x": "to go" } }]),
            DecodePolicy::SkipInvalid,
        );
        let key = key_of("가");

        let first = cache.request(key).await.unwrap();
        let second = cache.request(key).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_resolved(key));
        assert_eq!(cache.stats().ready_hits, 1);
        assert_eq!(first["go-1"].category_id, "basics");
    }

    #[tokio::test]
    async fn invalid_entries_follow_the_decode_policy() {
        let entries = json!([
            { "i": "go-1", "k": "가다", "r": "gada", "t": { "w": "go", "x": "to go" } },
            { "i": "bad", "k": "가", "r": "ga", "s": "verb", "t": { "w": "x", "x": "x" } }
        ]);

        let (skipping, _) = cache(entries.clone(), DecodePolicy::SkipInvalid);
        let resolved = skipping.request(key_of("가")).await.unwrap();
        assert_eq!(resolved.len(), 1);

        let (strict, _) = cache(entries, DecodePolicy::Abort);
        let err = strict.request(key_of("가")).await.unwrap_err();
        assert!(matches!(err, CacheError::Decode { ref source, .. } if source.entry_id == "bad"));
        assert!(!strict.is_pending(key_of("가")));
        assert_eq!(strict.stats().failures, 1);
    }

    #[test]
    fn request_outside_a_runtime_leaves_the_cache_usable() {
        let (cache, calls) = cache(json!([]), DecodePolicy::SkipInvalid);
        let key = key_of("가");

        match futures::executor::block_on(cache.request(key)) {
            Err(CacheError::Fetch(e)) => assert!(e.reason.contains("no Tokio runtime"), "{}", e.reason),
            other => panic!("expected a fetch error, got {:?}", other.map(|m| m.len())),
        }
        assert!(!cache.is_pending(key));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(cache.request(key)).expect("request inside a runtime");
        assert!(cache.is_resolved(key));
    }

    #[tokio::test]
    async fn clear_recovers_a_poisoned_cache() {
        let (cache, _) = cache(json!([]), DecodePolicy::SkipInvalid);
        let key = key_of("가");
        let inner = Arc::clone(&cache.inner);
        let _ = std::thread::spawn(move || {
            let _guard = inner.state.lock().unwrap();
            panic!("panic while holding the state lock");
        })
        .join();

        assert_eq!(cache.request(key).await.unwrap_err(), CacheError::LockPoisoned);
        cache.clear();
        cache.request(key).await.expect("request after clear");
        assert!(cache.is_resolved(key));
    }

    #[tokio::test]
    async fn lookup_distinguishes_unindexed_from_missing() {
        let (cache, _) = cache(json!([]), DecodePolicy::SkipInvalid);
        assert!(matches!(
            cache.lookup("nowhere").await,
            Err(CacheError::NotIndexed { .. })
        ));
        assert!(matches!(
            cache.lookup("go-1").await,
            Err(CacheError::NotFound { .. })
        ));
    }
}
