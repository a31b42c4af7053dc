use async_trait::async_trait;
use lexchunk::lexicon::fetch::chunk_path;
use lexchunk::lexicon::publish::load_source_dir;
use lexchunk::{
    key_of, partition, CacheConfig, CacheError, Chunk, ChunkCache, ChunkFetcher, ChunkKey, FetchError,
    StaticEntryIndex,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// In-memory transport that counts fetches, can hold them at a gate, and
/// can fail a number of fetches on request.
#[derive(Clone, Default)]
struct MemoryFetcher {
    state: Arc<FetcherState>,
}

#[derive(Default)]
struct FetcherState {
    payloads: HashMap<String, Vec<u8>>,
    calls: Mutex<HashMap<ChunkKey, usize>>,
    gate: Option<Arc<Semaphore>>,
    failures_left: AtomicUsize,
}

impl MemoryFetcher {
    fn calls(&self, key: ChunkKey) -> usize {
        self.state.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.state.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ChunkFetcher for MemoryFetcher {
    async fn fetch(&self, key: ChunkKey, path: &str) -> Result<Vec<u8>, FetchError> {
        *self.state.calls.lock().unwrap().entry(key).or_default() += 1;

        if let Some(gate) = &self.state.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        let failure = |reason: &str, status| FetchError {
            chunk_key: key,
            path: path.to_string(),
            reason: reason.to_string(),
            status,
        };
        let injected = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(failure("connection reset", None));
        }
        self.state
            .payloads
            .get(path)
            .cloned()
            .ok_or_else(|| failure("HTTP 404 Not Found", Some(404)))
    }
}

struct Fixture {
    cache: ChunkCache<MemoryFetcher>,
    fetcher: MemoryFetcher,
    gate: Arc<Semaphore>,
}

fn fixture(gated: bool, failures: usize) -> Fixture {
    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/source/en");
    let corpus = load_source_dir(&source).expect("load fixtures");
    let published = partition(corpus.entries).expect("partition");

    let config = CacheConfig::new("en");
    let payloads = published
        .chunks
        .iter()
        .map(|(key, entries)| {
            let path = chunk_path(&config.url_template, &config.locale, *key);
            (path, serde_json::to_vec(&Chunk::build(*key, entries)).unwrap())
        })
        .collect();

    let mut index = published.index.clone();
    // Points at a chunk that does not contain it
    index.insert("ghost-1", key_of("가"));

    let gate = Arc::new(Semaphore::new(0));
    let fetcher = MemoryFetcher {
        state: Arc::new(FetcherState {
            payloads,
            gate: gated.then(|| Arc::clone(&gate)),
            failures_left: AtomicUsize::new(failures),
            ..FetcherState::default()
        }),
    };
    Fixture {
        cache: ChunkCache::new(fetcher.clone(), index, config),
        fetcher,
        gate,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_fetch() {
    let Fixture { cache, fetcher, gate } = fixture(true, 0);
    let key = key_of("가");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.request(key).await })
        })
        .collect();

    // Every caller has either started the fetch or joined it
    wait_until(|| {
        let stats = cache.stats();
        stats.fetches + stats.inflight_joins == 8
    })
    .await;
    assert!(cache.is_pending(key));
    gate.add_permits(1);

    let mut maps = Vec::new();
    for handle in handles {
        maps.push(handle.await.unwrap().expect("request ok"));
    }
    assert_eq!(fetcher.calls(key), 1, "exactly one fetch per key");
    assert!(maps.iter().all(|m| Arc::ptr_eq(m, &maps[0])));
    assert_eq!(maps[0].len(), 3);
    assert_eq!(cache.stats().inflight_joins, 7);
    assert!(cache.is_resolved(key));
}

#[tokio::test]
async fn concurrent_lookups_resolve_to_the_same_entry() {
    let Fixture { cache, fetcher, .. } = fixture(false, 0);

    let (a, b) = tokio::join!(cache.lookup("gamsahamnida-1"), cache.lookup("gamsahamnida-1"));
    let (a, b) = (a.expect("first lookup"), b.expect("second lookup"));

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.translation.word, "thank you");
    assert_eq!(fetcher.calls(key_of("감")), 1);
}

#[tokio::test]
async fn resolved_chunks_are_never_refetched() {
    let Fixture { cache, fetcher, .. } = fixture(false, 0);

    cache.lookup("wifi-1").await.expect("first lookup");
    cache.lookup("3d-1").await.expect("same chunk");
    cache.request(ChunkKey::ETC).await.expect("request");

    assert_eq!(fetcher.calls(ChunkKey::ETC), 1);
    assert_eq!(cache.stats().ready_hits, 2);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn failed_fetch_is_not_cached_and_can_be_retried() {
    let Fixture { cache, fetcher, .. } = fixture(false, 1);
    let key = key_of("물");

    let err = cache.request(key).await.expect_err("injected failure");
    match err {
        CacheError::Fetch(e) => {
            assert_eq!(e.chunk_key, key);
            assert_eq!(e.path, "/data/chunks/en/entries-ㅁ.json");
        }
        other => panic!("expected a fetch error, got {:?}", other),
    }
    assert!(!cache.is_pending(key));
    assert!(!cache.is_resolved(key));

    let entry = cache.lookup("mul-1").await.expect("retry succeeds");
    assert_eq!(entry.translation.word, "water");
    assert_eq!(fetcher.calls(key), 2);
    assert_eq!(cache.stats().failures, 1);
}

#[tokio::test]
async fn missing_artifact_surfaces_the_status() {
    let Fixture { cache, .. } = fixture(false, 0);
    match cache.request(key_of("하늘")).await {
        Err(CacheError::Fetch(e)) => assert_eq!(e.status, Some(404)),
        other => panic!("expected a 404, got {:?}", other.map(|m| m.len())),
    }
}

#[tokio::test]
async fn lookup_errors_are_distinct() {
    let Fixture { cache, fetcher, .. } = fixture(false, 0);

    assert_eq!(
        cache.lookup("unknown-1").await.unwrap_err(),
        CacheError::NotIndexed { id: "unknown-1".into() }
    );
    assert_eq!(fetcher.total_calls(), 0, "an unindexed id must not fetch");

    assert_eq!(
        cache.lookup("ghost-1").await.unwrap_err(),
        CacheError::NotFound {
            id: "ghost-1".into(),
            chunk_key: key_of("가"),
        }
    );
    assert!(cache.is_resolved(key_of("가")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_discards_inflight_results() {
    let Fixture { cache, fetcher, gate } = fixture(true, 0);
    let key = ChunkKey::ETC;

    let waiting = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request(key).await })
    };
    wait_until(|| fetcher.calls(key) == 1).await;

    cache.clear();
    assert!(!cache.is_pending(key));
    gate.add_permits(1);

    // The original caller still gets its data
    let map = waiting.await.unwrap().expect("in-flight caller resolves");
    assert_eq!(map.len(), 2);
    // But the cache does not keep it
    assert!(!cache.is_resolved(key));
    assert!(cache.is_empty());

    cache.request(key).await.expect("fresh fetch");
    assert_eq!(fetcher.calls(key), 2);
    assert!(cache.is_resolved(key));
}

#[tokio::test]
async fn malformed_entry_is_reported_as_a_decode_error() {
    let config = CacheConfig::new("en");
    let key = key_of("가");
    let chunk = json!({
        "metadata": { "version": 2, "chunkKey": "ㄱ", "entryCount": 2, "categoryId": "greetings" },
        "entries": [
            { "i": "gada-1", "k": "가다", "r": "gada", "s": 1, "t": { "w": "to go", "x": "to move away" } },
            { "i": "gabang-1", "k": "가방", "r": "gabang", "s": "noun", "t": { "w": "bag", "x": "a bag" } }
        ]
    });
    let fetcher = MemoryFetcher {
        state: Arc::new(FetcherState {
            payloads: HashMap::from([(
                chunk_path(&config.url_template, &config.locale, key),
                serde_json::to_vec(&chunk).unwrap(),
            )]),
            ..FetcherState::default()
        }),
    };
    let index: StaticEntryIndex = [("gada-1", key), ("gabang-1", key), ("gage-1", key)]
        .into_iter()
        .collect();
    let cache = ChunkCache::new(fetcher.clone(), index, config);

    let entry = cache.lookup("gada-1").await.expect("valid entry");
    assert_eq!(entry.translation.word, "to go");

    match cache.lookup("gabang-1").await {
        Err(CacheError::Decode { chunk_key, source }) => {
            assert_eq!(chunk_key, key);
            assert_eq!(source.entry_id, "gabang-1");
            assert_eq!(source.field, "s");
        }
        other => panic!("expected a decode error, got {:?}", other),
    }
    // Only an id the chunk never mentioned points at a stale index
    assert_eq!(
        cache.lookup("gage-1").await.unwrap_err(),
        CacheError::NotFound {
            id: "gage-1".into(),
            chunk_key: key,
        }
    );
    assert_eq!(fetcher.calls(key), 1);
    assert_eq!(cache.stats().failures, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_after_a_clear_are_still_counted() {
    let Fixture { cache, fetcher, gate } = fixture(true, 1);
    let key = ChunkKey::ETC;

    let waiting = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request(key).await })
    };
    wait_until(|| fetcher.calls(key) == 1).await;
    cache.clear();
    gate.add_permits(1);

    let err = waiting.await.unwrap().expect_err("injected failure");
    assert!(matches!(err, CacheError::Fetch(_)));
    assert_eq!(cache.stats().failures, 1);
    assert!(!cache.is_pending(key));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_fetch_still_populates_the_cache() {
    let Fixture { cache, fetcher, gate } = fixture(true, 0);
    let key = key_of("안녕");

    let caller = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request(key).await })
    };
    wait_until(|| fetcher.calls(key) == 1).await;
    caller.abort();
    gate.add_permits(1);

    wait_until(|| cache.is_resolved(key)).await;
    let entry = cache.lookup("annyeong-1").await.expect("served from cache");
    assert!(entry.has_dialogue_example);
    assert_eq!(fetcher.calls(key), 1);
}

#[tokio::test]
async fn preload_warms_and_never_fails() {
    let Fixture { cache, fetcher, .. } = fixture(false, 0);

    cache.preload("까마귀").await;
    assert!(cache.is_resolved(key_of("까치")));
    cache.preload("까치").await;
    assert_eq!(fetcher.calls(key_of("까")), 1);

    // No artifact for this key; the failure is swallowed
    cache.preload("하늘").await;
    assert!(!cache.is_resolved(key_of("하늘")));
    assert_eq!(cache.stats().failures, 1);
}
