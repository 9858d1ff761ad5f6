//! In-process HTTP response cache: a capacity-bounded LRU map keyed by
//! path + query + owner marker, with generated validators, tag-based bulk
//! invalidation and per-route freshness windows.
//!
//! The cache is purely a latency optimization over the database, which always
//! holds the authoritative data; a process restart clears it entirely.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_CAPACITY: usize = 2000;

/// Per-route cache policy.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub duration: Duration,
    pub stale_while_revalidate: Option<Duration>,
    pub visibility: Visibility,
    pub tags: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

/// Route presets mirroring how long each resource family stays useful.
pub mod configs {
    use super::{CacheConfig, Visibility};
    use std::time::Duration;

    pub const REFERENCE_DATA: CacheConfig = CacheConfig {
        duration: Duration::from_secs(10 * 60),
        stale_while_revalidate: Some(Duration::from_secs(30 * 60)),
        visibility: Visibility::Private,
        tags: &["reference-data"],
    };

    pub const TRADES: CacheConfig = CacheConfig {
        duration: Duration::from_secs(2 * 60),
        stale_while_revalidate: Some(Duration::from_secs(10 * 60)),
        visibility: Visibility::Private,
        tags: &["trades"],
    };

    pub const STATS: CacheConfig = CacheConfig {
        duration: Duration::from_secs(60),
        stale_while_revalidate: Some(Duration::from_secs(5 * 60)),
        visibility: Visibility::Private,
        tags: &["stats"],
    };

    pub const JOURNALS: CacheConfig = CacheConfig {
        duration: Duration::from_secs(5 * 60),
        stale_while_revalidate: Some(Duration::from_secs(15 * 60)),
        visibility: Visibility::Private,
        tags: &["journals"],
    };
}

/// The request-derived identity and conditional validators for a lookup.
#[derive(Debug, Clone, Default)]
pub struct CachedRequest {
    pub path: String,
    pub query: String,
    /// Opaque per-owner marker; two owners never share an entry.
    pub user_marker: Option<String>,
    pub if_none_match: Option<String>,
    /// Epoch millis parsed from an If-Modified-Since header.
    pub if_modified_since: Option<i64>,
}

impl CachedRequest {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_marker = Some(user_id.into());
        self
    }

    fn cache_key(&self) -> String {
        match &self.user_marker {
            Some(user) => format!("{}{}_user_{}", self.path, self.query, user),
            None => format!("{}{}", self.path, self.query),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Headers to attach to an outgoing response built from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub etag: String,
    /// Epoch millis of the entry's last store.
    pub last_modified: i64,
    pub cache_control: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Conditional validator matched; respond 304 without a body.
    NotModified,
    Hit {
        data: Value,
        headers: CacheHeaders,
        freshness: Freshness,
    },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    /// Epoch millis at store time.
    timestamp: i64,
    etag: String,
}

/// Least-recently-used map. Insertion or access moves a key to the
/// most-recently-used position; exceeding capacity evicts the LRU key.
struct LruMap {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

impl LruMap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        if self.entries.contains_key(key) {
            self.touch(key);
        }
        self.entries.get(key)
    }

    /// Insert, returning the evicted LRU key if capacity was exceeded.
    fn insert(&mut self, key: String, entry: CacheEntry) -> Option<String> {
        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.entries.insert(key.clone(), entry);
        self.touch(&key);
        evicted
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
            true
        } else {
            false
        }
    }

    fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

struct CacheInner {
    lru: LruMap,
    /// tag -> set of cache keys registered under it.
    tags: HashMap<String, HashSet<String>>,
}

/// The response cache service. Constructed explicitly and injected wherever
/// it is needed; tests instantiate isolated caches.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub tags: usize,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruMap::new(capacity),
                tags: HashMap::new(),
            }),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    fn generate_etag(data: &Value) -> String {
        let serialized = serde_json::to_vec(data).unwrap_or_default();
        let digest = Sha256::digest(&serialized);
        let encoded = BASE64.encode(digest);
        format!("\"{}\"", &encoded[..16])
    }

    fn cache_control(config: &CacheConfig) -> String {
        let visibility = match config.visibility {
            Visibility::Private => "private",
            Visibility::Public => "public",
        };
        let max_age = config.duration.as_secs();
        match config.stale_while_revalidate {
            Some(swr) if swr.as_secs() > 0 => format!(
                "{}, max-age={}, stale-while-revalidate={}",
                visibility,
                max_age,
                swr.as_secs()
            ),
            _ => format!("{}, max-age={}", visibility, max_age),
        }
    }

    /// Look up a cached response. `None` is a miss (including expiry).
    pub fn get(&self, request: &CachedRequest, config: &CacheConfig) -> Option<CacheLookup> {
        let key = request.cache_key();
        let mut inner = self.inner.lock().unwrap();

        let entry = inner.lru.get(&key)?.clone();

        // Conditional short-circuit: matching validator or a modification
        // time at/after the stored timestamp means the caller's copy is
        // still good. HTTP dates carry second precision, so the stored
        // millisecond timestamp is truncated before comparing.
        if request.if_none_match.as_deref() == Some(entry.etag.as_str())
            || request
                .if_modified_since
                .map(|since| since >= entry.timestamp / 1000 * 1000)
                .unwrap_or(false)
        {
            return Some(CacheLookup::NotModified);
        }

        let now = now_millis();
        let age = Duration::from_millis((now - entry.timestamp).max(0) as u64);

        let expired = age > config.duration;
        let serve_window = config.stale_while_revalidate.unwrap_or(config.duration);

        if expired && age > serve_window {
            // Past even the stale-while-revalidate extension: evict.
            inner.lru.remove(&key);
            remove_tag_memberships(&mut inner.tags, &key);
            return None;
        }

        let freshness = if expired {
            Freshness::Stale
        } else {
            Freshness::Fresh
        };

        Some(CacheLookup::Hit {
            data: entry.data,
            headers: CacheHeaders {
                etag: entry.etag,
                last_modified: entry.timestamp,
                cache_control: Self::cache_control(config),
            },
            freshness,
        })
    }

    /// Store a response body, returning the headers to attach to it.
    pub fn set(&self, request: &CachedRequest, data: Value, config: &CacheConfig) -> CacheHeaders {
        let key = request.cache_key();
        let etag = Self::generate_etag(&data);
        let timestamp = now_millis();

        let mut inner = self.inner.lock().unwrap();

        // Replacing an entry resets its tag memberships.
        remove_tag_memberships(&mut inner.tags, &key);

        let evicted = inner.lru.insert(
            key.clone(),
            CacheEntry {
                data,
                timestamp,
                etag: etag.clone(),
            },
        );
        if let Some(evicted_key) = evicted {
            remove_tag_memberships(&mut inner.tags, &evicted_key);
        }

        for tag in config.tags {
            inner
                .tags
                .entry((*tag).to_string())
                .or_default()
                .insert(key.clone());
        }

        CacheHeaders {
            etag,
            last_modified: timestamp,
            cache_control: Self::cache_control(config),
        }
    }

    /// Delete every key registered under `tag`. Returns the removed count.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut inner = self.inner.lock().unwrap();

        let Some(keys) = inner.tags.remove(tag) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            if inner.lru.remove(&key) {
                removed += 1;
            }
            remove_tag_memberships(&mut inner.tags, &key);
        }
        removed
    }

    /// Delete every key matching `pattern`. Returns the removed count.
    pub fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        let mut inner = self.inner.lock().unwrap();

        let matching: Vec<String> = inner
            .lru
            .keys()
            .into_iter()
            .filter(|key| pattern.is_match(key))
            .collect();

        let mut removed = 0;
        for key in matching {
            if inner.lru.remove(&key) {
                removed += 1;
            }
            remove_tag_memberships(&mut inner.tags, &key);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            size: inner.lru.len(),
            tags: inner.tags.len(),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.lru.clear();
        inner.tags.clear();
    }
}

fn remove_tag_memberships(tags: &mut HashMap<String, HashSet<String>>, key: &str) {
    tags.retain(|_, keys| {
        keys.remove(key);
        !keys.is_empty()
    });
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(duration_ms: u64, swr_ms: Option<u64>, tags: &'static [&'static str]) -> CacheConfig {
        CacheConfig {
            duration: Duration::from_millis(duration_ms),
            stale_while_revalidate: swr_ms.map(Duration::from_millis),
            visibility: Visibility::Private,
            tags,
        }
    }

    fn request(path: &str) -> CachedRequest {
        CachedRequest::new(path, "").for_user("user-1")
    }

    #[test]
    fn set_then_get_returns_identical_fresh_data() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &["trades"]);
        let req = request("/api/journals/j1/trades");
        let body = json!({"trades": [{"id": "t1", "profit_loss_amount": 2.5}]});

        cache.set(&req, body.clone(), &cfg);

        match cache.get(&req, &cfg) {
            Some(CacheLookup::Hit {
                data, freshness, ..
            }) => {
                assert_eq!(data, body);
                assert_eq!(freshness, Freshness::Fresh);
            }
            other => panic!("expected fresh hit, got {:?}", other),
        }
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &[]);
        assert!(cache.get(&request("/api/journals/j1/assets"), &cfg).is_none());
    }

    #[test]
    fn expired_entry_is_evicted_and_removed_from_tag_index() {
        let cache = ResponseCache::new(10);
        let cfg = config(10, None, &["trades"]);
        let req = request("/api/journals/j1/trades");

        cache.set(&req, json!({"trades": []}), &cfg);
        std::thread::sleep(Duration::from_millis(30));

        assert!(cache.get(&req, &cfg).is_none());
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().tags, 0);
        // The tag no longer holds anything to invalidate.
        assert_eq!(cache.invalidate_by_tag("trades"), 0);
    }

    #[test]
    fn entry_inside_swr_window_is_served_stale() {
        let cache = ResponseCache::new(10);
        let cfg = config(10, Some(60_000), &["trades"]);
        let req = request("/api/journals/j1/trades");

        cache.set(&req, json!({"trades": []}), &cfg);
        std::thread::sleep(Duration::from_millis(30));

        match cache.get(&req, &cfg) {
            Some(CacheLookup::Hit { freshness, .. }) => {
                assert_eq!(freshness, Freshness::Stale)
            }
            other => panic!("expected stale hit, got {:?}", other),
        }
    }

    #[test]
    fn matching_etag_returns_not_modified() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &[]);
        let req = request("/api/journals/j1/assets");

        let headers = cache.set(&req, json!({"assets": []}), &cfg);

        let mut conditional = req.clone();
        conditional.if_none_match = Some(headers.etag.clone());

        assert_eq!(
            cache.get(&conditional, &cfg),
            Some(CacheLookup::NotModified)
        );
    }

    #[test]
    fn if_modified_since_at_or_after_store_returns_not_modified() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &[]);
        let req = request("/api/journals/j1/assets");

        let headers = cache.set(&req, json!({"assets": []}), &cfg);

        let mut conditional = req.clone();
        conditional.if_modified_since = Some(headers.last_modified);

        assert_eq!(
            cache.get(&conditional, &cfg),
            Some(CacheLookup::NotModified)
        );
    }

    #[test]
    fn if_modified_since_matches_at_second_precision() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &[]);
        let req = request("/api/journals/j1/assets");

        let headers = cache.set(&req, json!({"assets": []}), &cfg);

        // An HTTP date loses the millisecond part of the stored timestamp.
        let mut conditional = req.clone();
        conditional.if_modified_since = Some(headers.last_modified / 1000 * 1000);

        assert_eq!(
            cache.get(&conditional, &cfg),
            Some(CacheLookup::NotModified)
        );
    }

    #[test]
    fn tag_invalidation_is_selective() {
        let cache = ResponseCache::new(10);
        let trades_cfg = config(60_000, None, &["trades"]);
        let ref_cfg = config(60_000, None, &["reference-data"]);

        cache.set(&request("/api/journals/j1/trades"), json!({"trades": []}), &trades_cfg);
        cache.set(&request("/api/journals/j1/assets"), json!({"assets": []}), &ref_cfg);
        cache.set(&request("/api/journals/j1/setups"), json!({"setups": []}), &ref_cfg);

        assert_eq!(cache.invalidate_by_tag("trades"), 1);
        assert!(cache.get(&request("/api/journals/j1/trades"), &trades_cfg).is_none());
        assert!(cache.get(&request("/api/journals/j1/assets"), &ref_cfg).is_some());
        assert!(cache.get(&request("/api/journals/j1/setups"), &ref_cfg).is_some());
    }

    #[test]
    fn pattern_invalidation_counts_removed_entries() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &["reference-data"]);

        cache.set(&request("/api/journals/j1/assets"), json!({"assets": []}), &cfg);
        cache.set(&request("/api/journals/j2/assets"), json!({"assets": []}), &cfg);
        cache.set(&request("/api/journals/j2/setups"), json!({"setups": []}), &cfg);

        let pattern = Regex::new(r"/api/journals/j2/").unwrap();
        assert_eq!(cache.invalidate_by_pattern(&pattern), 2);
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn lru_capacity_evicts_least_recently_used() {
        let cache = ResponseCache::new(2);
        let cfg = config(60_000, None, &["reference-data"]);

        let a = request("/a");
        let b = request("/b");
        let c = request("/c");

        cache.set(&a, json!(1), &cfg);
        cache.set(&b, json!(2), &cfg);
        // Touch /a so /b becomes least recently used.
        assert!(cache.get(&a, &cfg).is_some());
        cache.set(&c, json!(3), &cfg);

        assert!(cache.get(&b, &cfg).is_none(), "LRU key should be evicted");
        assert!(cache.get(&a, &cfg).is_some());
        assert!(cache.get(&c, &cfg).is_some());
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn owners_never_share_entries() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &[]);

        let for_alice = CachedRequest::new("/api/journals/j1/trades", "").for_user("alice");
        let for_bob = CachedRequest::new("/api/journals/j1/trades", "").for_user("bob");

        cache.set(&for_alice, json!({"trades": ["alice"]}), &cfg);

        assert!(cache.get(&for_bob, &cfg).is_none());
    }

    #[test]
    fn query_string_is_part_of_the_key() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &[]);

        let unpaginated = request("/api/journals/j1/trades");
        let mut paginated = request("/api/journals/j1/trades");
        paginated.query = "?page=2&limit=50".to_string();

        cache.set(&unpaginated, json!({"trades": ["all"]}), &cfg);
        assert!(cache.get(&paginated, &cfg).is_none());
    }

    #[test]
    fn replacing_an_entry_refreshes_its_etag() {
        let cache = ResponseCache::new(10);
        let cfg = config(60_000, None, &["trades"]);
        let req = request("/api/journals/j1/trades");

        let first = cache.set(&req, json!({"trades": []}), &cfg);
        let second = cache.set(&req, json!({"trades": [{"id": "t1"}]}), &cfg);

        assert_ne!(first.etag, second.etag);
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn cache_control_reflects_config() {
        let cfg = config(120_000, Some(600_000), &[]);
        assert_eq!(
            ResponseCache::cache_control(&cfg),
            "private, max-age=120, stale-while-revalidate=600"
        );

        let public = CacheConfig {
            visibility: Visibility::Public,
            stale_while_revalidate: None,
            ..cfg
        };
        assert_eq!(ResponseCache::cache_control(&public), "public, max-age=120");
    }
}
