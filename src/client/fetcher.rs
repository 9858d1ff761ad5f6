//! Keyed fetch layer. One request per key at a time, recent results reused
//! inside a deduping interval, failures retried with backoff, and a
//! generation counter so a superseded response never overwrites newer state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;

/// Transport error surfaced to the caller. Cloneable so concurrent waiters
/// on the same in-flight request all receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Missing resources are definitive; retrying cannot help.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

pub type FetchResult = Result<Value, FetchError>;

/// The transport: maps a resource key (a request path) to a response body.
pub type FetchFn = Arc<dyn Fn(String) -> BoxFuture<'static, FetchResult> + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
struct Entry {
    data: Option<Value>,
    error: Option<FetchError>,
    fetched_at: Option<Instant>,
    generation: u64,
    in_flight: Option<SharedFetch>,
}

/// Defaults: 5s deduping interval, 3 attempts, 50ms base backoff.
pub struct Fetcher {
    fetch: FetchFn,
    dedupe_interval: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl Fetcher {
    pub fn new(fetch: FetchFn) -> Self {
        Self::with_timing(fetch, Duration::from_secs(5), 3, Duration::from_millis(50))
    }

    pub fn with_timing(
        fetch: FetchFn,
        dedupe_interval: Duration,
        max_attempts: u32,
        base_backoff: Duration,
    ) -> Self {
        Self {
            fetch,
            dedupe_interval,
            max_attempts: max_attempts.max(1),
            base_backoff,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A transport over HTTP: `key` is appended to `base_url`, the bearer
    /// token attached, and the JSON body returned.
    pub fn http_transport(client: reqwest::Client, base_url: String, token: String) -> FetchFn {
        Arc::new(move |key: String| {
            let client = client.clone();
            let url = format!("{}{}", base_url, key);
            let token = token.clone();
            async move {
                let response = client
                    .get(&url)
                    .bearer_auth(&token)
                    .send()
                    .await
                    .map_err(|e| FetchError::new(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::with_status(
                        status.as_u16(),
                        format!("Request to {} failed", url),
                    ));
                }
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| FetchError::new(e.to_string()))
            }
            .boxed()
        })
    }

    /// Fetch a key, reusing a recent result inside the deduping interval and
    /// joining any request already in flight for the same key.
    pub async fn fetch(&self, key: &str) -> FetchResult {
        self.fetch_inner(key, false).await
    }

    /// Fetch bypassing the deduping interval. Any response still in flight
    /// from before this call is superseded and will not be stored.
    pub async fn refetch(&self, key: &str) -> FetchResult {
        self.fetch_inner(key, true).await
    }

    async fn fetch_inner(&self, key: &str, force: bool) -> FetchResult {
        let shared = {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(key.to_string()).or_default();

            if !force {
                if let (Some(data), Some(at)) = (&entry.data, entry.fetched_at) {
                    if at.elapsed() < self.dedupe_interval {
                        return Ok(data.clone());
                    }
                }
            }

            match (&entry.in_flight, force) {
                (Some(in_flight), false) => in_flight.clone(),
                _ => {
                    entry.generation += 1;
                    let shared = Self::spawn_request(
                        self.fetch.clone(),
                        self.entries.clone(),
                        key.to_string(),
                        entry.generation,
                        self.max_attempts,
                        self.base_backoff,
                    );
                    entry.in_flight = Some(shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    fn spawn_request(
        fetch: FetchFn,
        entries: Arc<Mutex<HashMap<String, Entry>>>,
        key: String,
        generation: u64,
        max_attempts: u32,
        base_backoff: Duration,
    ) -> SharedFetch {
        async move {
            let result = Self::fetch_with_retry(&fetch, &key, max_attempts, base_backoff).await;

            let mut entries = entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(&key) {
                // A later request owns this key now; drop our result.
                if entry.generation == generation {
                    entry.in_flight = None;
                    entry.fetched_at = Some(Instant::now());
                    match &result {
                        Ok(data) => {
                            entry.data = Some(data.clone());
                            entry.error = None;
                        }
                        Err(e) => entry.error = Some(e.clone()),
                    }
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    async fn fetch_with_retry(
        fetch: &FetchFn,
        key: &str,
        max_attempts: u32,
        base_backoff: Duration,
    ) -> FetchResult {
        let mut attempt = 0;
        loop {
            match (fetch)(key.to_string()).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(e);
                    }
                    log::debug!("Retrying '{}' after failure: {}", key, e);
                    tokio::time::sleep(base_backoff * 2u32.pow(attempt - 1)).await;
                }
            }
        }
    }

    /// Last successfully fetched body for a key, if any.
    pub fn cached(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .and_then(|e| e.data.clone())
    }

    /// Last error recorded for a key, cleared by the next success.
    pub fn last_error(&self, key: &str) -> Option<FetchError> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .and_then(|e| e.error.clone())
    }

    /// Forget everything cached for a key.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_transport(calls: Arc<AtomicUsize>) -> FetchFn {
        Arc::new(move |key: String| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "key": key }))
            }
            .boxed()
        })
    }

    fn fast_fetcher(fetch: FetchFn) -> Fetcher {
        Fetcher::with_timing(fetch, Duration::from_secs(5), 3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slow_calls = calls.clone();
        let transport: FetchFn = Arc::new(move |key: String| {
            let calls = slow_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(json!({ "key": key }))
            }
            .boxed()
        });
        let fetcher = Arc::new(fast_fetcher(transport));

        let a = fetcher.clone();
        let b = fetcher.clone();
        let (ra, rb) = tokio::join!(
            async move { a.fetch("/trades").await },
            async move { b.fetch("/trades").await }
        );

        assert_eq!(ra.unwrap(), rb.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeat_fetch_inside_dedupe_interval_uses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = fast_fetcher(counting_transport(calls.clone()));

        fetcher.fetch("/assets").await.unwrap();
        fetcher.fetch("/assets").await.unwrap();
        fetcher.fetch("/assets").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refetch_bypasses_the_dedupe_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = fast_fetcher(counting_transport(calls.clone()));

        fetcher.fetch("/assets").await.unwrap();
        fetcher.refetch("/assets").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let attempt_calls = calls.clone();
        let transport: FetchFn = Arc::new(move |_key: String| {
            let calls = attempt_calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FetchError::with_status(500, "flaky"))
                } else {
                    Ok(json!("ok"))
                }
            }
            .boxed()
        });
        let fetcher = fast_fetcher(transport);

        assert_eq!(fetcher.fetch("/stats").await.unwrap(), json!("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_never_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let nf_calls = calls.clone();
        let transport: FetchFn = Arc::new(move |_key: String| {
            let calls = nf_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::with_status(404, "gone"))
            }
            .boxed()
        });
        let fetcher = fast_fetcher(transport);

        let err = fetcher.fetch("/trades/unknown").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn superseded_response_does_not_overwrite_newer_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gen_calls = calls.clone();
        // First request is slow and returns "old"; the second is immediate.
        let transport: FetchFn = Arc::new(move |_key: String| {
            let calls = gen_calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(json!("old"))
                } else {
                    Ok(json!("new"))
                }
            }
            .boxed()
        });
        let fetcher = Arc::new(fast_fetcher(transport));

        let slow = fetcher.clone();
        let first = tokio::spawn(async move { slow.fetch("/trades").await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(fetcher.refetch("/trades").await.unwrap(), json!("new"));

        // The slow response arrives late; its caller sees it, the cache does not.
        assert_eq!(first.await.unwrap().unwrap(), json!("old"));
        assert_eq!(fetcher.cached("/trades"), Some(json!("new")));
    }

    #[tokio::test]
    async fn error_is_recorded_and_cleared_on_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seq_calls = calls.clone();
        let transport: FetchFn = Arc::new(move |_key: String| {
            let calls = seq_calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::with_status(404, "not yet"))
                } else {
                    Ok(json!("ready"))
                }
            }
            .boxed()
        });
        let fetcher = fast_fetcher(transport);

        assert!(fetcher.fetch("/assets").await.is_err());
        assert!(fetcher.last_error("/assets").is_some());

        fetcher.refetch("/assets").await.unwrap();
        assert!(fetcher.last_error("/assets").is_none());
        assert_eq!(fetcher.cached("/assets"), Some(json!("ready")));
    }
}
