//! Warm-up scheduler. Repeated triggers for the same endpoint inside a short
//! quiet window collapse into one fetch, and an endpoint already fetched (or
//! in flight) is never fetched again until reset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::fetcher::Fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreloadState {
    Scheduled,
    Done,
}

pub struct Preloader {
    fetcher: Arc<Fetcher>,
    quiet_window: Duration,
    states: Arc<Mutex<HashMap<String, PreloadState>>>,
}

impl Preloader {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self::with_quiet_window(fetcher, Duration::from_millis(100))
    }

    pub fn with_quiet_window(fetcher: Arc<Fetcher>, quiet_window: Duration) -> Self {
        Self {
            fetcher,
            quiet_window,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request a warm-up for an endpoint. The first trigger arms a timer;
    /// further triggers before it fires are absorbed.
    pub fn schedule(&self, endpoint: &str) {
        {
            let mut states = self.states.lock().unwrap();
            if states.contains_key(endpoint) {
                return;
            }
            states.insert(endpoint.to_string(), PreloadState::Scheduled);
        }

        let fetcher = self.fetcher.clone();
        let states = self.states.clone();
        let endpoint = endpoint.to_string();
        let quiet_window = self.quiet_window;

        tokio::spawn(async move {
            tokio::time::sleep(quiet_window).await;
            if let Err(e) = fetcher.fetch(&endpoint).await {
                log::debug!("Preload of '{}' failed: {}", endpoint, e);
            }
            states
                .lock()
                .unwrap()
                .insert(endpoint, PreloadState::Done);
        });
    }

    /// Schedule the full endpoint set of a journal in one call.
    pub fn schedule_all<I, S>(&self, endpoints: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for endpoint in endpoints {
            self.schedule(endpoint.as_ref());
        }
    }

    /// Forget an endpoint so a later trigger fetches again.
    pub fn reset(&self, endpoint: &str) {
        self.states.lock().unwrap().remove(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::fetcher::FetchFn;

    fn counting_fetcher(calls: Arc<AtomicUsize>) -> Arc<Fetcher> {
        let transport: FetchFn = Arc::new(move |key: String| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "endpoint": key }))
            }
            .boxed()
        });
        // Zero dedupe interval: every fetch the preloader lets through counts.
        Arc::new(Fetcher::with_timing(
            transport,
            Duration::ZERO,
            1,
            Duration::from_millis(1),
        ))
    }

    #[tokio::test]
    async fn burst_of_triggers_fires_one_fetch_per_endpoint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let preloader =
            Preloader::with_quiet_window(counting_fetcher(calls.clone()), Duration::from_millis(20));

        for _ in 0..5 {
            preloader.schedule("/api/journals/j1/assets");
            preloader.schedule("/api/journals/j1/trades");
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn completed_endpoint_is_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let preloader =
            Preloader::with_quiet_window(counting_fetcher(calls.clone()), Duration::from_millis(5));

        preloader.schedule("/api/journals/j1/setups");
        tokio::time::sleep(Duration::from_millis(40)).await;

        preloader.schedule("/api/journals/j1/setups");
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_allows_a_fresh_preload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let preloader =
            Preloader::with_quiet_window(counting_fetcher(calls.clone()), Duration::from_millis(5));

        preloader.schedule("/api/journals/j1/assets");
        tokio::time::sleep(Duration::from_millis(40)).await;

        preloader.reset("/api/journals/j1/assets");
        preloader.schedule("/api/journals/j1/assets");
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn schedule_all_covers_every_endpoint_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let preloader =
            Preloader::with_quiet_window(counting_fetcher(calls.clone()), Duration::from_millis(5));

        let endpoints = ["/a", "/b", "/c"];
        preloader.schedule_all(endpoints);
        preloader.schedule_all(endpoints);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
