//! Per-journal resource handle. The four journal resources load
//! independently; consumers render whatever subset has arrived.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use super::fetcher::{FetchError, Fetcher};

const RESOURCES: [&str; 4] = ["assets", "sessions", "setups", "trades"];

/// One resource's current view: present, failed, or still loading.
#[derive(Debug, Clone, Default)]
pub struct ResourceSnapshot {
    pub data: Option<Value>,
    pub error: Option<FetchError>,
}

impl ResourceSnapshot {
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JournalSnapshot {
    pub assets: ResourceSnapshot,
    pub sessions: ResourceSnapshot,
    pub setups: ResourceSnapshot,
    pub trades: ResourceSnapshot,
}

impl JournalSnapshot {
    fn resources(&self) -> [&ResourceSnapshot; 4] {
        [&self.assets, &self.sessions, &self.setups, &self.trades]
    }

    /// True while any resource has neither data nor a recorded failure.
    pub fn is_loading(&self) -> bool {
        self.resources().iter().any(|r| r.is_loading())
    }

    pub fn has_error(&self) -> bool {
        self.resources().iter().any(|r| r.error.is_some())
    }
}

pub struct JournalData {
    fetcher: Arc<Fetcher>,
    journal_id: String,
    enabled: bool,
}

impl JournalData {
    pub fn new(fetcher: Arc<Fetcher>, journal_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            fetcher,
            journal_id: journal_id.into(),
            enabled,
        }
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("/api/journals/{}/{}", self.journal_id, resource)
    }

    pub fn endpoints(&self) -> Vec<String> {
        RESOURCES.iter().map(|r| self.endpoint(r)).collect()
    }

    /// Fetch any resource not yet loaded. Disabled handles never fetch.
    pub async fn load(&self) {
        if !self.enabled {
            return;
        }
        let pending: Vec<_> = RESOURCES
            .iter()
            .map(|r| self.endpoint(r))
            .filter(|e| self.fetcher.cached(e).is_none())
            .collect();
        join_all(pending.iter().map(|e| self.fetcher.fetch(e))).await;
    }

    /// Force-refresh all four resources. Each resolves or fails on its own.
    pub async fn refresh_all(&self) {
        if !self.enabled {
            return;
        }
        let endpoints = self.endpoints();
        join_all(endpoints.iter().map(|e| self.fetcher.refetch(e))).await;
    }

    fn snapshot_of(&self, resource: &str) -> ResourceSnapshot {
        let endpoint = self.endpoint(resource);
        ResourceSnapshot {
            data: self.fetcher.cached(&endpoint),
            error: self.fetcher.last_error(&endpoint),
        }
    }

    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            assets: self.snapshot_of("assets"),
            sessions: self.snapshot_of("sessions"),
            setups: self.snapshot_of("setups"),
            trades: self.snapshot_of("trades"),
        }
    }
}
