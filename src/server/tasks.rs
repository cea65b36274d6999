//! Submitted-but-unclaimed scrape tasks.
//!
//! `POST /spider` stores a request under a fresh id; the first
//! `GET /spider/:task_id` claims it. Entries that are never claimed expire.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::ScrapeRequest;

/// Default lifetime of an unclaimed task (10 minutes).
pub const DEFAULT_TASK_TTL: Duration = Duration::from_secs(600);

/// A stored request with its expiration time.
struct TaskEntry {
    request: ScrapeRequest,
    expires_at: Instant,
}

impl TaskEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Task id → request map with single-use claims.
pub struct TaskStore {
    tasks: RwLock<HashMap<String, TaskEntry>>,
    ttl: Duration,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TASK_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Store `request` and return its task id.
    pub fn insert(&self, request: ScrapeRequest) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut guard = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, entry| !entry.is_expired());
        guard.insert(
            id.clone(),
            TaskEntry {
                request,
                expires_at: Instant::now() + self.ttl,
            },
        );
        id
    }

    /// Take the request for `id`. Each task can be claimed once.
    pub fn claim(&self, id: &str) -> Option<ScrapeRequest> {
        let mut guard = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let entry = guard.remove(id)?;
        if entry.is_expired() {
            None
        } else {
            Some(entry.request)
        }
    }

    /// Number of pending (possibly expired) tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
