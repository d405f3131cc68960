use crate::domain::rates::{RateRecord, RateSnapshot};
use crate::service::UnknownCurrency;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::Mutex;

pub const DEFAULT_CHAR_CODE: &str = "USD";

/// Per-session UI state. Only the CharCode is kept; the record is re-read from the latest
/// snapshot so a selection never carries a stale rate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    selected: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_char_code(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Selected record, else USD, else the first record.
    pub fn current<'a>(&self, snapshot: &'a RateSnapshot) -> Option<&'a RateRecord> {
        self.selected
            .as_deref()
            .and_then(|code| snapshot.by_char_code(code))
            .or_else(|| snapshot.by_char_code(DEFAULT_CHAR_CODE))
            .or_else(|| snapshot.records.first())
    }

    pub fn select<'a>(
        &mut self,
        snapshot: &'a RateSnapshot,
        char_code: &str,
    ) -> anyhow::Result<&'a RateRecord> {
        let record = snapshot.by_char_code(char_code).ok_or_else(|| UnknownCurrency {
            query: char_code.trim().to_string(),
        })?;
        self.selected = Some(record.char_code.clone());
        Ok(record)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

#[derive(Debug)]
struct Entry {
    ctx: SessionContext,
    last_seen: DateTime<Utc>,
}

/// Session contexts keyed by session id. Sessions idle for `idle_ttl` are dropped, and once
/// `capacity` sessions exist the least recently seen one makes room for a new one.
#[derive(Debug)]
pub struct SessionStore<K> {
    idle_ttl: Duration,
    capacity: usize,
    sessions: Mutex<HashMap<K, Entry>>,
}

impl<K> SessionStore<K>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
{
    pub fn new(idle_ttl: Duration, capacity: usize) -> Self {
        Self {
            idle_ttl,
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn create(&self, id: K, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, now);
        if sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::debug!(session_id = ?oldest, "session store full; oldest session dropped");
            }
        }
        sessions.insert(
            id,
            Entry {
                ctx: SessionContext::new(),
                last_seen: now,
            },
        );
    }

    /// Runs `f` on a live session and marks it seen. `None` for unknown or expired sessions.
    pub async fn with_session<R>(
        &self,
        id: &K,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut SessionContext) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, now);
        let entry = sessions.get_mut(id)?;
        entry.last_seen = now;
        Some(f(&mut entry.ctx))
    }

    pub async fn remove(&self, id: &K) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn evict_idle(&self, sessions: &mut HashMap<K, Entry>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, e| now < e.last_seen + self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "idle sessions evicted");
        }
    }
}
