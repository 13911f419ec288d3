//! Upload sessions — a per-user, short-lived window in which the next
//! message is treated as meme uploads.
//!
//! Idle → Active on a valid start command. Active → Idle when the session
//! is consumed by an event, found expired, or cancelled. Expiry is checked
//! lazily whenever a session is touched.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::message::SessionKey;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Useful for driving expiry in
/// tests.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// An open upload window for one user in one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Display tag the user asked for.
    pub tag: String,
    /// Category slug images are saved under.
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Observable state for one session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active(UploadSession),
}

/// Result of touching a session key with an incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTouch {
    /// No session for this key.
    None,
    /// The session had lapsed; it has been removed.
    Expired(UploadSession),
    /// The session was live; it has been removed and handed to the caller.
    Active(UploadSession),
}

/// Tracks upload sessions keyed by conversation and sender.
pub struct UploadSessionManager {
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<SessionKey, UploadSession>>,
}

impl UploadSessionManager {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Open a session for `key` if `tag` names a known emotion. Replaces any
    /// session the key already had. On failure nothing changes.
    pub async fn start(
        &self,
        key: &SessionKey,
        tag: Option<&str>,
        emotions: &HashMap<String, String>,
    ) -> Result<UploadSession, ValidationError> {
        let tag = tag
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingCategory)?;
        let category = emotions
            .get(tag)
            .ok_or_else(|| ValidationError::UnknownCategory(tag.to_string()))?;

        let now = self.clock.now();
        let session = UploadSession {
            tag: tag.to_string(),
            category: category.clone(),
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut sessions = self.sessions.lock().await;
        let swept = sweep(&mut sessions, now);
        if swept > 0 {
            debug!(swept, "Dropped lapsed upload sessions");
        }
        let replaced = sessions.insert(key.clone(), session.clone());
        drop(sessions);
        if replaced.is_some() {
            debug!(key = %key, "Replaced existing upload session");
        }
        info!(key = %key, category = %session.category, expires_at = %session.expires_at, "Upload session started");

        Ok(session)
    }

    /// Remove and return the session for `key`, reporting whether it was
    /// still live. Concurrent callers for the same key see it at most once.
    pub async fn take_active(&self, key: &SessionKey) -> SessionTouch {
        let Some(session) = self.sessions.lock().await.remove(key) else {
            return SessionTouch::None;
        };

        if session.is_expired_at(self.clock.now()) {
            info!(key = %key, category = %session.category, "Upload session expired");
            SessionTouch::Expired(session)
        } else {
            SessionTouch::Active(session)
        }
    }

    /// Current state for `key`. An expired session found here is removed.
    pub async fn state(&self, key: &SessionKey) -> SessionState {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(key) {
            Some(s) if s.is_expired_at(self.clock.now()) => {
                sessions.remove(key);
                SessionState::Idle
            }
            Some(s) => SessionState::Active(s.clone()),
            None => SessionState::Idle,
        }
    }

    /// Close a session without ingesting anything.
    pub async fn cancel(&self, key: &SessionKey) -> bool {
        self.sessions.lock().await.remove(key).is_some()
    }

    /// Remove every expired session. Returns how many were removed. Also
    /// run whenever a session is started.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        sweep(&mut *self.sessions.lock().await, now)
    }

    /// Sessions currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.sessions.lock().await.clear();
    }
}

fn sweep(sessions: &mut HashMap<SessionKey, UploadSession>, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| !s.is_expired_at(now));
    before - sessions.len()
}
