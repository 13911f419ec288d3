//! Response interceptor — strips emotion markers from a generated reply and
//! parks the tags until the message is decorated.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::emotions::{EmotionMatcher, MAX_EMOTION_TAGS};

/// Tags extracted from one reply, waiting to be turned into images.
///
/// Bounded, deduplicated and insertion-ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmotions {
    tags: Vec<String>,
    capacity: usize,
}

impl PendingEmotions {
    /// `capacity` is clamped to `1..=MAX_EMOTION_TAGS`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_EMOTION_TAGS);
        Self {
            tags: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a tag. Returns `false` if it was a duplicate or the list is full.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.tags.len() >= self.capacity || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Holds pending emotions per conversation between the response hook and
/// the decoration hook.
#[derive(Debug)]
pub struct ResponseInterceptor {
    matcher: EmotionMatcher,
    pending: Mutex<HashMap<String, PendingEmotions>>,
}

impl ResponseInterceptor {
    pub fn new(matcher: EmotionMatcher) -> Self {
        Self {
            matcher,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Strip markers from `text` and record its tags for `conversation_id`.
    ///
    /// Any tags still parked for the conversation from an earlier reply are
    /// replaced.
    pub async fn intercept(
        &self,
        conversation_id: &str,
        text: &str,
        emotions: &HashMap<String, String>,
    ) -> String {
        let found = self.matcher.extract(text, emotions);

        let mut pending = PendingEmotions::new(self.matcher.max_tags());
        for tag in found.tags {
            pending.insert(tag);
        }

        let mut map = self.pending.lock().await;
        if pending.is_empty() {
            map.remove(conversation_id);
        } else {
            debug!(conversation = %conversation_id, tags = ?pending.tags(), "Emotions pending");
            map.insert(conversation_id.to_string(), pending);
        }

        found.text
    }

    /// Remove and return the pending tags for a conversation.
    pub async fn take(&self, conversation_id: &str) -> Option<PendingEmotions> {
        self.pending.lock().await.remove(conversation_id)
    }

    /// Drop any pending tags for a conversation.
    pub async fn clear(&self, conversation_id: &str) {
        if self.pending.lock().await.remove(conversation_id).is_some() {
            debug!(conversation = %conversation_id, "Cleared leftover emotions");
        }
    }

    /// Drop pending tags for every conversation.
    pub async fn clear_all(&self) {
        self.pending.lock().await.clear();
    }

    /// Number of conversations with tags waiting.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emotions() -> HashMap<String, String> {
        HashMap::from([
            ("开心".to_string(), "happy".to_string()),
            ("生气".to_string(), "angry".to_string()),
        ])
    }

    #[test]
    fn pending_is_bounded_and_deduplicated() {
        let mut p = PendingEmotions::new(2);
        assert!(p.insert("a"));
        assert!(!p.insert("a"));
        assert!(p.insert("b"));
        assert!(!p.insert("c"));
        assert_eq!(p.tags(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn pending_capacity_never_exceeds_cap() {
        let mut p = PendingEmotions::new(5);
        for tag in ["a", "b", "c", "d"] {
            p.insert(tag);
        }
        assert_eq!(p.len(), MAX_EMOTION_TAGS);
    }

    #[tokio::test]
    async fn intercept_strips_and_parks_tags() {
        let interceptor = ResponseInterceptor::new(EmotionMatcher::default());
        let text = interceptor
            .intercept("c1", "好耶[开心]", &emotions())
            .await;
        assert_eq!(text, "好耶");

        let pending = interceptor.take("c1").await.unwrap();
        assert_eq!(pending.tags(), ["开心".to_string()]);
        assert!(interceptor.take("c1").await.is_none());
    }

    #[tokio::test]
    async fn conversations_do_not_share_pending_state() {
        let interceptor = ResponseInterceptor::new(EmotionMatcher::default());
        interceptor.intercept("c1", "[开心]", &emotions()).await;
        interceptor.intercept("c2", "[生气]", &emotions()).await;

        assert_eq!(interceptor.pending_count().await, 2);
        assert_eq!(
            interceptor.take("c2").await.unwrap().tags(),
            ["生气".to_string()]
        );
        assert_eq!(
            interceptor.take("c1").await.unwrap().tags(),
            ["开心".to_string()]
        );
    }

    #[tokio::test]
    async fn reply_without_tags_drops_stale_entry() {
        let interceptor = ResponseInterceptor::new(EmotionMatcher::default());
        interceptor.intercept("c1", "[开心]", &emotions()).await;
        interceptor.intercept("c1", "plain reply", &emotions()).await;
        assert!(interceptor.take("c1").await.is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let interceptor = ResponseInterceptor::new(EmotionMatcher::default());
        interceptor.intercept("c1", "[开心]", &emotions()).await;
        interceptor.clear("c1").await;
        interceptor.clear("c1").await;
        assert_eq!(interceptor.pending_count().await, 0);
    }
}
