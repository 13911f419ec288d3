//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::emotions::MAX_EMOTION_TAGS;

/// Default emotion map shipped with the plugin: display tag → category slug.
pub const DEFAULT_EMOTIONS: &[(&str, &str)] = &[
    ("生气", "angry"),
    ("开心", "happy"),
    ("悲伤", "sad"),
    ("惊讶", "surprised"),
    ("疑惑", "confused"),
    ("色色", "color"),
    ("色", "color"),
    ("死机", "cpu"),
    ("笨蛋", "fool"),
    ("给钱", "givemoney"),
    ("喜欢", "like"),
    ("看", "see"),
    ("害羞", "shy"),
    ("下班", "work"),
    ("剪刀", "scissors"),
    ("不回我", "reply"),
    ("喵", "meow"),
    ("八嘎", "baka"),
    ("早", "morning"),
    ("睡觉", "sleep"),
    ("唉", "sigh"),
];

/// Meme sender configuration.
#[derive(Debug, Clone)]
pub struct MemeConfig {
    /// Root directory holding one subdirectory per category slug.
    pub meme_root: PathBuf,
    /// Persisted emotion map (flat JSON object, tag → slug).
    pub emotions_file: PathBuf,
    /// How long an upload session stays open after the start command.
    pub session_ttl: Duration,
    /// Per-image timeout for remote fetches.
    pub fetch_timeout: Duration,
    /// Maximum number of emotion tags taken from a single response, at most
    /// [`MAX_EMOTION_TAGS`].
    pub max_emotions: usize,
}

impl Default for MemeConfig {
    fn default() -> Self {
        Self {
            meme_root: PathBuf::from("./memes"),
            emotions_file: PathBuf::from("./emotions.json"),
            session_ttl: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
            max_emotions: MAX_EMOTION_TAGS,
        }
    }
}

impl MemeConfig {
    /// Build from `MEME_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let meme_root = std::env::var("MEME_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.meme_root);

        let emotions_file = std::env::var("MEME_EMOTIONS_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.emotions_file);

        let session_ttl = std::env::var("MEME_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        let fetch_timeout = std::env::var("MEME_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);

        let max_emotions = std::env::var("MEME_MAX_EMOTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| (1..=MAX_EMOTION_TAGS).contains(n))
            .unwrap_or(defaults.max_emotions);

        Self {
            meme_root,
            emotions_file,
            session_ttl,
            fetch_timeout,
            max_emotions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plugin_behaviour() {
        let config = MemeConfig::default();
        assert_eq!(config.session_ttl, Duration::from_secs(30));
        assert_eq!(config.max_emotions, 2);
        assert_eq!(config.meme_root, PathBuf::from("./memes"));
    }

    #[test]
    fn default_emotions_have_unique_tags() {
        let mut tags: Vec<&str> = DEFAULT_EMOTIONS.iter().map(|(t, _)| *t).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), DEFAULT_EMOTIONS.len());
    }
}
