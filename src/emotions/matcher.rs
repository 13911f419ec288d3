//! Emotion marker extraction.
//!
//! Generated replies mark emotions inline as `[开心]`, `(开心)` or `（开心）`.
//! Markers whose label is a known tag are stripped from the text and
//! collected; anything else in brackets is left alone.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Delimiter patterns in priority order: square brackets, ASCII
/// parentheses, full-width parentheses.
static MARKER_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\[([^\]]+)\]").unwrap(),
        Regex::new(r"\(([^)]+)\)").unwrap(),
        Regex::new(r"（([^）]+)）").unwrap(),
    ]
});

/// Upper bound on tags taken from a single reply.
pub const MAX_EMOTION_TAGS: usize = 2;

/// Outcome of scanning one reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmotionMatch {
    /// Reply text with recognized markers removed.
    pub text: String,
    /// Recognized tags, first-seen order, no duplicates.
    pub tags: Vec<String>,
}

impl EmotionMatch {
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }
}

/// Extracts emotion tags from free text.
#[derive(Debug, Clone, Copy)]
pub struct EmotionMatcher {
    max_tags: usize,
}

impl EmotionMatcher {
    /// `max_tags` is clamped to `1..=MAX_EMOTION_TAGS`.
    pub fn new(max_tags: usize) -> Self {
        Self {
            max_tags: max_tags.clamp(1, MAX_EMOTION_TAGS),
        }
    }

    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    /// Scan `text` for markers known to `emotions`.
    ///
    /// Every pattern is run over the original text. Each recognized marker
    /// is removed from the output, even once the tag cap is reached.
    pub fn extract(&self, text: &str, emotions: &HashMap<String, String>) -> EmotionMatch {
        let mut stripped = text.to_string();
        let mut tags: Vec<String> = Vec::new();
        let mut matched = false;

        for pattern in MARKER_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let label = &caps[1];
                if !emotions.contains_key(label) {
                    continue;
                }
                matched = true;
                stripped = stripped.replace(&caps[0], "");
                if tags.len() < self.max_tags && !tags.iter().any(|t| t == label) {
                    tags.push(label.to_string());
                }
            }
        }

        if matched {
            stripped = stripped.trim().to_string();
        }

        EmotionMatch {
            text: stripped,
            tags,
        }
    }
}

impl Default for EmotionMatcher {
    fn default() -> Self {
        Self::new(MAX_EMOTION_TAGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emotions() -> HashMap<String, String> {
        [("开心", "happy"), ("生气", "angry"), ("悲伤", "sad"), ("喵", "meow")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn cap_is_clamped() {
        assert_eq!(EmotionMatcher::new(5).max_tags(), MAX_EMOTION_TAGS);
        assert_eq!(EmotionMatcher::new(0).max_tags(), 1);

        let m = EmotionMatcher::new(5).extract("[开心][生气][悲伤]", &emotions());
        assert_eq!(m.tags, vec!["开心".to_string(), "生气".to_string()]);
        assert_eq!(m.text, "");
    }

    #[test]
    fn no_markers_leaves_text_untouched() {
        let m = EmotionMatcher::default().extract("  hello there  ", &emotions());
        assert_eq!(m.text, "  hello there  ");
        assert!(!m.has_tags());
    }

    #[test]
    fn square_bracket_marker_is_stripped() {
        let m = EmotionMatcher::default().extract("今天天气真好[开心]", &emotions());
        assert_eq!(m.text, "今天天气真好");
        assert_eq!(m.tags, vec!["开心"]);
    }

    #[test]
    fn all_three_delimiters_are_recognized() {
        let matcher = EmotionMatcher::default();
        let m = matcher.extract("a[开心] b(生气)", &emotions());
        assert_eq!(m.tags, vec!["开心", "生气"]);
        assert_eq!(m.text, "a b");

        let m = matcher.extract("b(生气) c（悲伤）", &emotions());
        assert_eq!(m.tags, vec!["生气", "悲伤"]);
        assert_eq!(m.text, "b c");
    }

    #[test]
    fn priority_order_follows_delimiter_not_position() {
        let matcher = EmotionMatcher::default();
        let m = matcher.extract("（悲伤）first then [开心]", &emotions());
        assert_eq!(m.tags, vec!["开心", "悲伤"]);
    }

    #[test]
    fn unknown_labels_stay_in_text() {
        let m = EmotionMatcher::default().extract("see (note 1) and [开心]", &emotions());
        assert_eq!(m.text, "see (note 1) and");
        assert_eq!(m.tags, vec!["开心"]);
    }

    #[test]
    fn duplicates_are_collapsed_and_all_occurrences_removed() {
        let m = EmotionMatcher::default().extract("[开心]hi[开心] there(开心)", &emotions());
        assert_eq!(m.tags, vec!["开心"]);
        assert_eq!(m.text, "hi there");
    }

    #[test]
    fn cap_limits_tags_but_still_strips_markup() {
        let m = EmotionMatcher::default().extract("[开心][生气][悲伤][喵] ok", &emotions());
        assert_eq!(m.tags, vec!["开心", "生气"]);
        assert_eq!(m.text, "ok");
    }

    #[test]
    fn lookup_is_exact() {
        let m = EmotionMatcher::default().extract("[开心 ] [ 开心]", &emotions());
        assert!(!m.has_tags());
        assert_eq!(m.text, "[开心 ] [ 开心]");
    }

    #[test]
    fn bounded_and_stripped_for_many_markers() {
        let emotions = emotions();
        let labels = ["开心", "未知", "生气", "开心", "悲伤", "x", "喵"];
        for n in 0..=labels.len() {
            let text: String = labels[..n].iter().map(|l| format!("w[{l}]")).collect();
            let m = EmotionMatcher::default().extract(&text, &emotions);
            assert!(m.tags.len() <= 2);
            let mut seen = std::collections::HashSet::new();
            assert!(m.tags.iter().all(|t| seen.insert(t)));
            for label in labels[..n].iter().filter(|l| emotions.contains_key(**l)) {
                assert!(!m.text.contains(&format!("[{label}]")));
            }
        }
    }
}
