//! Emotion tags: the tag → category map and the reply marker matcher.

pub mod map;
pub mod matcher;

pub use map::{EmotionMap, EmotionSnapshot};
pub use matcher::{EmotionMatch, EmotionMatcher, MAX_EMOTION_TAGS};
