//! Emotion map — display tag → category slug, reloadable from disk.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::RwLock;

use crate::config::DEFAULT_EMOTIONS;
use crate::error::ConfigError;

/// Immutable view of the map at one point in time.
pub type EmotionSnapshot = Arc<HashMap<String, String>>;

/// Shared, reloadable emotion map.
///
/// Readers take a cheap [`EmotionSnapshot`]; writers swap in a new map.
/// Reloads only add or overwrite entries.
#[derive(Debug, Default)]
pub struct EmotionMap {
    inner: RwLock<EmotionSnapshot>,
}

impl EmotionMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(entries)),
        }
    }

    /// Map pre-filled with the built-in emotions.
    pub fn with_defaults() -> Self {
        Self::from_pairs(DEFAULT_EMOTIONS.iter().copied())
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(tag, slug)| (tag.to_string(), slug.to_string()))
                .collect(),
        )
    }

    pub async fn snapshot(&self) -> EmotionSnapshot {
        Arc::clone(&*self.inner.read().await)
    }

    /// Category slug for a display tag. Exact match only.
    pub async fn get(&self, tag: &str) -> Option<String> {
        self.inner.read().await.get(tag).cloned()
    }

    pub async fn contains(&self, tag: &str) -> bool {
        self.inner.read().await.contains_key(tag)
    }

    /// All display tags, sorted.
    pub async fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.inner.read().await.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Distinct category slugs, sorted.
    pub async fn categories(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.inner.read().await.values().cloned().collect();
        slugs.sort();
        slugs.dedup();
        slugs
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Add or overwrite entries. Existing tags not in `entries` are kept.
    pub async fn merge(&self, entries: HashMap<String, String>) {
        let mut guard = self.inner.write().await;
        let mut next = HashMap::clone(&guard);
        next.extend(entries);
        *guard = Arc::new(next);
    }

    /// Merge the JSON object at `path` into the map. On any read or parse
    /// failure the map is left untouched. Returns the number of entries
    /// read from the file.
    pub async fn reload_from(&self, path: &Path) -> Result<usize, ConfigError> {
        let entries = read_emotion_file(path).await?;
        let count = entries.len();
        self.merge(entries).await;
        tracing::info!(path = %path.display(), entries = count, "Emotion map reloaded");
        Ok(count)
    }

    /// Startup load: a missing file is fine, anything else is logged and
    /// the built-in map is kept.
    pub async fn load_or_keep(&self, path: &Path) {
        match self.reload_from(path).await {
            Ok(_) => {}
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No emotion map file, using built-in map");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring emotion map file");
            }
        }
    }

    /// Add one tag to the file at `path`, then merge the file into memory.
    ///
    /// Only the file's own entries are written back, so built-in tags stay
    /// out of it and entries added on disk since the last reload survive.
    /// A missing file starts empty. A malformed one is an error and nothing
    /// is written.
    pub async fn add_and_persist(
        &self,
        tag: &str,
        slug: &str,
        path: &Path,
    ) -> Result<(), ConfigError> {
        let mut guard = self.inner.write().await;
        let mut on_disk = match read_emotion_file(path).await {
            Ok(entries) => entries,
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        on_disk.insert(tag.to_string(), slug.to_string());
        write_emotion_file(path, &on_disk).await?;

        let mut next = HashMap::clone(&guard);
        next.extend(on_disk);
        *guard = Arc::new(next);
        Ok(())
    }
}

async fn read_emotion_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_emotion_file(
    path: &Path,
    entries: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    let sorted: BTreeMap<&String, &String> = entries.iter().collect();
    let json = serde_json::to_string_pretty(&sorted).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    fs::write(path, json).await.map_err(write_err)
}
