//! File-backed meme directory store.
//!
//! The store is a directory on disk with one subdirectory per category
//! slug, each holding image files:
//!
//! ```text
//! memes/
//!   happy/20250101_120000_1a2b3c4d.png
//!   angry/...
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs;
use uuid::Uuid;

use crate::error::StoreError;

/// File extensions accepted as meme images.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Extension used when nothing better is known.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Attempts at finding an unused filename before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Whether `filename` ends in one of [`ALLOWED_EXTENSIONS`] (case-insensitive).
pub fn is_allowed_image(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Generate a fresh filename: local timestamp plus a random suffix.
pub fn unique_filename(extension: &str) -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}.{extension}", &suffix[..8])
}

/// Per-category image directories under one root.
#[derive(Debug, Clone)]
pub struct MemeDirectoryStore {
    root: PathBuf,
}

impl MemeDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a category slug to its directory. Slugs must be a single
    /// plain path component.
    pub fn category_path(&self, category: &str) -> Result<PathBuf, StoreError> {
        let valid = !category.is_empty()
            && category != "."
            && category != ".."
            && !category.contains(['/', '\\'])
            && !category.contains('\0');
        if !valid {
            return Err(StoreError::InvalidCategory(category.to_string()));
        }
        Ok(self.root.join(category))
    }

    /// Create the root directory if it does not exist.
    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Create a category directory if absent. Safe to race with other
    /// creators.
    pub async fn ensure_category_directory(&self, category: &str) -> Result<PathBuf, StoreError> {
        let path = self.category_path(category)?;
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Image filenames in a category, sorted. A missing or empty directory
    /// yields an empty list.
    pub async fn list_category_files(&self, category: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.category_path(category)?;
        list_images(&dir).await
    }

    /// Every category directory under the root with its image files.
    pub async fn scan_all(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        let mut categories = BTreeMap::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(categories),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let files = list_images(&entry.path()).await?;
            categories.insert(name, files);
        }

        Ok(categories)
    }

    /// Log which of the given categories are missing or empty. Returns the
    /// number of categories that have at least one image.
    pub async fn check_categories<'a, I>(&self, categories: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.root.exists() {
            tracing::error!(root = %self.root.display(), "Meme root directory does not exist");
            return 0;
        }

        let mut ready = 0;
        for category in categories {
            match self.list_category_files(category).await {
                Ok(files) if files.is_empty() => {
                    tracing::warn!(category, "Meme category is missing or empty");
                }
                Ok(files) => {
                    tracing::debug!(category, count = files.len(), "Meme category ready");
                    ready += 1;
                }
                Err(e) => {
                    tracing::warn!(category, error = %e, "Meme category cannot be listed");
                }
            }
        }
        ready
    }

    /// Create a new, uniquely named file in a category directory. Never
    /// overwrites an existing file.
    pub async fn create_unique_file(
        &self,
        category: &str,
        extension: &str,
    ) -> Result<(PathBuf, fs::File), StoreError> {
        let dir = self.ensure_category_directory(category).await?;

        let mut last_err = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(unique_filename(extension));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| std::io::Error::from(ErrorKind::AlreadyExists))
            .into())
    }
}

async fn list_images(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        if is_allowed_image(&name) && entry.file_type().await?.is_file() {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}
