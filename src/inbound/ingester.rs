//! Image ingestion — saves the images of an upload message into a meme
//! category.
//!
//! Local files are copied, remote URLs are fetched and streamed to disk.
//! Items are processed concurrently and fail independently; the caller gets
//! a per-item report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::message::ImageSource;
use crate::store::{DEFAULT_EXTENSION, MemeDirectoryStore, is_allowed_image};

/// File extension for a response `Content-Type`. Unknown or missing types
/// fall back to `jpg`.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("image/jpeg" | "image/jpg" | "image/pjpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/gif") => "gif",
        Some("image/webp") => "webp",
        _ => DEFAULT_EXTENSION,
    }
}

/// Extension to keep for a copied local file.
fn extension_for_path(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if is_allowed_image(name) {
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    } else {
        DEFAULT_EXTENSION.to_string()
    }
}

/// What happened to one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Saved { path: PathBuf },
    Failed { source: String, reason: String },
}

impl ItemOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Summary of one upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub category: String,
    pub outcomes: Vec<ItemOutcome>,
}

impl IngestReport {
    pub fn saved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_saved()).count()
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn saved_paths(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Saved { path } => Some(path.as_path()),
            ItemOutcome::Failed { .. } => None,
        })
    }

    /// `"saved/attempted saved"`, e.g. `"1/2 saved"`.
    pub fn summary(&self) -> String {
        format!("{}/{} saved", self.saved(), self.attempted())
    }
}

/// Saves uploaded images into category directories.
#[derive(Debug, Clone)]
pub struct ImageIngester {
    store: MemeDirectoryStore,
    client: reqwest::Client,
    fetch_timeout: Duration,
}

impl ImageIngester {
    pub fn new(store: MemeDirectoryStore, fetch_timeout: Duration) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            fetch_timeout,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Save every image in `images` under `category`. Never fails as a
    /// whole; item failures are logged and reported.
    pub async fn ingest(&self, category: &str, images: &[ImageSource]) -> IngestReport {
        let outcomes = join_all(images.iter().map(|image| async move {
            let label = describe(image);
            match self.ingest_one(category, image).await {
                Ok(path) => {
                    debug!(category, source = %label, path = %path.display(), "Saved meme");
                    ItemOutcome::Saved { path }
                }
                Err(e) => {
                    warn!(category, source = %label, error = %e, "Skipping meme upload");
                    ItemOutcome::Failed {
                        source: label,
                        reason: e.to_string(),
                    }
                }
            }
        }))
        .await;

        let report = IngestReport {
            category: category.to_string(),
            outcomes,
        };
        info!(
            category,
            saved = report.saved(),
            attempted = report.attempted(),
            "Upload batch finished"
        );
        report
    }

    async fn ingest_one(&self, category: &str, image: &ImageSource) -> Result<PathBuf, IngestError> {
        match image {
            ImageSource::Local(path) => self.copy_local(category, path).await,
            ImageSource::Remote(url) => self.fetch_remote(category, url).await,
        }
    }

    async fn copy_local(&self, category: &str, source: &Path) -> Result<PathBuf, IngestError> {
        let mut input = fs::File::open(source)
            .await
            .map_err(|e| IngestError::Read {
                path: source.to_path_buf(),
                source: e,
            })?;

        let (dest, mut output) = self
            .store
            .create_unique_file(category, &extension_for_path(source))
            .await?;

        let copied = async {
            tokio::io::copy(&mut input, &mut output).await?;
            output.flush().await
        }
        .await;

        match copied {
            Ok(()) => Ok(dest),
            Err(e) => {
                discard(&dest).await;
                Err(IngestError::Write {
                    path: dest,
                    source: e,
                })
            }
        }
    }

    async fn fetch_remote(&self, category: &str, url: &str) -> Result<PathBuf, IngestError> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| self.fetch_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let extension = extension_for_content_type(content_type);

        let (dest, mut output) = self.store.create_unique_file(category, extension).await?;

        let mut body = response.bytes_stream();
        let streamed: Result<(), IngestError> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| self.fetch_error(url, e))?;
                output
                    .write_all(&chunk)
                    .await
                    .map_err(|e| IngestError::Write {
                        path: dest.clone(),
                        source: e,
                    })?;
            }
            output.flush().await.map_err(|e| IngestError::Write {
                path: dest.clone(),
                source: e,
            })
        }
        .await;

        match streamed {
            Ok(()) => Ok(dest),
            Err(e) => {
                discard(&dest).await;
                Err(e)
            }
        }
    }

    fn fetch_error(&self, url: &str, e: reqwest::Error) -> IngestError {
        if e.is_timeout() {
            IngestError::Timeout {
                url: url.to_string(),
                timeout: self.fetch_timeout,
            }
        } else {
            IngestError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

fn describe(image: &ImageSource) -> String {
    match image {
        ImageSource::Local(path) => path.display().to_string(),
        ImageSource::Remote(url) => url.clone(),
    }
}

/// Best-effort removal of a partially written file.
async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
    }
}
