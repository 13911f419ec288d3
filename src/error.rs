//! Error types for the meme sender.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
}

/// Failures loading or persisting the emotion map file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed emotion map in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Meme directory store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid category name: {0:?}")]
    InvalidCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-facing command validation failures. The `Display` text is sent
/// back to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("请指定表情分类，例如：/上传表情 开心")]
    MissingCategory,

    #[error("未知的表情分类「{0}」，发送 /表情列表 查看全部分类")]
    UnknownCategory(String),
}

/// Per-item failure while ingesting an uploaded image.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Fetch of {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Fetch of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures while decorating an outgoing message.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Failed to list category {category}: {source}")]
    Listing {
        category: String,
        #[source]
        source: StoreError,
    },
}

/// Result type alias for the meme sender.
pub type Result<T> = std::result::Result<T, Error>;
