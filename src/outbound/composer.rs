//! Meme selection and outgoing message composition.

use std::collections::HashMap;
use std::path::PathBuf;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::ComposeError;
use crate::message::{MessageComponent, OutgoingMessage};
use crate::store::MemeDirectoryStore;

/// Picks one image for an emotion tag.
#[derive(Debug, Clone)]
pub struct MemeSelector {
    store: MemeDirectoryStore,
}

impl MemeSelector {
    pub fn new(store: MemeDirectoryStore) -> Self {
        Self { store }
    }

    /// Path of a random image in the tag's category, or `None` when the tag
    /// is unknown or its directory is missing or empty.
    pub async fn select(
        &self,
        tag: &str,
        emotions: &HashMap<String, String>,
    ) -> Result<Option<PathBuf>, ComposeError> {
        let Some(category) = emotions.get(tag) else {
            debug!(tag, "Tag no longer mapped, skipping");
            return Ok(None);
        };

        let files = self
            .store
            .list_category_files(category)
            .await
            .map_err(|source| ComposeError::Listing {
                category: category.clone(),
                source,
            })?;

        let Some(filename) = pick_one(&files) else {
            debug!(tag, category = %category, "No memes in category, skipping");
            return Ok(None);
        };

        let dir = self
            .store
            .category_path(category)
            .map_err(|source| ComposeError::Listing {
                category: category.clone(),
                source,
            })?;
        Ok(Some(dir.join(filename)))
    }
}

fn pick_one(files: &[String]) -> Option<&String> {
    files.choose(&mut rand::thread_rng())
}

/// Builds the final outgoing message: original components first, then one
/// image per resolved tag.
#[derive(Debug, Clone)]
pub struct ResultComposer {
    selector: MemeSelector,
}

impl ResultComposer {
    pub fn new(selector: MemeSelector) -> Self {
        Self { selector }
    }

    pub async fn compose(
        &self,
        original: &OutgoingMessage,
        tags: &[String],
        emotions: &HashMap<String, String>,
    ) -> Result<OutgoingMessage, ComposeError> {
        let mut message = original.clone();

        for tag in tags {
            if let Some(path) = self.selector.select(tag, emotions).await? {
                debug!(tag = %tag, path = %path.display(), "Attaching meme");
                message.push(MessageComponent::local_image(path));
            }
        }

        Ok(message)
    }
}
