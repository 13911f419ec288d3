//! Message and attachment types shared by the outbound and inbound flows.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where an image's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum ImageSource {
    /// A file readable from the local filesystem.
    Local(PathBuf),
    /// An http(s) URL that has to be fetched.
    Remote(String),
}

/// One component of a message chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageComponent {
    Text(String),
    Image(ImageSource),
}

impl MessageComponent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn local_image(path: impl Into<PathBuf>) -> Self {
        Self::Image(ImageSource::Local(path.into()))
    }

    pub fn remote_image(url: impl Into<String>) -> Self {
        Self::Image(ImageSource::Remote(url.into()))
    }

    /// The image source, if this component carries one.
    pub fn as_image(&self) -> Option<&ImageSource> {
        match self {
            Self::Image(source) => Some(source),
            Self::Text(_) => None,
        }
    }
}

/// A message about to be delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub components: Vec<MessageComponent>,
}

impl OutgoingMessage {
    pub fn new(components: Vec<MessageComponent>) -> Self {
        Self { components }
    }

    /// A message consisting of a single text component.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![MessageComponent::text(text)])
    }

    pub fn push(&mut self, component: MessageComponent) {
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Identifies whose upload session an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub conversation_id: String,
    pub sender_id: String,
}

impl SessionKey {
    pub fn new(conversation_id: impl Into<String>, sender_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.sender_id)
    }
}

/// A message received from a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEvent {
    /// Conversation (group or private chat) the event arrived in.
    pub conversation_id: String,
    /// User who sent it.
    pub sender_id: String,
    /// Display name, if the host knows one.
    pub sender_name: Option<String>,
    /// Message chain in arrival order.
    pub components: Vec<MessageComponent>,
    /// Host-specific extras.
    pub metadata: serde_json::Value,
}

impl IncomingEvent {
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        components: Vec<MessageComponent>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            components,
            metadata: serde_json::Value::Null,
        }
    }

    /// Convenience constructor for a plain text message.
    pub fn text(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(conversation_id, sender_id, vec![MessageComponent::text(text)])
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.conversation_id, &self.sender_id)
    }

    /// Concatenated text of all text components, trimmed.
    pub fn plain_text(&self) -> String {
        let text: String = self
            .components
            .iter()
            .filter_map(|c| match c {
                MessageComponent::Text(t) => Some(t.as_str()),
                MessageComponent::Image(_) => None,
            })
            .collect();
        text.trim().to_string()
    }

    /// Image-bearing components, in chain order.
    pub fn images(&self) -> impl Iterator<Item = &ImageSource> {
        self.components.iter().filter_map(MessageComponent::as_image)
    }

    pub fn has_images(&self) -> bool {
        self.images().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_skips_images() {
        let event = IncomingEvent::new(
            "group-1",
            "alice",
            vec![
                MessageComponent::text(" /上传表情"),
                MessageComponent::remote_image("https://example.com/a.png"),
                MessageComponent::text(" 开心 "),
            ],
        );
        assert_eq!(event.plain_text(), "/上传表情 开心");
        assert_eq!(event.images().count(), 1);
    }

    #[test]
    fn session_key_pairs_conversation_and_sender() {
        let event = IncomingEvent::text("group-1", "alice", "hi");
        assert_eq!(event.session_key(), SessionKey::new("group-1", "alice"));
        assert_ne!(event.session_key(), SessionKey::new("group-1", "bob"));
        assert_eq!(event.session_key().to_string(), "group-1/alice");
    }

    #[test]
    fn component_serde_is_tagged() {
        let json = serde_json::to_value(MessageComponent::remote_image("https://x/y.gif")).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["data"]["kind"], "remote");
        let back: MessageComponent = serde_json::from_value(json).unwrap();
        assert_eq!(back, MessageComponent::remote_image("https://x/y.gif"));
    }

    #[test]
    fn text_only_event_has_no_images() {
        let event = IncomingEvent::text("c", "s", "hello");
        assert!(!event.has_images());
    }
}
