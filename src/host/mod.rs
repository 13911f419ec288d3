//! Host runtime boundary.
//!
//! A chat-bot host drives the meme sender through [`MemeHooks`]; nothing in
//! the core depends on a concrete host's types.

pub mod cli;

use async_trait::async_trait;

use crate::inbound::IngestReport;
use crate::message::{IncomingEvent, OutgoingMessage};

pub use cli::CliHost;

/// What the meme sender did with an incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not for us; the host should carry on as usual.
    Ignored,
    /// A command was handled (or rejected); send this text back.
    Reply(String),
    /// The sender's upload session had lapsed before this event arrived.
    SessionExpired { tag: String },
    /// The event's images were saved into the session's category.
    Ingested { tag: String, report: IngestReport },
}

impl EventOutcome {
    /// Text to show the user, if any.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            Self::Ignored => None,
            Self::Reply(text) => Some(text.clone()),
            Self::SessionExpired { tag } => Some(format!(
                "「{tag}」的上传已超时，请重新发送 /上传表情 {tag}"
            )),
            Self::Ingested { tag, report } => {
                Some(format!("「{tag}」上传完成：{}", report.summary()))
            }
        }
    }

    /// Whether the host should stop processing the event.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Hooks a host runtime calls around reply generation and message delivery.
#[async_trait]
pub trait MemeHooks: Send + Sync {
    /// A reply has been generated. Returns the text with emotion markers
    /// removed.
    async fn on_response_generated(&self, conversation_id: &str, text: &str) -> String;

    /// The reply is about to be delivered. Returns the message to send.
    async fn on_before_send(&self, conversation_id: &str, message: OutgoingMessage)
    -> OutgoingMessage;

    /// The reply has been delivered. Cleanup only.
    async fn on_after_send(&self, conversation_id: &str);

    /// A user message arrived.
    async fn on_incoming_event(&self, event: &IncomingEvent) -> EventOutcome;
}
