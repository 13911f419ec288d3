//! CLI host — stdin/stdout REPL that drives the hooks for local testing.
//!
//! Input lines:
//! - `say <text>`: treat `<text>` as a generated reply and print the
//!   decorated message
//! - `img <path-or-url> ...`: send a message carrying images
//! - anything else: send as a plain user message (commands included)

use std::sync::Arc;

use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::host::MemeHooks;
use crate::message::{IncomingEvent, MessageComponent, OutgoingMessage};

const CONVERSATION_ID: &str = "cli";
const SENDER_ID: &str = "local-user";

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliInput {
    Reply(String),
    Event(IncomingEvent),
}

/// Parse one non-empty input line.
pub fn parse_line(line: &str) -> CliInput {
    if let Some(reply) = line.strip_prefix("say ") {
        return CliInput::Reply(reply.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("img ") {
        let components = rest
            .split_whitespace()
            .map(|target| {
                if target.starts_with("http://") || target.starts_with("https://") {
                    MessageComponent::remote_image(target)
                } else {
                    MessageComponent::local_image(target)
                }
            })
            .collect();
        return CliInput::Event(IncomingEvent::new(CONVERSATION_ID, SENDER_ID, components));
    }

    CliInput::Event(IncomingEvent::text(CONVERSATION_ID, SENDER_ID, line))
}

/// Render a message chain as text.
pub fn render(message: &OutgoingMessage) -> String {
    message
        .components
        .iter()
        .map(|c| match c {
            MessageComponent::Text(text) => text.clone(),
            MessageComponent::Image(source) => format!("[image: {source:?}]"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads stdin and feeds it through a [`MemeHooks`] implementation.
pub struct CliHost;

impl CliHost {
    pub fn new() -> Self {
        Self
    }

    fn lines(&self) -> impl Stream<Item = String> + Unpin {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        }))
    }

    /// Run until stdin closes or `/quit` is entered.
    pub async fn run(&self, hooks: Arc<dyn MemeHooks>) {
        let mut lines = self.lines();
        eprint!("> ");

        while let Some(line) = lines.next().await {
            if line == "/quit" {
                break;
            }

            match parse_line(&line) {
                CliInput::Reply(text) => {
                    let stripped = hooks.on_response_generated(CONVERSATION_ID, &text).await;
                    let message = hooks
                        .on_before_send(CONVERSATION_ID, OutgoingMessage::from_text(stripped))
                        .await;
                    println!("\n{}\n", render(&message));
                    hooks.on_after_send(CONVERSATION_ID).await;
                }
                CliInput::Event(event) => {
                    let outcome = hooks.on_incoming_event(&event).await;
                    if let Some(reply) = outcome.reply_text() {
                        println!("\n{reply}\n");
                    }
                }
            }
            eprint!("> ");
        }
    }
}

impl Default for CliHost {
    fn default() -> Self {
        Self::new()
    }
}
