//! MemeSender — the long-lived service a host plugs in.
//!
//! Owns the emotion map, the meme store, pending reply emotions and upload
//! sessions, and implements [`MemeHooks`] on top of them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::commands::Command;
use crate::config::MemeConfig;
use crate::emotions::{EmotionMap, EmotionMatcher};
use crate::error::{ConfigError, Result};
use crate::host::{EventOutcome, MemeHooks};
use crate::inbound::{Clock, ImageIngester, SessionTouch, SystemClock, UploadSessionManager};
use crate::message::{ImageSource, IncomingEvent, OutgoingMessage};
use crate::outbound::{MemeSelector, ResponseInterceptor, ResultComposer};
use crate::store::MemeDirectoryStore;

pub struct MemeSender {
    config: MemeConfig,
    emotions: EmotionMap,
    store: MemeDirectoryStore,
    interceptor: ResponseInterceptor,
    composer: ResultComposer,
    sessions: UploadSessionManager,
    ingester: ImageIngester,
}

impl MemeSender {
    pub fn new(config: MemeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build with an explicit clock for upload session expiry.
    pub fn with_clock(config: MemeConfig, clock: Arc<dyn Clock>) -> Self {
        let store = MemeDirectoryStore::new(config.meme_root.clone());
        Self {
            emotions: EmotionMap::with_defaults(),
            interceptor: ResponseInterceptor::new(EmotionMatcher::new(config.max_emotions)),
            composer: ResultComposer::new(MemeSelector::new(store.clone())),
            sessions: UploadSessionManager::new(config.session_ttl, clock),
            ingester: ImageIngester::new(store.clone(), config.fetch_timeout),
            store,
            config,
        }
    }

    /// Use a preconfigured HTTP client for remote image fetches.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.ingester = self.ingester.with_client(client);
        self
    }

    /// Create the store root, merge the persisted emotion map and report
    /// which categories have images.
    pub async fn init(&self) -> Result<()> {
        self.store.ensure_root().await?;
        self.emotions.load_or_keep(&self.config.emotions_file).await;

        let categories = self.emotions.categories().await;
        let ready = self
            .store
            .check_categories(categories.iter().map(String::as_str))
            .await;

        info!(
            root = %self.store.root().display(),
            tags = self.emotions.len().await,
            categories = categories.len(),
            ready,
            "Meme sender initialized"
        );
        Ok(())
    }

    /// Drop all in-flight state.
    pub async fn shutdown(&self) {
        self.interceptor.clear_all().await;
        self.sessions.clear().await;
        info!("Meme sender shut down");
    }

    pub fn config(&self) -> &MemeConfig {
        &self.config
    }

    pub fn emotions(&self) -> &EmotionMap {
        &self.emotions
    }

    pub fn store(&self) -> &MemeDirectoryStore {
        &self.store
    }

    pub fn sessions(&self) -> &UploadSessionManager {
        &self.sessions
    }

    pub fn interceptor(&self) -> &ResponseInterceptor {
        &self.interceptor
    }

    /// Merge the persisted emotion map file into memory. On failure the
    /// current map is kept.
    pub async fn reload(&self) -> std::result::Result<usize, ConfigError> {
        self.emotions
            .reload_from(&self.config.emotions_file)
            .await
            .inspect_err(|e| warn!(error = %e, "Emotion map reload failed, keeping current map"))
    }

    /// Register a new tag, persist the map and create its directory.
    pub async fn add_category(&self, tag: &str, slug: &str) -> Result<()> {
        self.store.category_path(slug)?;
        self.emotions
            .add_and_persist(tag, slug, &self.config.emotions_file)
            .await?;
        self.store.ensure_category_directory(slug).await?;
        info!(tag, category = slug, "Category added");
        Ok(())
    }

    async fn handle_command(&self, event: &IncomingEvent, command: Command) -> EventOutcome {
        match command {
            Command::ListCategories => {
                let tags = self.emotions.tags().await;
                EventOutcome::Reply(format!("可用的表情分类：{}", tags.join("、")))
            }
            Command::StartUpload(tag) => {
                let emotions = self.emotions.snapshot().await;
                match self
                    .sessions
                    .start(&event.session_key(), tag.as_deref(), &emotions)
                    .await
                {
                    Ok(session) => EventOutcome::Reply(format!(
                        "请在 {} 秒内发送要添加到「{}」的图片",
                        self.config.session_ttl.as_secs(),
                        session.tag
                    )),
                    Err(e) => EventOutcome::Reply(e.to_string()),
                }
            }
            Command::ReloadEmotions => match self.reload().await {
                Ok(_) => EventOutcome::Reply(format!(
                    "表情映射已重新加载，共 {} 个分类",
                    self.emotions.len().await
                )),
                Err(e) => EventOutcome::Reply(format!("重新加载失败：{e}")),
            },
        }
    }
}

#[async_trait]
impl MemeHooks for MemeSender {
    async fn on_response_generated(&self, conversation_id: &str, text: &str) -> String {
        let emotions = self.emotions.snapshot().await;
        self.interceptor
            .intercept(conversation_id, text, &emotions)
            .await
    }

    async fn on_before_send(
        &self,
        conversation_id: &str,
        message: OutgoingMessage,
    ) -> OutgoingMessage {
        let Some(pending) = self.interceptor.take(conversation_id).await else {
            return message;
        };

        let emotions = self.emotions.snapshot().await;
        match self
            .composer
            .compose(&message, pending.tags(), &emotions)
            .await
        {
            Ok(decorated) => decorated,
            Err(e) => {
                error!(conversation = %conversation_id, error = %e, "Failed to attach memes, sending reply as is");
                message
            }
        }
    }

    async fn on_after_send(&self, conversation_id: &str) {
        self.interceptor.clear(conversation_id).await;
    }

    async fn on_incoming_event(&self, event: &IncomingEvent) -> EventOutcome {
        if let Some(command) = Command::parse(&event.plain_text()) {
            return self.handle_command(event, command).await;
        }

        let key = event.session_key();
        match self.sessions.take_active(&key).await {
            SessionTouch::None => EventOutcome::Ignored,
            SessionTouch::Expired(session) => EventOutcome::SessionExpired { tag: session.tag },
            SessionTouch::Active(session) => {
                let images: Vec<ImageSource> = event.images().cloned().collect();
                let report = self.ingester.ingest(&session.category, &images).await;
                info!(key = %key, category = %session.category, result = %report.summary(), "Upload session closed");
                EventOutcome::Ingested {
                    tag: session.tag,
                    report,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::ManualClock;
    use crate::message::MessageComponent;
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sender_in(tmp: &TempDir) -> (Arc<ManualClock>, MemeSender) {
        let config = MemeConfig {
            meme_root: tmp.path().join("memes"),
            emotions_file: tmp.path().join("emotions.json"),
            ..MemeConfig::default()
        };
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sender = MemeSender::with_clock(config, clock.clone());
        (clock, sender)
    }

    #[tokio::test]
    async fn list_command_returns_all_tags() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        let outcome = sender
            .on_incoming_event(&IncomingEvent::text("g", "u", "/表情列表"))
            .await;
        let text = outcome.reply_text().unwrap();
        assert!(text.contains("开心"));
        assert!(text.contains("八嘎"));
    }

    #[tokio::test]
    async fn invalid_upload_command_changes_nothing() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        let outcome = sender
            .on_incoming_event(&IncomingEvent::text("g", "u", "/上传表情 不存在"))
            .await;
        assert!(matches!(outcome, EventOutcome::Reply(ref t) if t.contains("不存在")));
        assert!(sender.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn plain_message_without_session_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        let event = IncomingEvent::new(
            "g",
            "u",
            vec![MessageComponent::remote_image("http://127.0.0.1:9/a.png")],
        );
        assert_eq!(sender.on_incoming_event(&event).await, EventOutcome::Ignored);
    }

    #[tokio::test]
    async fn expired_session_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let (clock, sender) = sender_in(&tmp);
        sender.init().await.unwrap();
        sender
            .on_incoming_event(&IncomingEvent::text("g", "u", "/上传表情 开心"))
            .await;

        let src = tmp.path().join("a.png");
        tokio::fs::write(&src, b"png").await.unwrap();
        clock.advance(Duration::from_secs(30));

        let event = IncomingEvent::new("g", "u", vec![MessageComponent::local_image(&src)]);
        let outcome = sender.on_incoming_event(&event).await;

        assert_eq!(outcome, EventOutcome::SessionExpired { tag: "开心".into() });
        assert!(sender.sessions().is_empty().await);
        assert!(sender.store().list_category_files("happy").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_upload_saves_and_closes_session() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        sender
            .on_incoming_event(&IncomingEvent::text("g", "u", "/upload 开心"))
            .await;

        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.jpg");
        tokio::fs::write(&a, b"a").await.unwrap();
        tokio::fs::write(&b, b"b").await.unwrap();
        let event = IncomingEvent::new(
            "g",
            "u",
            vec![MessageComponent::local_image(&a), MessageComponent::local_image(&b)],
        );

        let outcome = sender.on_incoming_event(&event).await;
        let EventOutcome::Ingested { report, .. } = &outcome else {
            panic!("expected ingestion, got {outcome:?}");
        };
        assert_eq!(report.summary(), "2/2 saved");
        assert!(sender.sessions().is_empty().await);
        assert_eq!(sender.store().list_category_files("happy").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn decoration_appends_and_clears_pending() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        let dir = sender.store().ensure_category_directory("happy").await.unwrap();
        tokio::fs::write(dir.join("1.png"), b"x").await.unwrap();

        let text = sender.on_response_generated("g", "好[开心]").await;
        assert_eq!(text, "好");

        let out = sender
            .on_before_send("g", OutgoingMessage::from_text(text))
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(sender.interceptor().pending_count().await, 0);

        let again = sender
            .on_before_send("g", OutgoingMessage::from_text("next"))
            .await;
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn composition_failure_sends_original_and_clears() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        sender
            .emotions()
            .merge([("坏".to_string(), "../escape".to_string())].into())
            .await;

        sender.on_response_generated("g", "hi[坏]").await;
        let original = OutgoingMessage::from_text("hi");
        let out = sender.on_before_send("g", original.clone()).await;

        assert_eq!(out, original);
        assert_eq!(sender.interceptor().pending_count().await, 0);
    }

    #[tokio::test]
    async fn after_send_clears_undecorated_pending() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        sender.on_response_generated("g", "[开心]").await;
        sender.on_after_send("g").await;
        sender.on_after_send("g").await;
        assert_eq!(sender.interceptor().pending_count().await, 0);
    }

    #[tokio::test]
    async fn add_category_persists_and_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        sender.add_category("狗", "dog").await.unwrap();

        assert_eq!(sender.emotions().get("狗").await.as_deref(), Some("dog"));
        assert!(sender.store().category_path("dog").unwrap().is_dir());
        assert!(sender.config().emotions_file.exists());
        assert!(sender.add_category("猫", "../cat").await.is_err());
    }

    #[tokio::test]
    async fn add_category_keeps_entries_added_on_disk_after_init() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        sender.init().await.unwrap();

        let path = &sender.config().emotions_file;
        tokio::fs::write(path, r#"{"兔":"rabbit"}"#).await.unwrap();
        sender.add_category("狗", "dog").await.unwrap();

        let raw = tokio::fs::read_to_string(path).await.unwrap();
        let on_disk: std::collections::HashMap<String, String> =
            serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk.get("兔").map(String::as_str), Some("rabbit"));
        assert_eq!(on_disk.get("狗").map(String::as_str), Some("dog"));
        assert!(!on_disk.contains_key("开心"));
        assert_eq!(sender.emotions().get("兔").await.as_deref(), Some("rabbit"));
    }

    #[tokio::test]
    async fn emotion_cap_above_two_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let config = MemeConfig {
            meme_root: tmp.path().join("memes"),
            emotions_file: tmp.path().join("emotions.json"),
            max_emotions: 5,
            ..MemeConfig::default()
        };
        let sender = MemeSender::new(config);

        let text = sender
            .on_response_generated("c", "[开心][生气][悲伤]")
            .await;
        assert_eq!(text, "");
        let pending = sender.interceptor().take("c").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.tags(), ["开心".to_string(), "生气".to_string()]);
    }

    #[tokio::test]
    async fn reload_command_reports_failure_and_keeps_map() {
        let tmp = TempDir::new().unwrap();
        let (_clock, sender) = sender_in(&tmp);
        tokio::fs::write(&sender.config().emotions_file, "not json")
            .await
            .unwrap();
        let before = sender.emotions().len().await;

        let outcome = sender
            .on_incoming_event(&IncomingEvent::text("g", "u", "/reload"))
            .await;
        assert!(outcome.reply_text().unwrap().starts_with("重新加载失败"));
        assert_eq!(sender.emotions().len().await, before);
    }
}
