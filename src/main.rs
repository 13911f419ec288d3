use std::sync::Arc;

use meme_sender::MemeSender;
use meme_sender::config::MemeConfig;
use meme_sender::host::CliHost;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional daily-rolling log file next to stderr output
    let (file_layer, _log_guard) = match std::env::var("MEME_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "meme-sender.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    let config = MemeConfig::from_env();

    eprintln!("🖼️  Meme Sender v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Memes: {}", config.meme_root.display());
    eprintln!("   Emotions: {}", config.emotions_file.display());
    eprintln!("   Upload window: {}s", config.session_ttl.as_secs());
    eprintln!("   `say <reply>` to decorate a reply, `img <path|url>` to send images, /quit to exit.\n");

    let sender = Arc::new(MemeSender::new(config));
    sender.init().await?;

    CliHost::new().run(sender.clone()).await;

    sender.shutdown().await;
    Ok(())
}
