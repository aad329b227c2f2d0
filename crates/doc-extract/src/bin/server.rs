//! Extraction server binary
//!
//! Run with: cargo run -p doc-extract --bin doc-extract-server -- --config extract.toml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use doc_extract::{config::ExtractConfig, server::ExtractServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "doc-extract-server", version, about = "Document extraction server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "DOC_EXTRACT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

fn load_config(args: &Args) -> anyhow::Result<ExtractConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let mut config = ExtractConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            config
        }
    };
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_extract=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Backend: {:?}", config.backend);
    tracing::info!("  - Source bucket: {}", config.source_bucket);
    tracing::info!("  - Destination bucket: {}", config.destination_bucket);
    tracing::info!("  - OCR mode: {}", config.ocr_mode);
    tracing::info!(
        "  - Local shortcut: files up to {} bytes, {}% text density",
        config.large_file_threshold,
        config.min_text_percentage_to_skip_ocr
    );
    if config.notification.topic_arn.is_none() || config.notification.role_arn.is_none() {
        tracing::warn!("No completion notification channel configured");
    }

    let server = ExtractServer::new(Arc::new(config)).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
