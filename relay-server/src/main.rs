// Transcript relay host
//
// Runs the background relay and a popup-style requester in one process:
// the relay owns the backend call and the result store, each requester
// operation sends one message and picks its result up exactly once.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{ConfigFile, StoreConfig, StoreKind};
use transcript_relay::{
    relay, AnalyticsClient, FileStore, HostCapabilities, HttpBackend, MemoryStore, Relay,
    RelayOptions, Requester, ResultCache, SharedStore,
};

#[derive(Parser)]
#[command(name = "transcript-relay")]
#[command(about = "Video transcription relay", long_about = None)]
struct Cli {
    /// Config file (defaults to $CONFIG_PATH, then relay-config.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe one or more videos through the relay
    Transcribe {
        /// Watch page URLs
        #[arg(required = true)]
        video_urls: Vec<String>,
    },

    /// Show channel and video statistics for a watch page
    Analytics {
        /// Watch page URL
        video_url: String,
    },

    /// Delete expired results from the configured store
    Evict,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcript_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| "relay-config.toml".to_string());
    tracing::info!("Loading configuration from: {}", config_path);

    let config = ConfigFile::load(&config_path)?;
    config.validate()?;

    match cli.command {
        Commands::Transcribe { video_urls } => transcribe(&config, video_urls).await,
        Commands::Analytics { video_url } => analytics(&config, &video_url).await,
        Commands::Evict => evict(&config).await,
    }
}

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SharedStore>> {
    let store: Arc<dyn SharedStore> = match config.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(
            FileStore::open(&config.path)
                .await
                .context(format!("Failed to open result store at {}", config.path))?,
        ),
    };
    Ok(store)
}

async fn transcribe(config: &ConfigFile, video_urls: Vec<String>) -> Result<()> {
    let cache = ResultCache::new(open_store(&config.store).await?, config.relay.result_ttl());
    let sweeper = cache.spawn_sweeper(config.relay.sweep_interval());

    let backend = Arc::new(HttpBackend::new(
        config.backend.url.as_str(),
        config.backend.extension_id.as_str(),
    ));
    tracing::info!("Backend: {}", backend.url());

    let relay = Relay::new(
        backend,
        cache.clone(),
        RelayOptions {
            transfer: config.relay.transfer,
            forward_audio: config.relay.forward_audio,
        },
    );
    let (handle, relay_task) = relay::spawn(relay, config.relay.channel_capacity);

    let requester = Requester::new(HostCapabilities::new(handle, cache));
    let requester = &requester;

    let results = join_all(video_urls.iter().map(|url| async move {
        (url, requester.fetch_transcript(url).await)
    }))
    .await;

    let total = results.len();
    let mut failed = 0;
    for (url, result) in results {
        match result {
            Ok(payload) => {
                println!("== {}", url);
                println!("{}", payload.text);
                if let Some(audio) = payload.audio_base64 {
                    println!("(audio: {} base64 chars)", audio.len());
                }
                println!();
            }
            Err(e) => {
                eprintln!("== {}\nerror: {}\n", url, e);
                failed += 1;
            }
        }
    }

    sweeper.abort();
    relay_task.abort();

    if failed > 0 {
        anyhow::bail!("{} of {} transcription(s) failed", failed, total);
    }
    Ok(())
}

async fn analytics(config: &ConfigFile, video_url: &str) -> Result<()> {
    let settings = config
        .analytics
        .as_ref()
        .context("Analytics needs an [analytics] section with api_key")?;

    let client = AnalyticsClient::new(settings.base_url.as_str(), settings.api_key.as_str());
    let report = client.fetch_report(video_url).await?;

    println!("{}", report);
    Ok(())
}

async fn evict(config: &ConfigFile) -> Result<()> {
    let cache = ResultCache::new(open_store(&config.store).await?, config.relay.result_ttl());
    let evicted = cache.evict_expired().await?;

    println!("Evicted {} expired result(s)", evicted);
    Ok(())
}
