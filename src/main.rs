//! release-watch binary entrypoint.
//! One cycle by default; `watch` polls, `serve` exposes the admin API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use release_watch::api::{self, AppState};
use release_watch::config::{resolve_config_path, ConfigStore};
use release_watch::engine::Engine;
use release_watch::ingest::{HttpFetcher, PageFetcher, PageOutline};
use release_watch::metrics::Metrics;
use release_watch::scheduler;

const ENV_LOG_FORMAT: &str = "RELEASE_WATCH_LOG_FORMAT";

#[derive(Parser)]
#[command(name = "release-watch", version)]
#[command(about = "Watch product pages for new entries and post a digest to a chat webhook")]
struct Cli {
    /// Config file (default: $RELEASE_WATCH_CONFIG or config/monitor.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one monitoring cycle
    Run,

    /// Run a cycle every N seconds
    Watch {
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,
    },

    /// Serve the admin API and /metrics
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Also poll in the background
        #[arg(long)]
        watch_interval_secs: Option<u64>,
    },

    /// Show what one source would send, without touching delivery state
    Preview {
        #[arg(long)]
        source: String,
    },

    /// List headings and date elements of a page
    Inspect {
        #[arg(long)]
        url: String,
    },

    /// Check that a URL is reachable
    Probe {
        #[arg(long)]
        url: String,
    },
}

/// `RUST_LOG` filter (default `release_watch=info,warn`); JSON lines when
/// `RELEASE_WATCH_LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("release_watch=info,warn"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let store = ConfigStore::load_or_create(&config_path)?;
            let engine = Engine::from_config(store.config())?;
            let report = engine.run_cycle(&store.config().sources).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Watch { interval_secs } => {
            // Fail fast on a broken config before entering the loop.
            ConfigStore::load_or_create(&config_path)?;
            scheduler::run_watch(config_path, Duration::from_secs(interval_secs.max(1))).await;
        }
        Command::Serve {
            bind,
            watch_interval_secs,
        } => {
            let metrics = Metrics::init()?;
            let store = ConfigStore::load_or_create(&config_path)?;
            let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&store.config().fetch)?);
            let app = api::router(AppState::new(store, fetcher)).merge(metrics.router());

            if let Some(secs) = watch_interval_secs {
                scheduler::spawn_watch(config_path.clone(), Duration::from_secs(secs.max(1)));
            }

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            info!(%bind, "admin API listening");
            axum::serve(listener, app).await.context("admin server")?;
        }
        Command::Preview { source } => {
            let store = ConfigStore::load_or_create(&config_path)?;
            let Some(profile) = store.config().source(&source) else {
                bail!("no source named {source:?} in {}", config_path.display());
            };
            let engine = Engine::from_config(store.config())?;
            let (batch, message) = engine.preview_message(profile).await?;
            println!("{} item(s) from {}\n", batch.len(), profile.name);
            println!("{}", message.markdown);
        }
        Command::Inspect { url } => {
            let store = ConfigStore::load_or_create(&config_path)?;
            let fetcher = HttpFetcher::new(&store.config().fetch)?;
            let body = fetcher.fetch(&url).await?;
            print!("{}", PageOutline::from_document(&body).to_text());
        }
        Command::Probe { url } => {
            let store = ConfigStore::load_or_create(&config_path)?;
            let fetcher = HttpFetcher::new(&store.config().fetch)?;
            let res = fetcher.probe(&url).await;
            println!("{}", serde_json::to_string_pretty(&res)?);
            if !res.ok {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
