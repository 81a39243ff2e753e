//! PDF Merger Web - Web server for merging PDF documents.

mod app;
mod helpers;
mod routes;
mod state;
mod templates;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_merger_core::MergerConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "pdf-merger-web")]
#[command(author, version, about = "PDF Merger Web Server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "PDF_MERGER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "PDF_MERGER_PORT", default_value = "3000")]
    port: u16,

    /// Config file path
    #[arg(short, long, env = "PDF_MERGER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding per-session uploads
    #[arg(long, env = "PDF_MERGER_UPLOAD_ROOT")]
    upload_root: Option<PathBuf>,

    /// Aggregate upload cap per request, in bytes
    #[arg(long, env = "PDF_MERGER_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Fail merges that name unknown file ids instead of skipping them
    #[arg(long, env = "PDF_MERGER_STRICT_IDS")]
    strict_ids: bool,

    /// Disable page numbering
    #[arg(long)]
    no_page_numbers: bool,

    /// Seconds between sweeps for expired sessions
    #[arg(long, default_value = "300")]
    cleanup_interval: u64,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Static files directory (defaults to ./static or crate's static dir)
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<String>,
}

impl Args {
    fn merger_config(&self) -> Result<MergerConfig> {
        let mut config = match &self.config {
            Some(path) => MergerConfig::from_file(path).context("Failed to load config file")?,
            None => MergerConfig::load(),
        };

        if let Some(root) = &self.upload_root {
            config.upload_root.clone_from(root);
        }
        if let Some(limit) = self.max_upload_bytes {
            config.max_upload_bytes = limit;
        }
        if self.strict_ids {
            config.unknown_ids = pdf_merger_core::UnknownIdPolicy::Reject;
        }
        if self.no_page_numbers {
            config.page_numbers.enabled = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},lopdf=warn")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = args.merger_config()?;
    let state = Arc::new(AppState::new(config).context("Failed to initialize application state")?);

    // Sweep abandoned sessions so their uploads do not pile up on disk
    let cleanup_state = Arc::clone(&state);
    let cleanup_interval = Duration::from_secs(args.cleanup_interval.max(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(cleanup_interval).await;
            cleanup_state.cleanup_old_sessions().await;
            debug!("Completed session cleanup");
        }
    });

    let app = app::router(state, app::resolve_static_dir(args.static_dir.as_deref()));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
