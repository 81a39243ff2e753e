//! PDF Merger CLI - Command line tool for merging PDF documents.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_merger_core::{
    MERGED_FILENAME, MergeRequest, MergerConfig, PageNumbering, PdfMerger, RawFile,
    UnknownIdPolicy,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pdf-merge")]
#[command(author, version, about = "Merge PDF documents in the given order", long_about = None)]
struct Args {
    /// Input PDF files, in output order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF file
    #[arg(short, long, default_value = MERGED_FILENAME)]
    output: PathBuf,

    /// Stamp "Page i of n" on every page
    #[arg(long)]
    page_numbers: bool,

    /// Fail if page numbers were requested but could not be added
    #[arg(long)]
    strict: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        MergerConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        MergerConfig::load()
    };

    // Uploads go to a scratch directory that lives only as long as this run
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    config.upload_root = scratch.path().to_path_buf();
    // Local files are not subject to the HTTP upload cap
    config.max_upload_bytes = usize::MAX;
    config.unknown_ids = UnknownIdPolicy::Reject;

    let merger = PdfMerger::new(config).context("Failed to initialize merger")?;
    let session = merger.get_or_create_session(None).await;

    #[allow(clippy::cast_possible_truncation)]
    let pb = ProgressBar::new(args.inputs.len() as u64);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut order = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        pb.set_message(input.display().to_string());

        let bytes = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let added = merger
            .add_files(&session, vec![RawFile::new(filename, bytes)])
            .await
            .with_context(|| format!("Failed to add {}", input.display()))?;

        let Some(file) = added.first() else {
            bail!("{} is not a readable PDF", input.display());
        };
        info!("{}: {} pages", input.display(), file.page_count);
        order.push(file.id);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Merging");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let merged = merger
        .merge(&session, &MergeRequest::new(order, args.page_numbers))
        .await
        .context("Failed to merge documents")?;

    spinner.finish_and_clear();

    if let PageNumbering::Skipped(reason) = &merged.page_numbers {
        if args.strict {
            bail!("Page numbers could not be added: {reason}");
        }
        warn!("Page numbers could not be added: {}", reason);
    }

    std::fs::write(&args.output, &merged.bytes)
        .with_context(|| format!("Failed to write output: {}", args.output.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Merged {} files ({} pages) into {}",
            args.inputs.len(),
            merged.page_count,
            args.output.display()
        );
    }

    Ok(())
}
