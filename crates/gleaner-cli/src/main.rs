mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gleaner_client::{HtmdCleaner, indeed_profile};
use gleaner_core::config::{DiscoveryMode, ScraperConfig};
use gleaner_core::models::CandidateRef;
use gleaner_core::profile::ProfileSource;
use gleaner_core::resolver::id_from_url;
use gleaner_core::snapshot::HtmlPage;
use gleaner_core::traits::ListingSource;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "gleaner",
    version,
    about = "Listing discovery and extraction through a real browser"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a listing site and extract every discovered posting
    Scrape {
        /// Search terms
        #[arg(short, long)]
        query: String,

        /// Locality filter, e.g. "Austin, TX" or "Remote"
        #[arg(short, long, default_value = "")]
        location: String,

        /// Discovery strategy: "address" (rewrite listing URLs) or "click" (drive the search form)
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<DiscoveryMode>,

        /// Concurrent detail pages
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Listing page ceiling
        #[arg(long)]
        max_pages: Option<u32>,

        /// Run Chromium without a window
        #[arg(long, default_value_t = false)]
        headless: bool,

        #[arg(short, long, value_enum, env = "GLEANER_FORMAT", default_value = "json")]
        format: OutputFormat,

        /// Write records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract one posting from a saved detail page
    ExtractFile {
        /// Saved HTML of a detail page
        #[arg(short, long)]
        file: PathBuf,

        /// Address the page was saved from
        #[arg(short, long)]
        url: String,

        #[arg(long, value_enum, env = "GLEANER_FORMAT", default_value = "json")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Records go to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("gleaner=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            query,
            location,
            mode,
            concurrency,
            max_pages,
            headless,
            format,
            output,
        } => {
            let mut config =
                ScraperConfig::from_env().context("Invalid GLEANER_* configuration")?;
            if let Some(mode) = mode {
                config.discovery_mode = mode;
            }
            if let Some(c) = concurrency {
                anyhow::ensure!(c >= 1, "--concurrency must be at least 1");
                config.max_concurrent_pages = c;
            }
            if let Some(n) = max_pages {
                anyhow::ensure!(n >= 1, "--max-pages must be at least 1");
                config.max_pages = n;
            }
            config.headless |= headless;
            cmd_scrape(&query, &location, config, format, output.as_deref()).await?;
        }
        Commands::ExtractFile { file, url, format } => {
            cmd_extract_file(&file, &url, format).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "browser")]
async fn cmd_scrape(
    query: &str,
    location: &str,
    config: ScraperConfig,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    use gleaner_client::{ChromeBrowser, LaunchOptions, connection_from_env};
    use gleaner_core::models::SearchRequest;
    use gleaner_core::scrape::ScrapeService;
    use gleaner_core::session::Session;

    let source = ProfileSource::new(indeed_profile()?, HtmdCleaner::new())
        .context("Invalid site profile")?;
    let connection = connection_from_env();

    let browser = ChromeBrowser::launch(&LaunchOptions {
        headless: config.headless,
        connection: connection.clone(),
        chrome_bin: None,
    })
    .await
    .context("Failed to launch browser")?;

    let service = ScrapeService::new(Session::new(browser, config, connection), source);
    let report = service.run(&SearchRequest::new(query, location)).await;

    tracing::info!(
        run_id = %report.run_id,
        stop_reason = %report.stop_reason,
        pages = report.pages_fetched,
        candidates = report.candidates,
        records = report.records.len(),
        batches = report.batches.len(),
        failures = ?report.failures,
        "Run complete"
    );

    if let Err(e) = service.shutdown().await {
        tracing::warn!(error = %e, "Browser shutdown failed");
    }

    output::emit(&report.records, format, output)
}

#[cfg(not(feature = "browser"))]
async fn cmd_scrape(
    _query: &str,
    _location: &str,
    _config: ScraperConfig,
    _format: OutputFormat,
    _output: Option<&Path>,
) -> Result<()> {
    anyhow::bail!(
        "gleaner was built without the `browser` feature; rebuild with --features browser"
    )
}

async fn cmd_extract_file(file: &Path, url: &str, format: OutputFormat) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read HTML file: {}", file.display()))?;

    let profile = indeed_profile()?;
    let id = id_from_url(url, &profile.id_param).unwrap_or_else(|| derive_id(file));
    let source =
        ProfileSource::new(profile, HtmdCleaner::new()).context("Invalid site profile")?;
    let page = HtmlPage::new(url, html);

    if source.detail_detector().is_blocked(&page).await {
        anyhow::bail!("{} is a bot challenge page, not a posting", file.display());
    }

    let record = source
        .extract_one(&page, &CandidateRef::new(id, url))
        .await
        .with_context(|| format!("No posting could be extracted from {}", file.display()))?;

    output::emit(std::slice::from_ref(&record), format, None)
}

fn parse_mode(raw: &str) -> Result<DiscoveryMode, String> {
    raw.parse().map_err(|e: gleaner_core::error::AppError| e.to_string())
}

/// Falls back to the file name when the address carries no id (e.g. "job_123.html" -> "job_123")
fn derive_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("local")
        .to_string()
}
