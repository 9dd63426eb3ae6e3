use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod report;

use report::{OutputFormat, write_report};

use textlens_client::{HtmlParser, OpenAiClassifier, ReqwestFetcher};
use textlens_core::batch::DEFAULT_BATCH_SIZE;
use textlens_core::config::{DEFAULT_CONFIG_FILE, Settings};
use textlens_core::{
    BatchScheduler, CacheStore, CandidateExtractor, CheckService, ClassificationClient,
    ContentFetcher, RunState, TracingBatchReporter,
};

#[derive(Parser, Debug)]
#[command(
    name = "textlens",
    version,
    about = "Find images of text on web pages and judge them with a vision model"
)]
struct Cli {
    /// Pages to check
    #[arg(required_unless_present = "clear_cache")]
    urls: Vec<String>,

    /// Maximum number of images to classify per page
    #[arg(long)]
    max_images: Option<usize>,

    /// Number of images classified concurrently per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    batch_size: usize,

    /// Ignore the on-disk cache for this run
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Empty the cache before running
    #[arg(long, default_value_t = false)]
    clear_cache: bool,

    /// Report format written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

fn parse_batch_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{raw}' is not a positive integer")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("textlens=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config).context("Failed to load configuration")?;

    if cli.clear_cache {
        clear_cache(&settings);
    }
    if cli.urls.is_empty() {
        return Ok(());
    }

    let cache = if cli.no_cache || !settings.cache.enabled {
        tracing::info!("Cache disabled for this run");
        None
    } else {
        open_cache(&settings)
    };

    cmd_check(&cli, &settings, cache).await
}

/// Opens the configured cache. Failure disables caching instead of aborting.
fn open_cache(settings: &Settings) -> Option<CacheStore> {
    match CacheStore::open(&settings.cache.directory, settings.cache.ttl()) {
        Ok(cache) => {
            tracing::info!(directory = %settings.cache.directory.display(), "Using cache");
            Some(cache)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cache unavailable, continuing without it");
            None
        }
    }
}

fn clear_cache(settings: &Settings) {
    let result = CacheStore::open(&settings.cache.directory, settings.cache.ttl())
        .and_then(|cache| cache.clear_all());
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to clear cache");
    }
}

async fn cmd_check(cli: &Cli, settings: &Settings, cache: Option<CacheStore>) -> Result<()> {
    let classifier_settings = &settings.classifier;
    if classifier_settings.api_key.is_empty() {
        tracing::warn!("No API key configured (TEXTLENS_API_KEY or OPENAI_API_KEY)");
    }

    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let mut classifier = OpenAiClassifier::with_base_url(
        &classifier_settings.api_key,
        &classifier_settings.model,
        &classifier_settings.base_url,
    )
    .and_then(|c| c.with_timeout(classifier_settings.timeout()))
    .context("Failed to create classification client")?;
    if let Some(instructions) = &classifier_settings.instructions {
        classifier = classifier.with_instructions(instructions.clone());
    }

    let content = ContentFetcher::new(fetcher, HtmlParser::new()).with_cache(cache.clone());
    let extractor = cache
        .clone()
        .map(CandidateExtractor::with_cache)
        .unwrap_or_default();
    let client = ClassificationClient::new(classifier)
        .with_cache(cache)
        .with_max_retries(classifier_settings.max_retries)
        .with_attempt_timeout(classifier_settings.timeout());
    let scheduler = BatchScheduler::new(client, cli.batch_size);
    let service = CheckService::new(content, extractor, scheduler).with_max_images(cli.max_images);

    let mut state = RunState::new();
    tracing::info!(
        run_id = %state.run_id(),
        pages = cli.urls.len(),
        model = %classifier_settings.model,
        batch_size = cli.batch_size,
        "Starting check run"
    );

    service.run(&cli.urls, &mut state, &TracingBatchReporter).await;
    let report = state.finish();

    tracing::info!(
        run_id = %report.run_id,
        reports = report.reports.len(),
        errors = report.error_count(),
        non_compliant = report.non_compliant_count(),
        page_failures = report.page_failures.len(),
        "Check run complete"
    );

    let mut stdout = std::io::stdout().lock();
    write_report(&report, cli.format, &mut stdout).context("Failed to write report")?;

    Ok(())
}
