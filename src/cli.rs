use crate::batch::{BatchAborted, BatchFetcher, BatchReport, REPORT_FILE_NAME};
use crate::coords::CoordinateFile;
use crate::osm::{self, TileProvider};
use crate::provider::ImageryProvider;
use crate::request_template::RequestTemplate;
use crate::sentinelhub::{self, Credentials, SentinelHubConfig};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sentinel-batch")]
#[command(about = "Download one satellite image per coordinate pair")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        required_unless_present = "write_template",
        help = "File with one `<lat> <lon>` pair per line"
    )]
    pub file: Option<PathBuf>,

    #[arg(long, default_value = "output", help = "Output folder path")]
    pub output_folder: PathBuf,

    #[arg(long, default_value = "sentinel_image", help = "Image file name")]
    pub image_name: String,

    #[arg(long, value_enum, default_value_t = ProviderKind::SentinelHub)]
    pub provider: ProviderKind,

    #[arg(long, help = "Request template TOML [default: Sentinel-2 L2A true colour]")]
    pub template: Option<PathBuf>,

    #[arg(long, help = "Write the default request template to this path and exit")]
    pub write_template: Option<PathBuf>,

    #[arg(
        long,
        help = "Credentials TOML [default: SH_CLIENT_ID / SH_CLIENT_SECRET / SH_INSTANCE_ID]"
    )]
    pub credentials: Option<PathBuf>,

    #[arg(long, default_value = "https://services.sentinel-hub.com")]
    pub endpoint: String,

    #[arg(long, help = "OAuth token URL [default: derived from --endpoint]")]
    pub token_url: Option<String>,

    #[arg(long, default_value_t = 14, help = "Tile zoom level (osm provider)")]
    pub zoom: u8,

    #[arg(long, default_value = osm::DEFAULT_TILE_URL, help = "Tile URL template (osm provider)")]
    pub tile_url: String,

    #[arg(long, help = "Abort the batch on the first failed request")]
    pub fail_fast: bool,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Sentinel Hub Process API
    SentinelHub,
    /// OpenStreetMap raster tiles
    Osm,
}

/// `RUST_LOG` wins over `--verbose` when set.
pub fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.write_template {
        RequestTemplate::default()
            .write(path)
            .with_context(|| format!("Writing template to {}", path.display()))?;
        info!(path = %path.display(), "Default template written");
        return Ok(());
    }

    let file = cli
        .file
        .as_ref()
        .ok_or_else(|| anyhow!("--file is required"))?;
    let source = CoordinateFile::open(file)
        .with_context(|| format!("Opening coordinate file {}", file.display()))?;

    let mut template = match &cli.template {
        Some(path) => RequestTemplate::read(path)
            .with_context(|| format!("Reading template {}", path.display()))?,
        None => RequestTemplate::default(),
    };

    let outcome = match cli.provider {
        ProviderKind::SentinelHub => {
            let config = SentinelHubConfig::new(&cli.endpoint, cli.token_url.as_deref())
                .context("Invalid Sentinel Hub endpoint")?;
            let provider = match &cli.credentials {
                Some(path) => {
                    let credentials = Credentials::read(path)
                        .with_context(|| format!("Reading credentials {}", path.display()))?;
                    sentinelhub::Provider::new(config, credentials)?
                }
                None => sentinelhub::Provider::from_env(config)
                    .context("Sentinel Hub credentials not set")?,
            };
            fetch_all(&provider, &cli, &template, &source).await?
        }
        ProviderKind::Osm => {
            // Tiles are always PNG
            template.mime_type = "image/png".to_string();
            let provider = TileProvider::new(&cli.tile_url, cli.zoom)?;
            fetch_all(&provider, &cli, &template, &source).await?
        }
    };

    finish(&cli.output_folder, outcome)?;
    Ok(())
}

async fn fetch_all(
    provider: &impl ImageryProvider,
    cli: &Cli,
    template: &RequestTemplate,
    source: &CoordinateFile,
) -> Result<std::result::Result<BatchReport, BatchAborted>> {
    info!(
        provider = provider.name(),
        file = %source.path().display(),
        output = %cli.output_folder.display(),
        "Starting batch"
    );
    let pairs = source.pairs()?;
    let outcome = BatchFetcher::new(provider, template, &cli.output_folder, &cli.image_name)
        .fail_fast(cli.fail_fast)
        .run(pairs)
        .await;
    Ok(outcome)
}

/// Writes the report, partial or not, then passes an early stop on as the
/// run's error.
fn finish(
    output_folder: &Path,
    outcome: std::result::Result<BatchReport, BatchAborted>,
) -> Result<BatchReport> {
    let report = match &outcome {
        Ok(report) => report,
        Err(aborted) => &aborted.report,
    };

    let report_path = output_folder.join(REPORT_FILE_NAME);
    if output_folder.is_dir() {
        report
            .write(&report_path)
            .with_context(|| format!("Writing report to {}", report_path.display()))?;
    }

    if report.failures.is_empty() {
        info!(saved = report.saved.len(), "Batch complete");
    } else {
        warn!(
            saved = report.saved.len(),
            failed = report.failures.len(),
            report = %report_path.display(),
            "Batch finished with failures"
        );
    }

    Ok(outcome?)
}
