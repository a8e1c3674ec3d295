use crate::coords::CoordinatePair;
use crate::error::{FetchError, Result};
use crate::provider::ImageryProvider;
use crate::request_template::RequestTemplate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const REPORT_FILE_NAME: &str = "batch_report.json";

/// Shortest decimal that reads back as the same value: `1.0`, `37.7749`,
/// `-4.25`, `-0.0`. Values below 1e-4 or from 1e16 up use an exponent with a
/// sign and at least two digits (`1e-05`, `1.5e+16`).
pub fn format_coordinate(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let repr = format!("{value:?}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => repr,
    }
}

/// `<base>_<lat>_<lon>.<ext>`
pub fn artifact_file_name(base: &str, pair: &CoordinatePair, extension: &str) -> String {
    format!(
        "{}_{}_{}.{}",
        base,
        format_coordinate(pair.latitude),
        format_coordinate(pair.longitude),
        extension
    )
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SavedArtifact {
    pub pair: CoordinatePair,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub pair: CoordinatePair,
    pub error: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub provider: String,
    pub attempted: usize,
    pub saved: Vec<SavedArtifact>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let report: Self = serde_json::from_str(&content)?;
        Ok(report)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// A batch that stopped early, with everything done up to that point.
#[derive(Error, Debug)]
#[error("Batch aborted after {} items: {error}", .report.attempted)]
pub struct BatchAborted {
    pub report: BatchReport,
    #[source]
    pub error: FetchError,
}

/// Requests one image per coordinate pair, one at a time.
pub struct BatchFetcher<'a, P> {
    provider: &'a P,
    template: &'a RequestTemplate,
    output_dir: PathBuf,
    image_name: String,
    fail_fast: bool,
}

impl<'a, P: ImageryProvider> BatchFetcher<'a, P> {
    pub fn new(
        provider: &'a P,
        template: &'a RequestTemplate,
        output_dir: impl Into<PathBuf>,
        image_name: &str,
    ) -> Self {
        Self {
            provider,
            template,
            output_dir: output_dir.into(),
            image_name: image_name.to_string(),
            fail_fast: false,
        }
    }

    /// Stop at the first failed item instead of moving on.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// An `Err` item from `pairs` means the input could not be read and
    /// ends the batch. Per-item failures are collected in the report unless
    /// `fail_fast` is set. An early stop still hands back the partial report.
    pub async fn run<I>(self: &Self, pairs: I) -> std::result::Result<BatchReport, BatchAborted>
    where
        I: IntoIterator<Item = Result<CoordinatePair>>,
    {
        let mut report = BatchReport {
            provider: self.provider.name().to_string(),
            ..Default::default()
        };

        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            return Err(BatchAborted {
                report,
                error: e.into(),
            });
        }

        for pair in pairs {
            let pair = match pair {
                Ok(pair) => pair,
                Err(error) => return Err(BatchAborted { report, error }),
            };
            report.attempted += 1;

            match self.fetch_one(&pair).await {
                Ok(saved) => {
                    info!(
                        lat = pair.latitude,
                        lon = pair.longitude,
                        path = %saved.path.display(),
                        "Image saved"
                    );
                    report.saved.push(saved);
                }
                Err(e) => {
                    warn!(lat = pair.latitude, lon = pair.longitude, "Request failed: {e}");
                    report.failures.push(ItemFailure {
                        pair,
                        error: e.to_string(),
                    });
                    if self.fail_fast {
                        return Err(BatchAborted { report, error: e });
                    }
                }
            }
        }

        Ok(report)
    }

    async fn fetch_one(self: &Self, pair: &CoordinatePair) -> Result<SavedArtifact> {
        let request = self.template.build(pair)?;
        let artifact = self.provider.submit(&request, &self.output_dir).await?;

        let file_name = artifact_file_name(&self.image_name, pair, &request.extension);
        let dst = self.output_dir.join(file_name);
        move_into_place(&artifact.path, &dst)?;

        Ok(SavedArtifact {
            pair: *pair,
            path: dst,
            bytes: artifact.bytes,
        })
    }
}

/// Renames `src` to `dst`, replacing whatever is at `dst`. The source is
/// removed if the move fails.
fn move_into_place(src: &Path, dst: &Path) -> Result<()> {
    let result = (|| {
        if dst.exists() {
            fs::remove_file(dst)?;
        }
        fs::rename(src, dst)
    })();

    result.map_err(|source| {
        let _ = fs::remove_file(src);
        FetchError::Rename {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source,
        }
    })
}
