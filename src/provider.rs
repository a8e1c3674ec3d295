use crate::error::{FetchError, Result};
use crate::request_template::ImageryRequest;
use futures_util::StreamExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file a provider left in the data folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: u64,
}

pub trait ImageryProvider {
    fn name(self: &Self) -> &str;

    /// Executes `request` and writes the response somewhere under
    /// `data_folder`. The caller decides the final file name.
    async fn submit(self: &Self, request: &ImageryRequest, data_folder: &Path) -> Result<Artifact>;
}

/// Staging name for a request's response, unique per bounding box.
pub fn staging_path(data_folder: &Path, request: &ImageryRequest) -> PathBuf {
    let [min_x, min_y, max_x, max_y] = request.bbox.as_array();
    data_folder.join(format!(
        ".{min_x:.6}_{min_y:.6}_{max_x:.6}_{max_y:.6}.{}.partial",
        request.extension
    ))
}

/// Streams a successful response body to `output`. Non-success statuses
/// become `FetchError::Status` carrying the response text.
pub async fn save_response(response: reqwest::Response, output: &Path) -> Result<Artifact> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Status { status, body });
    }

    if let Some(parent) = output.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    match write_body(response, output).await {
        Ok(byte_count) => {
            debug!(path = %output.display(), bytes = byte_count, "Response saved");
            Ok(Artifact {
                path: output.to_path_buf(),
                bytes: byte_count,
            })
        }
        Err(e) => {
            // Don't leave a truncated file behind
            let _ = fs::remove_file(output);
            Err(e)
        }
    }
}

async fn write_body(response: reqwest::Response, output: &Path) -> Result<u64> {
    let mut file = File::create(output)?;
    let mut byte_count = 0_u64;
    let mut stream = response.bytes_stream();
    while let Some(bytes) = stream.next().await {
        let bytes = bytes?;
        file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    file.flush()?;
    Ok(byte_count)
}
