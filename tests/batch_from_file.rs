use sentinel_batch::batch::{BatchFetcher, BatchReport, REPORT_FILE_NAME};
use sentinel_batch::coords::CoordinateFile;
use sentinel_batch::error::{FetchError, Result};
use sentinel_batch::provider::{staging_path, Artifact, ImageryProvider};
use sentinel_batch::request_template::{ImageryRequest, RequestTemplate};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Fails every `fail_every`-th call, writes a small file otherwise.
struct FlakyProvider {
    calls: Cell<usize>,
    fail_every: usize,
}

impl ImageryProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn submit(&self, request: &ImageryRequest, data_folder: &Path) -> Result<Artifact> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if call % self.fail_every == 0 {
            return Err(FetchError::Auth("token expired".to_string()));
        }
        let path = staging_path(data_folder, request);
        fs::write(&path, b"\x89PNG")?;
        Ok(Artifact { path, bytes: 4 })
    }
}

fn coordinate_file(dir: &TempDir) -> CoordinateFile {
    let path = dir.path().join("coords.txt");
    fs::write(
        &path,
        "37.7749 -122.4194\n\
         not a pair\n\
         51.5 -0.12 7\n\
         \n\
         -33.9 151.2\n\
         48.8566 2.3522\n",
    )
    .unwrap();
    CoordinateFile::open(&path).unwrap()
}

#[tokio::test]
async fn test_batch_from_file() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = coordinate_file(&input);

    let provider = FlakyProvider {
        calls: Cell::new(0),
        fail_every: 2,
    };
    let template = RequestTemplate::default();
    let fetcher = BatchFetcher::new(&provider, &template, output.path(), "sentinel_image");
    let report = fetcher.run(source.pairs().unwrap()).await.unwrap();

    // Three valid lines, the second request fails
    assert_eq!(provider.calls.get(), 3);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.saved.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(output.path().join("sentinel_image_37.7749_-122.4194.png").exists());
    assert!(!output.path().join("sentinel_image_-33.9_151.2.png").exists());
    assert!(output.path().join("sentinel_image_48.8566_2.3522.png").exists());

    let report_path = output.path().join(REPORT_FILE_NAME);
    report.write(&report_path).unwrap();
    let read_back = BatchReport::read(&report_path).unwrap();
    assert_eq!(read_back.provider, "flaky");
    assert_eq!(read_back.failures[0].error, "Authentication failed: token expired");
}

#[tokio::test]
async fn test_rerun_gives_same_files() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = coordinate_file(&input);

    let provider = FlakyProvider {
        calls: Cell::new(0),
        fail_every: usize::MAX,
    };
    let template = RequestTemplate::default();
    let fetcher = BatchFetcher::new(&provider, &template, output.path(), "img");

    let first = fetcher.run(source.pairs().unwrap()).await.unwrap();
    let second = fetcher.run(source.pairs().unwrap()).await.unwrap();

    let paths = |r: &BatchReport| r.saved.iter().map(|s| s.path.clone()).collect::<Vec<_>>();
    assert_eq!(paths(&first), paths(&second));
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 3);
}
