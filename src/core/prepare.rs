//! Idempotent dataset preparation
//!
//! Decides whether a fetch is needed (an existing destination file counts
//! as done), runs it, and removes the partial file when it fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{Stream, TryStreamExt};
use indicatif::HumanBytes;
use log::{debug, warn};
use serde::Serialize;

use crate::core::catalog::{DatasetSource, ResolvedDataset};
use crate::core::error::{Error, Result};
use crate::core::fetch::{DownloadTask, Fetcher};
use crate::core::stream::{FetchConfig, ProgressCallback};

/// Fixed file name of the single-resource form
pub const TRAIN_FILE_NAME: &str = "train.txt";

/// Builds a fresh progress callback for each fetch
pub type ProgressFactory = Arc<dyn Fn(&DownloadTask) -> ProgressCallback + Send + Sync>;

/// Terminal outcome of preparing one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// File was already on disk, nothing fetched
    AlreadyPresent { size: u64 },
    /// File was fetched in this run
    Downloaded { size: u64 },
    /// Fetch failed and was skipped (only produced under `BatchPolicy::KeepGoing`)
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparationResult {
    pub resolved_path: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl PreparationResult {
    fn new(resolved_path: PathBuf, outcome: Outcome) -> Self {
        Self {
            resolved_path,
            outcome,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// What a batch does when one item fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure and return it (default)
    #[default]
    FailFast,
    /// Record the failure as `Outcome::Failed` and move on
    KeepGoing,
}

/// Per-outcome counts of a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub existing: usize,
    pub downloaded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyPresent { .. } => self.existing += 1,
            Outcome::Downloaded { .. } => self.downloaded += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.existing + self.downloaded + self.failed
    }
}

/// Derive a local file name from a URL: last path segment, query dropped
///
/// `https://host/dir/SAT_4_Random_Test.txt?download=true` gives
/// `SAT_4_Random_Test.txt`. Falls back to `download` when the URL has no
/// usable segment.
pub fn filename_from_url(source_url: &str) -> String {
    let segment = match reqwest::Url::parse(source_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => source_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    };

    segment
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "download".to_string())
}

/// Size of an existing file, `None` if there is nothing at `path`
async fn existing_size(path: &Path) -> Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(Some(metadata.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::filesystem(path, e)),
    }
}

/// Removes the destination when dropped, unless the fetch completed
///
/// Also runs while a panicking progress callback unwinds.
struct PartialFile<'a> {
    path: &'a Path,
    complete: bool,
}

impl<'a> PartialFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            complete: false,
        }
    }

    fn keep(mut self) {
        self.complete = true;
    }
}

impl Drop for PartialFile<'_> {
    fn drop(&mut self) {
        if self.complete {
            return;
        }
        match std::fs::remove_file(self.path) {
            Ok(()) => debug!("Removed partial file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove partial file {}: {e}", self.path.display()),
        }
    }
}

/// Rejects file names that would escape the target directory
fn checked_file_name(name: String) -> Result<String> {
    let is_plain = Path::new(&name).file_name().and_then(|n| n.to_str()) == Some(name.as_str());
    if is_plain {
        Ok(name)
    } else {
        Err(Error::InvalidInput(format!(
            "'{name}' is not a plain file name"
        )))
    }
}

/// Downloads dataset files unless they are already on disk
pub struct Preparer {
    fetcher: Fetcher,
    progress: Option<ProgressFactory>,
}

impl Preparer {
    /// Create a preparer with a default fetcher
    pub fn new() -> Result<Self> {
        Ok(Self::with_fetcher(Fetcher::new()?))
    }

    /// Create a preparer with a custom fetch configuration
    pub fn with_config(config: FetchConfig) -> Result<Self> {
        Ok(Self::with_fetcher(Fetcher::with_config(config)?))
    }

    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            progress: None,
        }
    }

    /// Attach a progress factory; each fetch gets its own callback
    pub fn with_progress(mut self, factory: ProgressFactory) -> Self {
        self.progress = Some(factory);
        self
    }

    /// Prepare a single-file dataset as `<target_dir>/train.txt`
    ///
    /// Returns `AlreadyPresent` without touching the network when the file
    /// exists. On failure the partial file is removed and the error is
    /// returned unchanged.
    pub async fn prepare(
        &self,
        label: &str,
        source_url: &str,
        target_dir: impl AsRef<Path>,
    ) -> Result<PreparationResult> {
        let target_dir = target_dir.as_ref();
        let destination_path = target_dir.join(TRAIN_FILE_NAME);

        eprintln!("📁 Dataset directory: {}", target_dir.display());
        eprintln!("📄 Target file: {}", destination_path.display());
        eprintln!("🔖 Dataset: {label}");

        if let Some(size) = existing_size(&destination_path).await? {
            eprintln!("✅ Dataset already exists ({})", HumanBytes(size));
            eprintln!("🚀 Ready to use!");
            return Ok(PreparationResult::new(
                destination_path,
                Outcome::AlreadyPresent { size },
            ));
        }

        eprintln!("🔗 Downloading from: {source_url}");
        eprintln!("📥 Starting download...");

        match self.download(source_url, &destination_path).await {
            Ok(size) => {
                eprintln!("✅ Dataset downloaded successfully! ({})", HumanBytes(size));
                Ok(PreparationResult::new(
                    destination_path,
                    Outcome::Downloaded { size },
                ))
            }
            Err(e) => {
                eprintln!("❌ Download failed: {e}");
                Err(e)
            }
        }
    }

    /// Prepare many files lazily, in input order
    ///
    /// Each URL is written to `target_dir/filename_fn(url)`. Nothing happens
    /// until the stream is polled. Under `BatchPolicy::FailFast` the first
    /// failure is yielded as `Err` and the stream ends there; under
    /// `KeepGoing` failures are yielded as `Outcome::Failed`.
    pub fn prepare_many<'a, F>(
        &'a self,
        label: &'a str,
        source_urls: Vec<String>,
        target_dir: &'a Path,
        filename_fn: F,
        policy: BatchPolicy,
    ) -> impl Stream<Item = Result<PreparationResult>> + 'a
    where
        F: Fn(&str) -> String + 'a,
    {
        let batch = Batch {
            preparer: self,
            label,
            target_dir,
            filename_fn,
            policy,
            total: source_urls.len(),
            pending: source_urls.into_iter().enumerate(),
        };

        futures::stream::try_unfold(batch, |mut batch| async move {
            let Some((index, source_url)) = batch.pending.next() else {
                return Ok(None);
            };

            if index == 0 {
                batch.announce();
            }

            let result = batch.prepare_item(index, &source_url).await?;
            Ok::<_, Error>(Some((result, batch)))
        })
    }

    /// Drain `prepare_many` and print the batch summary
    pub async fn prepare_all<I, S, F>(
        &self,
        label: &str,
        source_urls: I,
        target_dir: &Path,
        filename_fn: F,
        policy: BatchPolicy,
    ) -> Result<(Vec<PreparationResult>, BatchSummary)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> String,
    {
        let source_urls = source_urls.into_iter().map(Into::into).collect();
        let stream = self.prepare_many(label, source_urls, target_dir, filename_fn, policy);
        futures::pin_mut!(stream);

        let mut results = Vec::new();
        let mut summary = BatchSummary::default();

        while let Some(result) = stream.try_next().await? {
            summary.record(&result.outcome);
            results.push(result);
        }

        eprintln!("\n🎉 Dataset preparation complete!");
        eprintln!(
            "📊 Summary: {} files existed, {} files downloaded",
            summary.existing, summary.downloaded
        );
        if summary.failed > 0 {
            eprintln!("⚠️  {} files failed", summary.failed);
        }
        eprintln!("🚀 Ready to use!");

        Ok((results, summary))
    }

    /// Prepare a catalog dataset in whichever form its layout needs
    pub async fn prepare_dataset(
        &self,
        dataset: &ResolvedDataset,
        target_dir: &Path,
        policy: BatchPolicy,
    ) -> Result<(Vec<PreparationResult>, BatchSummary)> {
        match &dataset.source {
            DatasetSource::Single { url } => {
                let result = self.prepare(&dataset.label, url, target_dir).await?;
                let mut summary = BatchSummary::default();
                summary.record(&result.outcome);
                Ok((vec![result], summary))
            }
            DatasetSource::Many { urls } => {
                self.prepare_all(
                    &dataset.label,
                    urls.iter().cloned(),
                    target_dir,
                    filename_from_url,
                    policy,
                )
                .await
            }
        }
    }

    /// Fetch into `destination_path`, cleaning up on any failure
    async fn download(&self, source_url: &str, destination_path: &Path) -> Result<u64> {
        let task = DownloadTask::new(source_url, destination_path);

        if let Some(parent) = task.destination_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::filesystem(parent, e))?;
        }

        let progress = self.progress.as_ref().map(|factory| factory(&task));
        let partial = PartialFile::new(&task.destination_path);

        let state = self.fetcher.fetch(&task, progress.as_ref()).await?;
        debug!(
            "Fetched {} bytes into {}",
            state.bytes_downloaded,
            task.destination_path.display()
        );
        let metadata = tokio::fs::metadata(&task.destination_path)
            .await
            .map_err(|e| Error::filesystem(&task.destination_path, e))?;

        partial.keep();
        Ok(metadata.len())
    }
}

/// State threaded through the lazy batch stream
struct Batch<'a, F> {
    preparer: &'a Preparer,
    label: &'a str,
    target_dir: &'a Path,
    filename_fn: F,
    policy: BatchPolicy,
    total: usize,
    pending: std::iter::Enumerate<std::vec::IntoIter<String>>,
}

impl<F> Batch<'_, F>
where
    F: Fn(&str) -> String,
{
    fn announce(&self) {
        eprintln!("📁 Dataset directory: {}", self.target_dir.display());
        eprintln!("🔖 Dataset: {}", self.label);
        eprintln!("📦 Total files to process: {}", self.total);
    }

    /// Prepare one batch item; failures follow the batch policy
    async fn prepare_item(&self, index: usize, source_url: &str) -> Result<PreparationResult> {
        let file_name = (self.filename_fn)(source_url);
        eprintln!("\n[{}/{}] Processing {file_name}...", index + 1, self.total);

        let (destination_path, attempt) = match checked_file_name(file_name) {
            Ok(file_name) => {
                let destination_path = self.target_dir.join(&file_name);
                let attempt = self.fetch_missing(&file_name, source_url, &destination_path).await;
                (destination_path, attempt)
            }
            Err(e) => (self.target_dir.to_path_buf(), Err(e)),
        };

        match attempt {
            Ok(outcome) => Ok(PreparationResult::new(destination_path, outcome)),
            Err(e) => {
                eprintln!("❌ Failed to prepare {}: {e}", destination_path.display());
                match self.policy {
                    BatchPolicy::FailFast => Err(e),
                    BatchPolicy::KeepGoing => Ok(PreparationResult::new(
                        destination_path,
                        Outcome::Failed {
                            reason: e.to_string(),
                        },
                    )),
                }
            }
        }
    }

    async fn fetch_missing(
        &self,
        file_name: &str,
        source_url: &str,
        destination_path: &Path,
    ) -> Result<Outcome> {
        if let Some(size) = existing_size(destination_path).await? {
            eprintln!("✅ Already exists ({})", HumanBytes(size));
            return Ok(Outcome::AlreadyPresent { size });
        }

        eprintln!("📥 Downloading {file_name}...");
        let size = self.preparer.download(source_url, destination_path).await?;
        eprintln!("✅ {file_name} downloaded ({})", HumanBytes(size));
        Ok(Outcome::Downloaded { size })
    }
}
