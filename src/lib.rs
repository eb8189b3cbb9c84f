//! # sat-prep Library
//!
//! Idempotent downloads of pre-generated SAT-solver training and evaluation
//! corpora.
//!
//! ## Features
//!
//! - **Idempotent**: a file already on disk is never fetched again
//! - **No partial files**: a failed fetch removes what it wrote
//! - **Progress tracking**: per-fetch callbacks, also for unknown sizes
//! - **Batches**: lazy, ordered multi-file preparation, fail-fast by default
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Single file, written as ./data/train.txt
//!     sat_prep::prepare(
//!         "SAT 6-10 Skewed State Large",
//!         "https://huggingface.co/datasets/leyanpan/sat-solver/resolve/main/large-500k/SAT_6_10_skewed_large.txt?download=true",
//!         "./data",
//!     ).await?;
//!
//!     // Catalog dataset by id
//!     sat_prep::prepare_dataset("sat-var-eval", "./num_var_test").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Progress Tracking
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sat_prep::{DownloadTask, Preparer, ProgressCallback, ProgressUpdate};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let preparer = Preparer::new()?.with_progress(Arc::new(|task: &DownloadTask| {
//!     let name = task.destination_path.display().to_string();
//!     let callback: ProgressCallback = Arc::new(move |update: ProgressUpdate| {
//!         match update.total {
//!             Some(total) => println!("{name}: {}/{total} bytes", update.downloaded),
//!             None => println!("{name}: {} bytes", update.downloaded),
//!         }
//!     });
//!     callback
//! }));
//!
//! preparer.prepare("X", "http://host/a.txt", "/tmp/d").await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub use crate::core::catalog::{
    Catalog, CatalogConfig, DatasetKind, DatasetSource, DatasetSpec, ResolvedDataset,
    DEFAULT_BASE_URL,
};
pub use crate::core::error::{Error, Result};
pub use crate::core::fetch::{parse_http_url, DownloadTask, Fetcher};
pub use crate::core::prepare::{
    filename_from_url, BatchPolicy, BatchSummary, Outcome, PreparationResult, Preparer,
    ProgressFactory, TRAIN_FILE_NAME,
};
pub use crate::core::stream::{FetchConfig, ProgressCallback, ProgressState, ProgressUpdate};

// Internal modules
mod core;

/// Prepare a single-file dataset as `<target_dir>/train.txt`
///
/// # Arguments
/// * `label` - Display name of the dataset
/// * `source_url` - http/https URL of the file
/// * `target_dir` - Directory to write into (created when missing)
pub async fn prepare(
    label: &str,
    source_url: &str,
    target_dir: impl AsRef<Path>,
) -> Result<PreparationResult> {
    Preparer::new()?
        .prepare(label, source_url, target_dir)
        .await
}

/// Prepare a catalog dataset by id, fail-fast
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let results = sat_prep::prepare_dataset("sat-var-eval", "./num_var_test").await?;
/// println!("{} files ready", results.len());
/// # Ok(())
/// # }
/// ```
pub async fn prepare_dataset(
    id: &str,
    target_dir: impl AsRef<Path>,
) -> Result<Vec<PreparationResult>> {
    let dataset = Catalog::new().resolve(id)?;
    let (results, _summary) = Preparer::new()?
        .prepare_dataset(&dataset, target_dir.as_ref(), BatchPolicy::FailFast)
        .await?;
    Ok(results)
}
