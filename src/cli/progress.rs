//! CLI-specific progress handling for sat-prep
//!
//! Provides the per-fetch progress bar used by the command-line interface.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::OnceCell;

use sat_prep::{DownloadTask, ProgressCallback, ProgressFactory, ProgressUpdate};

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec} ETA: {eta} {msg}";

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bytes} {bytes_per_sec} {msg}";

/// Creates a progress bar, or a spinner when the size is unknown
pub fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    }
}

/// Bar of one fetch, built on the first update once the declared size is known
///
/// Finished when the declared size is reached; otherwise (unknown size or a
/// failed fetch) finished in place when the callback owning it is dropped.
struct FetchBar {
    name: String,
    bar: OnceCell<ProgressBar>,
}

impl FetchBar {
    fn new(name: String) -> Self {
        Self {
            name,
            bar: OnceCell::new(),
        }
    }

    fn update(&self, update: ProgressUpdate) {
        let pb = self.bar.get_or_init(|| {
            let pb = create_progress_bar(update.total);
            pb.set_message(self.name.clone());
            pb
        });

        pb.set_position(update.downloaded);
        match update.total {
            Some(total) if update.downloaded >= total => {
                pb.finish_with_message("✅ Download completed!");
            }
            Some(_) => {}
            None => pb.tick(),
        }
    }
}

impl Drop for FetchBar {
    fn drop(&mut self) {
        if let Some(pb) = self.bar.get() {
            if !pb.is_finished() {
                pb.abandon();
            }
        }
    }
}

/// Progress factory for the CLI
///
/// Each fetch gets its own bar, created on the first callback.
pub fn progress_factory() -> ProgressFactory {
    Arc::new(|task: &DownloadTask| {
        let name = task
            .destination_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bar = FetchBar::new(name);

        let callback: ProgressCallback = Arc::new(move |update: ProgressUpdate| bar.update(update));
        callback
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(downloaded: u64, chunk: usize, total: Option<u64>) -> ProgressUpdate {
        ProgressUpdate {
            downloaded,
            chunk,
            total,
        }
    }

    #[test]
    fn test_create_progress_bar_with_length() {
        let pb = create_progress_bar(Some(1000));
        assert_eq!(pb.length(), Some(1000));
        pb.set_position(100);
        pb.finish();
    }

    #[test]
    fn test_create_spinner_without_length() {
        let pb = create_progress_bar(None);
        assert_eq!(pb.length(), None);
        pb.finish();
    }

    #[test]
    fn test_bar_finishes_at_declared_size() {
        let bar = FetchBar::new("train.txt".to_string());
        assert!(bar.bar.get().is_none());

        bar.update(update(0, 0, Some(10)));
        let pb = bar.bar.get().unwrap().clone();
        assert_eq!(pb.length(), Some(10));
        assert_eq!(pb.message(), "train.txt");
        assert!(!pb.is_finished());

        bar.update(update(10, 10, Some(10)));
        assert_eq!(pb.position(), 10);
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✅ Download completed!");
    }

    #[test]
    fn test_spinner_finished_when_fetch_ends() {
        let bar = FetchBar::new("a.txt".to_string());
        bar.update(update(0, 0, None));
        bar.update(update(16, 16, None));

        let pb = bar.bar.get().unwrap().clone();
        assert_eq!(pb.position(), 16);
        assert!(!pb.is_finished());

        drop(bar);
        assert!(pb.is_finished());
    }

    #[test]
    fn test_factory_builds_fresh_bar_per_fetch() {
        let factory = progress_factory();
        let first = factory(&DownloadTask::new("http://host/a.txt", "/tmp/a.txt"));
        let second = factory(&DownloadTask::new("http://host/b.txt", "/tmp/b.txt"));

        first(update(0, 0, Some(4)));
        first(update(4, 4, Some(4)));
        second(update(0, 0, None));
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
