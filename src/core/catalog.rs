//! Dataset catalog for sat-prep
//!
//! Maps dataset ids to the remote files that make them up.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::core::error::{suggest_correction, Error, Result};

/// Hugging Face mirror hosting the generated corpora
pub const DEFAULT_BASE_URL: &str =
    "https://huggingface.co/datasets/leyanpan/sat-solver/resolve/main";

/// Query marker asking the host for a file download instead of a preview page
const DOWNLOAD_MARKER: &str = "download=true";

/// Variable counts covered by the evaluation set
const VAR_EVAL_SIZES: std::ops::RangeInclusive<u32> = 4..=20;

/// Sampling conditions of the evaluation set
const VAR_EVAL_CONDITIONS: [&str; 4] = ["Random", "Skewed", "Var", "Marginal"];

/// Remote layout of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetKind {
    /// One file, stored locally as `train.txt`
    Single { path: &'static str },
    /// Many files under one remote folder, stored under their own names
    Many {
        folder: &'static str,
        files: Vec<String>,
    },
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSpec {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: DatasetKind,
}

impl DatasetSpec {
    pub fn file_count(&self) -> usize {
        match &self.kind {
            DatasetKind::Single { .. } => 1,
            DatasetKind::Many { files, .. } => files.len(),
        }
    }
}

fn var_eval_files() -> Vec<String> {
    VAR_EVAL_SIZES
        .flat_map(|num_var| {
            VAR_EVAL_CONDITIONS
                .iter()
                .map(move |condition| format!("SAT_{num_var}_{condition}_Test.txt"))
        })
        .collect()
}

static DATASETS: Lazy<Vec<DatasetSpec>> = Lazy::new(|| {
    vec![
        DatasetSpec {
            id: "sat-11-15-random-large",
            label: "SAT 11-15 Random State Large",
            kind: DatasetKind::Single {
                path: "large-500k/SAT_11_15_random_large.txt",
            },
        },
        DatasetSpec {
            id: "sat-6-10-skewed-large",
            label: "SAT 6-10 Skewed State Large",
            kind: DatasetKind::Single {
                path: "large-500k/SAT_6_10_skewed_large.txt",
            },
        },
        DatasetSpec {
            id: "sat-var-eval",
            label: "SAT Variable Evaluation Test Set",
            kind: DatasetKind::Many {
                folder: "num_var_test",
                files: var_eval_files(),
            },
        },
    ]
});

/// Where the dataset files live remotely
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    Single { url: String },
    Many { urls: Vec<String> },
}

/// A catalog entry with concrete URLs
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDataset {
    pub id: String,
    pub label: String,
    pub source: DatasetSource,
}

impl ResolvedDataset {
    pub fn urls(&self) -> Vec<&str> {
        match &self.source {
            DatasetSource::Single { url } => vec![url.as_str()],
            DatasetSource::Many { urls } => urls.iter().map(String::as_str).collect(),
        }
    }
}

/// Configuration for catalog URL construction
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL the dataset paths are appended to
    pub base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Resolves dataset ids to download URLs
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    config: CatalogConfig,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        Self { config }
    }

    /// All known datasets, in display order
    pub fn datasets(&self) -> &'static [DatasetSpec] {
        DATASETS.as_slice()
    }

    pub fn find(&self, id: &str) -> Option<&'static DatasetSpec> {
        DATASETS
            .iter()
            .find(|spec| spec.id.eq_ignore_ascii_case(id))
    }

    /// Resolve a dataset id to its download URLs
    pub fn resolve(&self, id: &str) -> Result<ResolvedDataset> {
        let spec = self.find(id).ok_or_else(|| Error::DatasetNotFound {
            id: id.to_string(),
            suggestion: suggest_correction(id, DATASETS.iter().map(|spec| spec.id)),
        })?;

        let source = match &spec.kind {
            DatasetKind::Single { path } => DatasetSource::Single {
                url: self.dataset_url(path),
            },
            DatasetKind::Many { folder, files } => DatasetSource::Many {
                urls: files
                    .iter()
                    .map(|file| self.dataset_url(&format!("{folder}/{file}")))
                    .collect(),
            },
        };

        Ok(ResolvedDataset {
            id: spec.id.to_string(),
            label: spec.label.to_string(),
            source,
        })
    }

    fn dataset_url(&self, path: &str) -> String {
        format!(
            "{}/{path}?{DOWNLOAD_MARKER}",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prepare::filename_from_url;

    #[test]
    fn test_resolve_single_dataset() {
        let dataset = Catalog::new().resolve("sat-6-10-skewed-large").unwrap();

        assert_eq!(dataset.label, "SAT 6-10 Skewed State Large");
        match dataset.source {
            DatasetSource::Single { url } => assert_eq!(
                url,
                "https://huggingface.co/datasets/leyanpan/sat-solver/resolve/main/large-500k/SAT_6_10_skewed_large.txt?download=true"
            ),
            other => panic!("Expected single source, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_var_eval_dataset() {
        let dataset = Catalog::new().resolve("sat-var-eval").unwrap();
        let urls = dataset.urls();

        assert_eq!(urls.len(), 17 * 4);
        assert_eq!(
            urls[0],
            "https://huggingface.co/datasets/leyanpan/sat-solver/resolve/main/num_var_test/SAT_4_Random_Test.txt?download=true"
        );
        assert_eq!(filename_from_url(urls[1]), "SAT_4_Skewed_Test.txt");
        assert_eq!(filename_from_url(urls[4]), "SAT_5_Random_Test.txt");
        assert_eq!(filename_from_url(urls[67]), "SAT_20_Marginal_Test.txt");
    }

    #[test]
    fn test_custom_base_url() {
        let catalog = Catalog::with_config(CatalogConfig {
            base_url: "http://mirror.local/sat/".to_string(),
        });
        let dataset = catalog.resolve("sat-11-15-random-large").unwrap();
        assert_eq!(
            dataset.urls(),
            vec!["http://mirror.local/sat/large-500k/SAT_11_15_random_large.txt?download=true"]
        );
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let dataset = Catalog::new().resolve("SAT-VAR-EVAL").unwrap();
        assert_eq!(dataset.id, "sat-var-eval");
    }

    #[test]
    fn test_unknown_dataset_suggests_correction() {
        match Catalog::new().resolve("sat-var-evl") {
            Err(Error::DatasetNotFound { id, suggestion }) => {
                assert_eq!(id, "sat-var-evl");
                assert_eq!(suggestion.as_deref(), Some("sat-var-eval"));
            }
            other => panic!("Expected DatasetNotFound, got {other:?}"),
        }

        match Catalog::new().resolve("imagenet") {
            Err(Error::DatasetNotFound { suggestion, .. }) => assert_eq!(suggestion, None),
            other => panic!("Expected DatasetNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_file_counts() {
        let catalog = Catalog::new();
        let counts: Vec<usize> = catalog.datasets().iter().map(DatasetSpec::file_count).collect();
        assert_eq!(counts, vec![1, 1, 68]);
    }
}
