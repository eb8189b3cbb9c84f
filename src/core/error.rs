//! Error types for sat-prep
//!
//! Every failure is either a network failure (DNS, connect, non-2xx status,
//! interrupted transfer) or a filesystem failure (directory creation, open,
//! write). Catalog lookups add a third family for unknown dataset ids.

use std::fmt;
use std::path::{Path, PathBuf};

use strsim::{jaro_winkler, normalized_levenshtein};

/// Minimum blended similarity for a dataset id suggestion
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Main error type for sat-prep operations
#[derive(Debug)]
pub enum Error {
    /// Source URL is not a usable http/https URL
    InvalidUrl(String),

    /// Connection, DNS, timeout or mid-stream transfer failure
    NetworkError(String),

    /// Server answered with a non-2xx status
    HttpStatus { url: String, status: u16 },

    /// Destination could not be created, opened or written
    Filesystem { path: PathBuf, source: std::io::Error },

    /// Dataset id not present in the catalog
    DatasetNotFound {
        id: String,
        suggestion: Option<String>,
    },

    /// Batch finished with failed items (skip-and-continue mode)
    BatchIncomplete { failed: usize, total: usize },

    /// Invalid configuration or parameters
    InvalidInput(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for the network family (includes HTTP status failures)
    pub fn is_network(&self) -> bool {
        matches!(self, Error::NetworkError(_) | Error::HttpStatus { .. })
    }

    /// True for the filesystem family
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Error::Filesystem { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Error::NetworkError(msg) => write!(f, "Network error: {msg}"),
            Error::HttpStatus { url, status } => {
                write!(f, "HTTP error: server returned {status} for {url}")
            }
            Error::Filesystem { path, source } => {
                write!(f, "Filesystem error at {}: {source}", path.display())
            }
            Error::DatasetNotFound { id, suggestion } => match suggestion {
                Some(suggestion) => {
                    write!(f, "Dataset '{id}' not found. Did you mean '{suggestion}'?")
                }
                None => write!(
                    f,
                    "Dataset '{id}' not found. Run with --list to see available datasets"
                ),
            },
            Error::BatchIncomplete { failed, total } => {
                write!(f, "{failed} of {total} files failed to download")
            }
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Filesystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            },
            _ => Error::NetworkError(error_chain(&err)),
        }
    }
}

/// Render an error followed by each of its causes, `outer: inner: root`
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

/// Convenience result type for sat-prep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Suggest the closest known id for a misspelled one
///
/// Blends Jaro-Winkler (70%) with normalized Levenshtein (30%). Returns
/// `None` for an exact (case-insensitive) match or when nothing clears the
/// threshold.
pub fn suggest_correction<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();
        if candidate_lower == input_lower {
            return None;
        }

        let score = jaro_winkler(&input_lower, &candidate_lower) * 0.7
            + normalized_levenshtein(&input_lower, &candidate_lower) * 0.3;

        if score >= SUGGESTION_THRESHOLD && score > best_score {
            best_score = score;
            best_match = Some(candidate.to_string());
        }
    }

    best_match
}
