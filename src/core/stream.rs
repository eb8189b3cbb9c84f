//! Streaming and progress types for sat-prep
//!
//! Provides the response body reader used by the fetcher, the progress
//! callback contract and the fetch options.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::TryStreamExt;
use tokio::io::{AsyncRead, ReadBuf};

/// Response body exposed as an `AsyncRead`
pub struct BodyStream(Box<dyn AsyncRead + Send + Unpin>);

impl AsyncRead for BodyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

/// Creates a BodyStream from an HTTP response
pub fn create_http_stream(response: reqwest::Response) -> BodyStream {
    let stream = tokio_util::io::StreamReader::new(
        response
            .bytes_stream()
            .map_err(std::io::Error::other),
    );
    BodyStream(Box::new(stream))
}

/// One progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes written so far
    pub downloaded: u64,
    /// Size of the chunk that triggered this update (0 for the initial call)
    pub chunk: usize,
    /// Declared size, `None` when the server sent no Content-Length
    pub total: Option<u64>,
}

/// Progress callback invoked inline with the transfer
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Byte counters of a single fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
}

impl ProgressState {
    pub(crate) fn new(total_bytes: Option<u64>) -> Self {
        Self {
            bytes_downloaded: 0,
            total_bytes,
        }
    }

    pub(crate) fn advance(&mut self, chunk: usize) -> ProgressUpdate {
        self.bytes_downloaded += chunk as u64;
        ProgressUpdate {
            downloaded: self.bytes_downloaded,
            chunk,
            total: self.total_bytes,
        }
    }

    /// True when a total was declared and fewer bytes arrived
    pub fn is_short(&self) -> bool {
        self.total_bytes
            .is_some_and(|total| self.bytes_downloaded < total)
    }
}

/// Options for the HTTP fetcher
///
/// Timeouts are off unless set: a stalled connection blocks until the
/// caller sets one.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Limit for establishing the TCP/TLS connection
    pub connect_timeout: Option<Duration>,

    /// Limit for the whole request including the body
    pub timeout: Option<Duration>,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Read buffer size for streaming the body to disk
    pub buffer_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            timeout: None,
            user_agent: format!("sat-prep/{}", env!("SAT_PREP_VERSION")),
            buffer_size: 64 * 1024, // 64KB
        }
    }
}
