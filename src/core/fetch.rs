//! HTTP fetcher for sat-prep
//!
//! Streams one remote resource to one local path, reporting progress as
//! bytes arrive. A fetch is a single attempt: no retries, no resume.

use std::path::PathBuf;

use log::debug;
use reqwest::{Client, ClientBuilder, Url};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::core::error::{error_chain, Error, Result};
use crate::core::stream::{
    create_http_stream, FetchConfig, ProgressCallback, ProgressState, ProgressUpdate,
};

/// A single fetch attempt: one URL to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination_path: PathBuf,
}

impl DownloadTask {
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
        }
    }
}

/// Parse a URL and require an http or https scheme
pub fn parse_http_url(source_url: &str) -> Result<Url> {
    let url = Url::parse(source_url)
        .map_err(|e| Error::InvalidUrl(format!("{source_url}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidUrl(format!(
            "{source_url}: unsupported scheme '{scheme}' (expected http or https)"
        ))),
    }
}

/// Single-connection HTTP fetcher
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a fetcher with default configuration (no timeouts)
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    /// Create a fetcher with custom configuration
    pub fn with_config(config: FetchConfig) -> Result<Self> {
        if config.buffer_size == 0 {
            return Err(Error::InvalidInput(
                "buffer size must be greater than zero".to_string(),
            ));
        }

        let mut builder = ClientBuilder::new().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Stream `task.source_url` into `task.destination_path`
    ///
    /// The destination is created or truncated once the server has answered
    /// with a success status. The progress callback, when given, is called
    /// once before the first chunk and once after every chunk written, even
    /// when the server declared no length. A partially written file is left
    /// in place on failure; removing it is up to the caller.
    pub async fn fetch(
        &self,
        task: &DownloadTask,
        progress: Option<&ProgressCallback>,
    ) -> Result<ProgressState> {
        let url = parse_http_url(&task.source_url)?;
        let destination = &task.destination_path;

        debug!("GET {url}");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: task.source_url.clone(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        debug!(
            "{} answered {status}, content length {total:?}",
            task.source_url
        );

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| Error::filesystem(destination, e))?;

        let mut state = ProgressState::new(total);
        if let Some(progress) = progress {
            progress(ProgressUpdate {
                downloaded: 0,
                chunk: 0,
                total,
            });
        }

        let mut stream = create_http_stream(response);
        let mut buffer = vec![0u8; self.config.buffer_size];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| {
                    Error::NetworkError(format!("Stream read error: {}", error_chain(&e)))
                })?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read])
                .await
                .map_err(|e| Error::filesystem(destination, e))?;

            let update = state.advance(bytes_read);
            if let Some(progress) = progress {
                progress(update);
            }
        }

        file.flush()
            .await
            .map_err(|e| Error::filesystem(destination, e))?;

        if state.is_short() {
            return Err(Error::NetworkError(format!(
                "transfer interrupted: received {} of {} bytes",
                state.bytes_downloaded,
                state.total_bytes.unwrap_or_default()
            )));
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn recording_callback() -> (ProgressCallback, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let callback: ProgressCallback = Arc::new(move |update| {
            sink.lock().unwrap().push(update);
        });
        (callback, updates)
    }

    #[test]
    fn test_parse_http_url() {
        assert!(parse_http_url("http://host/a.txt").is_ok());
        assert!(parse_http_url("https://host/a.txt?download=true").is_ok());
        assert!(matches!(
            parse_http_url("ftp://host/a.txt"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = FetchConfig {
            buffer_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Fetcher::with_config(config),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_writes_body_and_reports_progress() {
        let mock_server = MockServer::start().await;
        let body = b"p cnf 3 2\n1 -2 0\n2 3 0\n".repeat(10);

        Mock::given(method("GET"))
            .and(path("/train.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let task = DownloadTask::new(
            format!("{}/train.txt", mock_server.uri()),
            dir.path().join("train.txt"),
        );

        // Small buffer so the body arrives in several chunks
        let fetcher = Fetcher::with_config(FetchConfig {
            buffer_size: 16,
            ..Default::default()
        })
        .unwrap();
        let (callback, updates) = recording_callback();

        let state = fetcher.fetch(&task, Some(&callback)).await.unwrap();

        assert_eq!(state.bytes_downloaded, body.len() as u64);
        assert_eq!(state.total_bytes, Some(body.len() as u64));
        assert_eq!(std::fs::read(&task.destination_path).unwrap(), body);

        let updates = updates.lock().unwrap();
        assert!(updates.len() > 2);
        assert_eq!(updates[0].downloaded, 0);
        assert_eq!(updates[0].chunk, 0);
        assert!(updates
            .windows(2)
            .all(|pair| pair[0].downloaded <= pair[1].downloaded));
        let last = updates.last().unwrap();
        assert_eq!(last.downloaded, body.len() as u64);
        assert_eq!(last.total, Some(body.len() as u64));
    }

    #[tokio::test]
    async fn test_fetch_http_error_creates_no_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let task = DownloadTask::new(
            format!("{}/missing.txt", mock_server.uri()),
            dir.path().join("missing.txt"),
        );

        let err = Fetcher::new().unwrap().fetch(&task, None).await.unwrap_err();
        match err {
            Error::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus, got {other:?}"),
        }
        assert!(!task.destination_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_unwritable_destination() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data"))
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        // Parent directory is never created
        let task = DownloadTask::new(
            format!("{}/a.txt", mock_server.uri()),
            dir.path().join("no-such-dir").join("a.txt"),
        );

        let err = Fetcher::new().unwrap().fetch(&task, None).await.unwrap_err();
        assert!(err.is_filesystem(), "Expected filesystem error, got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop a listener to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let dir = tempdir().unwrap();
        let task = DownloadTask::new(
            format!("http://127.0.0.1:{port}/a.txt"),
            dir.path().join("a.txt"),
        );

        let err = Fetcher::new().unwrap().fetch(&task, None).await.unwrap_err();
        assert!(err.is_network(), "Expected network error, got {err:?}");
        assert!(
            err.to_string().to_lowercase().contains("refused"),
            "Expected the connect cause in {err}"
        );
        assert!(!task.destination_path.exists());
    }
}
