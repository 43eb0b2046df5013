//! Multipart torrent upload to the device's download manager.
//!
//! # Design
//! - One POST per run, never retried.
//! - The multipart framing matches what the device firmware accepts: the boundary
//!   delimiter is written before and after the single part, with no `--` terminator.
//! - The response body is classified by the presence of a failure marker, not by status.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use lsdrop_config::DestinationAddress;
use reqwest::header::{CONNECTION, CONTENT_TYPE};
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Port of the device's web interface.
pub(crate) const DEFAULT_PORT: u16 = 8080;

const UPLOAD_PATH: &str = "/api/torrent-add";
const FORM_FIELD: &str = "fileEl";
const TORRENT_CONTENT_TYPE: &str = "application/x-bittorrent";
const FAILURE_MARKER: &str = "Fail";
const BOUNDARY_PREFIX: &str = "----------------------------";

static LAST_BOUNDARY_TICKS: AtomicU64 = AtomicU64::new(0);

/// Failures while producing or sending the upload request.
#[derive(Debug, Error)]
pub(crate) enum UploadError {
    #[error("invalid upload URL {endpoint}")]
    Url {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("failed to read torrent file {}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("request failed")]
    Send { source: reqwest::Error },
    #[error("failed to read response body")]
    Response { source: reqwest::Error },
}

/// Classified device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UploadOutcome {
    Accepted,
    Rejected { response: String },
}

/// The torrent file named on the command line, validated to exist.
#[derive(Debug, Clone)]
pub(crate) struct TargetFile {
    path: PathBuf,
    file_name: String,
    len: u64,
}

impl TargetFile {
    /// Inspect `path`; `None` when it does not name an existing regular file.
    pub(crate) fn inspect(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok().filter(std::fs::Metadata::is_file)?;
        let file_name = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        Some(Self {
            path: path.to_path_buf(),
            file_name,
            len: metadata.len(),
        })
    }

    pub(crate) fn file_name(&self) -> &str {
        &self.file_name
    }

    pub(crate) const fn len(&self) -> u64 {
        self.len
    }

    async fn read(&self) -> Result<Vec<u8>, UploadError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| UploadError::Read {
                path: self.path.clone(),
                source,
            })
    }
}

/// Device address and port receiving the upload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UploadTarget {
    address: DestinationAddress,
    port: u16,
}

impl UploadTarget {
    pub(crate) const fn new(address: DestinationAddress, port: u16) -> Self {
        Self { address, port }
    }

    pub(crate) fn url(&self) -> Result<Url, UploadError> {
        let endpoint = format!(
            "http://{}{UPLOAD_PATH}?start=yes",
            self.address.socket_addr(self.port)
        );
        Url::parse(&endpoint).map_err(|source| UploadError::Url { endpoint, source })
    }
}

/// Multipart boundary token, unique within the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Boundary(String);

impl Boundary {
    /// Derive a boundary from the current time in 100 ns ticks.
    pub(crate) fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_nanos() / 100).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self::from_ticks(next_ticks(now))
    }

    fn from_ticks(ticks: u64) -> Self {
        Self(format!("{BOUNDARY_PREFIX}{ticks:x}"))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.0)
    }
}

// Ticks never repeat within a process, even when the clock does.
fn next_ticks(now: u64) -> u64 {
    let previous = LAST_BOUNDARY_TICKS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    now.max(previous.saturating_add(1))
}

/// Frame `bytes` as the single `fileEl` part of a multipart body.
pub(crate) fn build_body(boundary: &Boundary, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let delimiter = format!("\r\n--{}\r\n", boundary.as_str());
    let header = format!(
        "Content-Disposition: form-data; name=\"{FORM_FIELD}\";filename=\"{file_name}\"\r\n Content-Type: {TORRENT_CONTENT_TYPE}\r\n\r\n"
    );

    let mut body = Vec::with_capacity(delimiter.len() * 2 + header.len() + bytes.len());
    body.extend_from_slice(delimiter.as_bytes());
    body.extend_from_slice(header.as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(delimiter.as_bytes());
    body
}

/// Classify the device's textual response.
pub(crate) fn classify_response(body: &str) -> UploadOutcome {
    if body.contains(FAILURE_MARKER) {
        UploadOutcome::Rejected {
            response: body.to_string(),
        }
    } else {
        UploadOutcome::Accepted
    }
}

/// Sends torrents to the device over a prepared HTTP client.
pub(crate) struct Uploader {
    client: Client,
}

impl Uploader {
    pub(crate) const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Perform exactly one upload of `file` to `target` and classify the response.
    pub(crate) async fn send(
        &self,
        file: &TargetFile,
        target: &UploadTarget,
    ) -> Result<UploadOutcome, UploadError> {
        let url = target.url()?;
        let bytes = file.read().await?;
        let boundary = Boundary::generate();
        let body = build_body(&boundary, file.file_name(), &bytes);
        info!(
            file = file.file_name(),
            %url,
            bytes = bytes.len(),
            "sending torrent"
        );

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, boundary.content_type())
            .header(CONNECTION, "keep-alive")
            .body(body)
            .send()
            .await
            .map_err(|source| UploadError::Send { source })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| UploadError::Response { source })?;
        debug!(%status, response = %text, "response received");
        if !status.is_success() {
            warn!(%status, "device answered with a non-success status");
        }

        Ok(classify_response(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    use crate::client::build_client;

    fn loopback(port: u16) -> UploadTarget {
        UploadTarget::new(
            DestinationAddress::new(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port,
        )
    }

    fn torrent_fixture(dir: &Path, contents: &[u8]) -> TargetFile {
        let path = dir.join("ubuntu.iso.torrent");
        std::fs::write(&path, contents).expect("write torrent");
        TargetFile::inspect(&path).expect("fixture exists")
    }

    #[test]
    fn url_targets_torrent_add_endpoint() {
        let v4 = UploadTarget::new(
            DestinationAddress::new(IpAddr::V4(Ipv4Addr::new(192, 168, 11, 150))),
            DEFAULT_PORT,
        );
        assert_eq!(
            v4.url().expect("valid url").as_str(),
            "http://192.168.11.150:8080/api/torrent-add?start=yes"
        );

        let v6 = UploadTarget::new(
            DestinationAddress::new(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            DEFAULT_PORT,
        );
        assert_eq!(
            v6.url().expect("valid url").as_str(),
            "http://[::1]:8080/api/torrent-add?start=yes"
        );
    }

    #[test]
    fn body_framing_wraps_single_part_in_delimiters() {
        let boundary = Boundary::from_ticks(0xabc);
        let body = build_body(&boundary, "demo.torrent", b"d4:infod4:name4:demoee");
        let expected = concat!(
            "\r\n------------------------------abc\r\n",
            "Content-Disposition: form-data; name=\"fileEl\";filename=\"demo.torrent\"\r\n",
            " Content-Type: application/x-bittorrent\r\n\r\n",
            "d4:infod4:name4:demoee",
            "\r\n------------------------------abc\r\n",
        );
        assert_eq!(body, expected.as_bytes());
    }

    #[test]
    fn body_preserves_binary_content() {
        let boundary = Boundary::generate();
        let payload: Vec<u8> = (0..=255).collect();
        let body = build_body(&boundary, "bin.torrent", &payload);
        assert!(body.windows(payload.len()).any(|window| window == payload.as_slice()));
        assert!(!body.ends_with(format!("--{}--\r\n", boundary.as_str()).as_bytes()));
    }

    #[test]
    fn boundaries_are_unique_and_match_content_type() {
        let first = Boundary::generate();
        let second = Boundary::generate();
        assert_ne!(first, second);
        assert!(first.as_str().starts_with(BOUNDARY_PREFIX));
        assert_eq!(
            first.content_type(),
            format!("multipart/form-data; boundary={}", first.as_str())
        );
    }

    #[test]
    fn next_ticks_is_strictly_increasing_for_a_stalled_clock() {
        let first = next_ticks(42);
        let second = next_ticks(42);
        assert!(second > first);
    }

    #[test]
    fn classify_response_looks_for_failure_marker() {
        assert_eq!(classify_response("Success"), UploadOutcome::Accepted);
        assert_eq!(classify_response(""), UploadOutcome::Accepted);
        assert_eq!(
            classify_response("{\"result\":\"Fail\"}"),
            UploadOutcome::Rejected {
                response: "{\"result\":\"Fail\"}".to_string()
            }
        );
        assert_eq!(classify_response("failed"), UploadOutcome::Accepted);
    }

    #[test]
    fn inspect_rejects_missing_paths_and_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(TargetFile::inspect(&dir.path().join("missing.torrent")).is_none());
        assert!(TargetFile::inspect(dir.path()).is_none());

        let file = torrent_fixture(dir.path(), b"abc");
        assert_eq!(file.file_name(), "ubuntu.iso.torrent");
        assert_eq!(file.len(), 3);
    }

    #[tokio::test]
    async fn send_posts_multipart_and_accepts_success_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/torrent-add")
                .query_param("start", "yes");
            then.status(200).body("{\"result\":\"OK\"}");
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let file = torrent_fixture(dir.path(), b"d8:announce0:e");
        let uploader = Uploader::new(build_client(Duration::from_secs(5)).expect("client"));

        let outcome = uploader
            .send(&file, &loopback(server.port()))
            .await
            .expect("upload succeeds");

        mock.assert();
        assert_eq!(outcome, UploadOutcome::Accepted);
    }

    #[tokio::test]
    async fn send_reports_rejection_from_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/torrent-add");
            then.status(200).body("Fail: duplicate torrent");
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let file = torrent_fixture(dir.path(), b"d8:announce0:e");
        let uploader = Uploader::new(build_client(Duration::from_secs(5)).expect("client"));

        let outcome = uploader
            .send(&file, &loopback(server.port()))
            .await
            .expect("request completes");

        mock.assert();
        assert!(matches!(outcome, UploadOutcome::Rejected { ref response } if response.contains("duplicate")));
    }

    #[tokio::test]
    async fn send_ignores_error_status_when_body_has_no_marker() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/torrent-add");
            then.status(500).body("OK");
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let file = torrent_fixture(dir.path(), b"d8:announce0:e");
        let uploader = Uploader::new(build_client(Duration::from_secs(5)).expect("client"));

        let outcome = uploader
            .send(&file, &loopback(server.port()))
            .await
            .expect("request completes");

        mock.assert();
        assert_eq!(outcome, UploadOutcome::Accepted);
    }

    #[tokio::test]
    async fn send_rejects_marker_even_with_success_status() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/torrent-add");
            then.status(200).body("Fail");
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let file = torrent_fixture(dir.path(), b"d8:announce0:e");
        let uploader = Uploader::new(build_client(Duration::from_secs(5)).expect("client"));

        let outcome = uploader
            .send(&file, &loopback(server.port()))
            .await
            .expect("request completes");

        mock.assert();
        assert_eq!(
            outcome,
            UploadOutcome::Rejected {
                response: "Fail".to_string()
            }
        );
    }

    #[tokio::test]
    async fn send_maps_refused_connection_to_send_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let dir = tempfile::tempdir().expect("tempdir");
        let file = torrent_fixture(dir.path(), b"d8:announce0:e");
        let uploader = Uploader::new(build_client(Duration::from_secs(5)).expect("client"));

        let err = uploader
            .send(&file, &loopback(port))
            .await
            .expect_err("connection refused");
        assert!(matches!(err, UploadError::Send { .. }));
    }
}
