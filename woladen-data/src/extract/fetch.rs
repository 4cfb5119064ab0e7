//! Downloading an extract when it is missing locally.

use std::io::{self, Write};
use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8Path;
use futures_util::StreamExt;
use log::info;
use reqwest::Client;
use tempfile::NamedTempFile;

use super::ExtractError;
use crate::http::{
    DEFAULT_USER_AGENT, TransportError, block_on, convert_reqwest_error, current_thread_runtime,
};
use crate::overpass::TransportBuildError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams a remote file into a writer.
#[async_trait(?Send)]
pub trait ExtractDownloader {
    /// Stream the file at `url` into `sink`, returning the bytes written.
    async fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError>;
}

/// `reqwest`-backed [`ExtractDownloader`].
///
/// Only the connection is time-limited; country extracts take minutes.
#[derive(Debug, Clone)]
pub struct HttpExtractDownloader {
    client: Client,
}

impl HttpExtractDownloader {
    /// Downloader sending [`DEFAULT_USER_AGENT`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportBuildError::HttpClient`] if the client fails to build.
    pub fn new() -> Result<Self, TransportBuildError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Downloader sending `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportBuildError::HttpClient`] if the client fails to build.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportBuildError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(TransportBuildError::HttpClient)?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl ExtractDownloader for HttpExtractDownloader {
    async fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| convert_reqwest_error(err, url, CONNECT_TIMEOUT))?;
        let mut stream = response.bytes_stream();
        let mut written = 0_u64;
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|err| convert_reqwest_error(err, url, CONNECT_TIMEOUT))?;
            sink.write_all(&bytes)
                .map_err(|source| TransportError::Network {
                    url: url.to_owned(),
                    source,
                })?;
            written += bytes.len() as u64;
        }
        Ok(written)
    }
}

/// Download `url` to `path`.
///
/// The body is staged in a temporary file next to `path` and renamed into
/// place only after the whole body has been written, so an interrupted
/// download never leaves a truncated extract behind.
///
/// # Errors
///
/// Returns [`ExtractError::Download`] when the transfer fails and
/// [`ExtractError::Write`] when the file cannot be staged or persisted.
pub async fn fetch_extract<D: ExtractDownloader + ?Sized>(
    downloader: &D,
    url: &str,
    path: &Utf8Path,
) -> Result<u64, ExtractError> {
    let write_error = |source: io::Error| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    };
    woladen_fs::ensure_parent_dir(path).map_err(write_error)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent).map_err(write_error)?;
    info!("downloading OSM extract from {url} to {path}");
    let bytes = downloader
        .download(url, &mut staged)
        .await
        .map_err(|source| ExtractError::Download {
            url: url.to_owned(),
            source,
        })?;
    staged.as_file().sync_all().map_err(write_error)?;
    staged
        .persist(path.as_std_path())
        .map_err(|err| write_error(err.error))?;
    info!("downloaded {bytes} bytes to {path}");
    Ok(bytes)
}

/// Blocking wrapper around [`fetch_extract`].
///
/// # Errors
///
/// As [`fetch_extract`], plus [`ExtractError::Runtime`] when no runtime can
/// be started.
pub fn fetch_extract_blocking<D: ExtractDownloader + ?Sized>(
    downloader: &D,
    url: &str,
    path: &Utf8Path,
) -> Result<u64, ExtractError> {
    let runtime = current_thread_runtime().map_err(ExtractError::Runtime)?;
    block_on(&runtime, fetch_extract(downloader, url, path))
}
