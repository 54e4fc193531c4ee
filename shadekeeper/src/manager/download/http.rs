//! HTTP-based file downloader with resume support.
//!
//! A partial file left at the destination by an earlier attempt is resumed
//! with a `Range` request. When the server answers `206 Partial Content` the
//! body is appended; any other success answer restarts the file from zero.
//!
//! Requests run on a private current-thread runtime so every await can race
//! the cancellation token. Cancelling drops the in-flight request, even when
//! the server has stopped sending.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::{PackageDownloader, ProgressCallback};

/// Default connect timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Write buffer size (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

const USER_AGENT: &str = concat!("shadekeeper/", env!("CARGO_PKG_VERSION"));

/// HTTP-based resumable downloader.
///
/// The timeout only bounds connection setup. Transfers themselves are not
/// time-limited; a stalled transfer is recovered by cancelling and retrying,
/// which resumes from the partial file.
#[derive(Debug)]
pub struct HttpDownloader {
    client: Client,
    runtime: Runtime,
    pub(crate) timeout: Duration,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// How the destination file is opened for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Append to the existing partial file starting at the given offset.
    Append(u64),
    /// Truncate and write from the first byte.
    Fresh,
}

impl HttpDownloader {
    /// Create a new HTTP downloader with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new HTTP downloader with custom connect timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        // The client's connection pool is bound to the runtime it first runs
        // on, so one runtime serves every download of this instance.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create download runtime");

        Self {
            client,
            runtime,
            timeout,
        }
    }

    /// Download a file with resumption support.
    fn download_with_resume(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> ManagerResult<u64> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }
        self.runtime
            .block_on(self.transfer(url, dest, cancel, progress))
    }

    async fn transfer(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> ManagerResult<u64> {
        let existing_size = file_len(dest);

        let response = self.send(url, existing_size, cancel).await?;
        let status = response.status();

        // A range starting at the end of the resource means the partial file
        // is already complete.
        if status == StatusCode::RANGE_NOT_SATISFIABLE && existing_size > 0 {
            let total = header_u64(&response, CONTENT_RANGE, parse_unsatisfied_range);
            if total == Some(existing_size) {
                tracing::debug!(url = %url, bytes = existing_size, "Download already complete");
                if let Some(ref cb) = progress {
                    cb(existing_size, existing_size);
                }
                return Ok(existing_size);
            }

            tracing::debug!(url = %url, "Partial file does not match resource, restarting");
            drop(response);
            remove_partial(dest)?;
            let response = self.send(url, 0, cancel).await?;
            return self.finish_transfer(url, dest, response, cancel, progress).await;
        }

        if status == StatusCode::PARTIAL_CONTENT
            && !matches!(header_range(&response), Some((start, _)) if start == existing_size)
        {
            tracing::debug!(url = %url, "Server returned a mismatched range, restarting");
            drop(response);
            remove_partial(dest)?;
            let response = self.send(url, 0, cancel).await?;
            return self.finish_transfer(url, dest, response, cancel, progress).await;
        }

        self.finish_transfer(url, dest, response, cancel, progress).await
    }

    /// Issue the GET request, with a `Range` header when resuming.
    async fn send(
        &self,
        url: &str,
        offset: u64,
        cancel: &CancellationToken,
    ) -> ManagerResult<Response> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ManagerError::Cancelled),
            result = request.send() => result,
        };

        result.map_err(|e| {
            if e.is_timeout() {
                ManagerError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                ManagerError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }

    /// Decide the write mode from the response and stream the body.
    async fn finish_transfer(
        &self,
        url: &str,
        dest: &Path,
        response: Response,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> ManagerResult<u64> {
        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        let existing_size = file_len(dest);

        let (mode, total_size) = if status == StatusCode::PARTIAL_CONTENT {
            match header_range(&response) {
                Some((start, total)) if start == existing_size => (WriteMode::Append(start), total),
                _ => {
                    return Err(ManagerError::DownloadFailed {
                        url: url.to_string(),
                        reason: "server returned a range that does not match the partial file"
                            .to_string(),
                    });
                }
            }
        } else {
            if existing_size > 0 {
                tracing::info!(
                    url = %url,
                    discarded = existing_size,
                    "Server ignored range request, restarting download"
                );
            }
            let total = header_u64(&response, CONTENT_LENGTH, |v| v.parse().ok()).unwrap_or(0);
            (WriteMode::Fresh, total)
        };

        let file = prepare_destination(dest, mode)?;
        let start_byte = match mode {
            WriteMode::Append(offset) => offset,
            WriteMode::Fresh => 0,
        };

        tracing::debug!(
            url = %url,
            resume_from = start_byte,
            total = total_size,
            "Streaming download"
        );

        stream_body(url, response, file, dest, start_byte, total_size, cancel, progress).await
    }
}

/// Stream the response body to the destination file chunk by chunk.
///
/// Each chunk read races the cancellation token; on cancel the response is
/// dropped, which closes the connection, and the bytes written so far stay
/// on disk for a later resume.
#[allow(clippy::too_many_arguments)]
async fn stream_body(
    url: &str,
    mut response: Response,
    file: File,
    dest: &Path,
    start_byte: u64,
    total_size: u64,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> ManagerResult<u64> {
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
    let mut downloaded = start_byte;
    let mut total = total_size;

    if let Some(ref cb) = progress {
        cb(downloaded, total);
    }

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                writer.flush().ok();
                tracing::debug!(url = %url, bytes = downloaded, "Download cancelled");
                return Err(ManagerError::Cancelled);
            }
            chunk = response.chunk() => chunk.map_err(|e| ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: format!("Read error: {}", e),
            })?,
        };

        let Some(chunk) = chunk else {
            break;
        };

        writer
            .write_all(&chunk)
            .map_err(|e| ManagerError::write(dest, e))?;

        downloaded += chunk.len() as u64;
        if total > 0 && downloaded > total {
            total = downloaded;
        }

        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    writer.flush().map_err(|e| ManagerError::write(dest, e))?;

    if total > 0 && downloaded < total {
        return Err(ManagerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("connection closed after {} of {} bytes", downloaded, total),
        });
    }

    Ok(downloaded)
}

impl PackageDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64> {
        self.download_with_resume(url, dest, cancel, None)
    }

    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> ManagerResult<u64> {
        self.download_with_resume(url, dest, cancel, Some(on_progress))
    }
}

fn file_len(path: &Path) -> u64 {
    if path.is_file() {
        path.metadata().map(|m| m.len()).unwrap_or(0)
    } else {
        0
    }
}

/// Open the destination for appending or truncating.
fn prepare_destination(dest: &Path, mode: WriteMode) -> ManagerResult<File> {
    match mode {
        WriteMode::Append(_) => OpenOptions::new()
            .append(true)
            .open(dest)
            .map_err(|e| ManagerError::write(dest, e)),
        WriteMode::Fresh => {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| ManagerError::create_dir(parent, e))?;
            }
            File::create(dest).map_err(|e| ManagerError::write(dest, e))
        }
    }
}

fn remove_partial(dest: &Path) -> ManagerResult<()> {
    match fs::remove_file(dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManagerError::remove(dest, e)),
    }
}

fn header_u64(
    response: &Response,
    name: reqwest::header::HeaderName,
    parse: impl Fn(&str) -> Option<u64>,
) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(parse)
}

fn header_range(response: &Response) -> Option<(u64, u64)> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range)
}

/// Parse `bytes <start>-<end>/<total>` into `(start, total)`.
///
/// An unknown total (`*`) is derived from the end of the range.
pub(crate) fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = end.trim().parse().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => end + 1,
        raw => raw.parse().ok()?,
    };
    Some((start, total))
}

/// Parse the `bytes */<total>` form sent with `416 Range Not Satisfiable`.
fn parse_unsatisfied_range(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    rest.strip_prefix("*/")?.trim().parse().ok()
}
