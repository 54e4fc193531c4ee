//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shadekeeper::manager::{ManagerError, ManagerResult, PackageDownloader, ProgressCallback};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

// ============================================================================
// Fixtures
// ============================================================================

/// Write a ZIP archive with the given `(name, content)` entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Every file below `root`, as forward-slash relative path to content.
pub fn tree(root: &Path) -> BTreeMap<String, String> {
    if !root.exists() {
        return BTreeMap::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (relative, fs::read_to_string(e.path()).unwrap_or_default())
        })
        .collect()
}

/// Downloader serving fixture files by URL.
///
/// Mirrors the crate's own test double, which is only compiled for unit
/// tests and so is not reachable from here.
#[derive(Debug, Default)]
pub struct FixtureDownloader {
    fixtures: HashMap<String, PathBuf>,
}

impl FixtureDownloader {
    pub fn with(mut self, url: &str, path: &Path) -> Self {
        self.fixtures.insert(url.to_string(), path.to_path_buf());
        self
    }
}

impl PackageDownloader for FixtureDownloader {
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64> {
        self.download_with_progress(url, dest, cancel, Box::new(|_, _| {}))
    }

    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> ManagerResult<u64> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }
        let source = self
            .fixtures
            .get(url)
            .ok_or_else(|| ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let size = fs::copy(source, dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
        on_progress(size, size);
        Ok(size)
    }
}

// ============================================================================
// HTTP server
// ============================================================================

/// How the test server treats `Range` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSupport {
    Honor,
    Ignore,
}

/// Minimal HTTP/1.1 server serving one body on every path.
pub struct TestServer {
    pub url: String,
    requests: Arc<AtomicUsize>,
}

impl TestServer {
    /// Bind to an ephemeral port and serve `body` until the process exits.
    pub fn start(body: Vec<u8>, ranges: RangeSupport) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/framework.zip", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let body = Arc::new(body);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let body = Arc::clone(&body);
                thread::spawn(move || serve(stream, &body, ranges));
            }
        });

        Self { url, requests }
    }

    /// Bind to an ephemeral port and answer every request with a header
    /// declaring `declared_len` bytes, then `prefix`, then silence for
    /// `stall` before closing.
    pub fn start_stalling(declared_len: usize, prefix: Vec<u8>, stall: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/framework.zip", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let prefix = Arc::new(prefix);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let prefix = Arc::clone(&prefix);
                thread::spawn(move || {
                    if read_head(&mut stream).is_none() {
                        return;
                    }
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        declared_len
                    );
                    let _ = stream.write_all(head.as_bytes());
                    let _ = stream.write_all(&prefix);
                    let _ = stream.flush();
                    thread::sleep(stall);
                });
            }
        });

        Self { url, requests }
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Read the request head, lowercased.
fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => head.push(byte[0]),
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&head).to_ascii_lowercase())
}

fn serve(mut stream: TcpStream, body: &[u8], ranges: RangeSupport) {
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let range_start = head
        .lines()
        .find_map(|l| l.strip_prefix("range:"))
        .and_then(|v| v.trim().strip_prefix("bytes="))
        .and_then(|v| v.trim_end_matches('-').parse::<usize>().ok());

    let len = body.len();
    let (status, headers, payload): (&str, String, &[u8]) = match (ranges, range_start) {
        (RangeSupport::Honor, Some(start)) if start >= len => (
            "416 Range Not Satisfiable",
            format!("Content-Range: bytes */{}\r\nContent-Length: 0\r\n", len),
            &[],
        ),
        (RangeSupport::Honor, Some(start)) => (
            "206 Partial Content",
            format!(
                "Content-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n",
                start,
                len - 1,
                len,
                len - start
            ),
            &body[start..],
        ),
        _ => ("200 OK", format!("Content-Length: {}\r\n", len), body),
    };

    let response = format!(
        "HTTP/1.1 {}\r\n{}Connection: close\r\n\r\n",
        status, headers
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(payload);
    let _ = stream.flush();
}
