//! HTTP download support for framework and package archives.
//!
//! This module provides:
//! - Single file downloads with byte-range resume support (`http`)
//! - SHA-256 digests of downloaded archives (`checksum`)
//! - Once-per-interval throughput sampling (`progress`)
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//! use shadekeeper::manager::download::HttpDownloader;
//! use shadekeeper::manager::PackageDownloader;
//!
//! let downloader = HttpDownloader::new();
//! let cancel = CancellationToken::new();
//!
//! downloader.download_with_progress(
//!     "https://example.com/ReShade.zip",
//!     Path::new("/tmp/ReShade.zip"),
//!     &cancel,
//!     Box::new(|downloaded, total| println!("{downloaded}/{total}")),
//! )?;
//! ```

mod checksum;
mod http;
mod progress;

pub use checksum::calculate_file_checksum;
pub use http::HttpDownloader;
pub use progress::ThroughputMeter;
