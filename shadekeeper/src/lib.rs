//! Shadekeeper - installer engine for ReShade-style shader frameworks
//!
//! This library installs a shader-injection framework into a game directory
//! and populates it with effect packages and add-ons from the community
//! catalog.
//!
//! # Modules
//!
//! - [`manager`] - framework installs: resumable downloads, archive
//!   extraction, preset reconciliation and version records
//! - [`catalog`] - fetching and parsing the effect package and add-on catalogs
//! - [`package`] - installing a catalog selection into one or both variants
//! - [`bridge`] - streaming session progress to async observers
//! - [`config`] - the persistent INI configuration file
//! - [`logging`] - tracing subscriber setup

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod manager;
pub mod package;
pub mod variant;

pub use variant::FrameworkVariant;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
