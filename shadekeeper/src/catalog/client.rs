//! Fetching the catalog documents.

use std::time::Duration;

use crate::manager::{ManagerError, ManagerResult};

use super::manifest::Manifest;
use super::model::Catalog;

/// Default location of the catalog documents.
pub const DEFAULT_CATALOG_BASE_URL: &str =
    "https://raw.githubusercontent.com/crosire/reshade-shaders/list/";

/// Default effect package document name.
pub const DEFAULT_EFFECTS_PATH: &str = "EffectPackages.ini";

/// Default add-on document name.
pub const DEFAULT_ADDONS_PATH: &str = "Addons.ini";

/// Route for catalog and package downloads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mirror {
    /// Fetch from the original host.
    #[default]
    Direct,
    /// Prepend a proxy prefix to every URL.
    Proxy(String),
}

impl Mirror {
    /// Build a mirror from an optional prefix; blank prefixes mean `Direct`.
    pub fn from_prefix(prefix: Option<&str>) -> Self {
        match prefix.map(str::trim) {
            Some(p) if !p.is_empty() => Self::Proxy(p.to_string()),
            _ => Self::Direct,
        }
    }

    /// Rewrite `url` through the mirror. Empty URLs stay empty.
    pub fn apply(&self, url: &str) -> String {
        match self {
            Self::Proxy(prefix) if !url.is_empty() => {
                if prefix.ends_with('/') {
                    format!("{}{}", prefix, url)
                } else {
                    format!("{}/{}", prefix, url)
                }
            }
            _ => url.to_string(),
        }
    }
}

/// Where to fetch the catalog from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub base_url: String,
    pub effects_path: String,
    pub addons_path: String,
    pub mirror: Mirror,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            effects_path: DEFAULT_EFFECTS_PATH.to_string(),
            addons_path: DEFAULT_ADDONS_PATH.to_string(),
            mirror: Mirror::Direct,
        }
    }
}

impl CatalogConfig {
    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the effect package document path.
    pub fn with_effects_path(mut self, path: impl Into<String>) -> Self {
        self.effects_path = path.into();
        self
    }

    /// Set the add-on document path.
    pub fn with_addons_path(mut self, path: impl Into<String>) -> Self {
        self.addons_path = path.into();
        self
    }

    /// Set the mirror.
    pub fn with_mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = mirror;
        self
    }

    /// Full URL of the effect package document, mirror applied.
    pub fn effects_url(&self) -> String {
        self.mirror.apply(&join_url(&self.base_url, &self.effects_path))
    }

    /// Full URL of the add-on document, mirror applied.
    pub fn addons_url(&self) -> String {
        self.mirror.apply(&join_url(&self.base_url, &self.addons_path))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Source of catalog document text.
///
/// Abstracted so catalog fetching can be tested without a network.
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url` as text.
    fn fetch_text(&self, url: &str) -> ManagerResult<String>;
}

/// Fetches documents over HTTP with reqwest.
pub struct HttpDocumentFetcher {
    client: reqwest::blocking::Client,
}

impl HttpDocumentFetcher {
    /// Create a fetcher with the given connect timeout.
    pub fn with_timeout(timeout: Duration) -> ManagerResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("shadekeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ManagerError::HttpError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl DocumentFetcher for HttpDocumentFetcher {
    fn fetch_text(&self, url: &str) -> ManagerResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ManagerError::CatalogFetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ManagerError::CatalogFetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response.text().map_err(|e| ManagerError::CatalogFetchFailed {
            url: url.to_string(),
            reason: format!("Failed to read response: {}", e),
        })
    }
}

/// Fetches and parses both catalog documents.
pub struct CatalogClient<F = HttpDocumentFetcher> {
    fetcher: F,
    config: CatalogConfig,
}

impl CatalogClient<HttpDocumentFetcher> {
    /// Create an HTTP-backed client.
    pub fn new(config: CatalogConfig, timeout: Duration) -> ManagerResult<Self> {
        Ok(Self::with_fetcher(HttpDocumentFetcher::with_timeout(timeout)?, config))
    }
}

impl<F: DocumentFetcher> CatalogClient<F> {
    /// Create a client with a custom fetcher.
    pub fn with_fetcher(fetcher: F, config: CatalogConfig) -> Self {
        Self { fetcher, config }
    }

    /// The client configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Fetch and parse both documents.
    pub fn fetch(&self) -> ManagerResult<Catalog> {
        let effects = self.fetch_manifest(&self.config.effects_url())?;
        let addons = self.fetch_manifest(&self.config.addons_url())?;
        let catalog = Catalog::from_manifests(&effects, &addons);
        tracing::info!(
            packages = catalog.packages.len(),
            addons = catalog.addons.len(),
            "Fetched catalog"
        );
        Ok(catalog)
    }

    fn fetch_manifest(&self, url: &str) -> ManagerResult<Manifest> {
        tracing::debug!(url = %url, "Fetching catalog document");
        let text = self.fetcher.fetch_text(url)?;
        Manifest::parse(&text).map_err(|e| ManagerError::CatalogParseFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
