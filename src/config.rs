//! Worker configuration and the application's fixed shell constants.

use serde::{Deserialize, Serialize};
use url::Url;

/// Name of the current cache bucket generation.
///
/// Bump this whenever [`APP_SHELL`] changes so the next activation
/// invalidates every previously cached asset.
pub const CACHE_VERSION: &str = "electricity-bill-pwa-v2";

/// Relative paths of the minimum asset set the app needs to boot offline.
pub const APP_SHELL: &[&str] = &[
    "./",
    "./index.html",
    "./manifest.json",
    "./icon/favicon-16x16.png",
    "./icon/favicon-32x32.png",
    "./icon/favicon-96x96.png",
    "./icon/android-icon-144x144.png",
    "./icon/android-icon-192x192.png",
];

/// Entry document served in place of navigations that fail offline.
pub const SHELL_DOCUMENT: &str = "./index.html";

/// Configuration for a cache worker instance.
///
/// Injected into every [`Worker`](crate::Worker) rather than read from
/// globals, so tests can run several independent worker configurations
/// side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the current cache bucket generation.
    pub version_tag: String,
    /// Absolute URL the shell paths resolve against. Its origin is the
    /// worker's own origin for the write-through policy.
    pub base_url: Url,
    /// Relative paths pre-cached during install.
    pub shell_assets: Vec<String>,
    /// Relative path of the document served when a navigation fails offline.
    pub shell_document: String,
    /// Number of concurrent asset fetches during install.
    pub prefetch_concurrency: usize,
}

impl WorkerConfig {
    /// Creates a configuration with the application defaults for the given
    /// base URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            version_tag: CACHE_VERSION.to_string(),
            base_url,
            shell_assets: APP_SHELL.iter().map(ToString::to_string).collect(),
            shell_document: SHELL_DOCUMENT.to_string(),
            prefetch_concurrency: 4,
        }
    }

    /// Sets the cache bucket version tag.
    #[must_use]
    pub fn with_version_tag(mut self, tag: impl Into<String>) -> Self {
        self.version_tag = tag.into();
        self
    }

    /// Sets the shell asset list.
    #[must_use]
    pub fn with_shell_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the shell document path.
    #[must_use]
    pub fn with_shell_document(mut self, path: impl Into<String>) -> Self {
        self.shell_document = path.into();
        self
    }

    /// Sets the number of concurrent asset fetches during install.
    #[must_use]
    pub const fn with_prefetch_concurrency(mut self, concurrency: usize) -> Self {
        self.prefetch_concurrency = concurrency;
        self
    }

    /// Returns the worker's own origin.
    #[must_use]
    pub fn origin(&self) -> url::Origin {
        self.base_url.origin()
    }
}
