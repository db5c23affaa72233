//! shellcache - an offline app-shell caching worker.
//!
//! This library manages one versioned cache bucket for a small web
//! application: it pre-caches the app shell during install, garbage-collects
//! stale cache generations during activate, and decides cache-vs-network
//! for every request intercepted from a controlled page.
//!
//! # Example
//!
//! ```no_run
//! use shellcache::{FetchRequest, Worker, WorkerConfig};
//! use url::Url;
//!
//! # async fn example() -> shellcache::Result<()> {
//! let base = Url::parse("https://bills.example/")?;
//! let mut worker = Worker::new(WorkerConfig::new(base.clone()));
//!
//! // Host lifecycle: await install, then activate.
//! worker.install().await?;
//! worker.activate().await?;
//!
//! // Per-request interception.
//! let request = FetchRequest::navigate(base.join("index.html")?);
//! let outcome = worker.handle_fetch(&request).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod net;
pub mod store;
pub mod worker;

// Re-export main types for convenience
pub use config::{APP_SHELL, CACHE_VERSION, SHELL_DOCUMENT, WorkerConfig};
pub use error::{Error, Result};
pub use fs::DiskStorage;
pub use http::{FetchRequest, FetchResponse, Method, RequestMode};
pub use net::{Network, ReqwestNetwork};
pub use store::{CacheStorage, CachedResponse, MemoryStorage};
pub use worker::{FetchOutcome, LifecycleState, Worker};
