//! # hashsync - Content-Digest File Sync Client
//!
//! hashsync keeps a remote store in line with one or more local directory
//! trees. Files are identified by a content digest, so a file that moved is
//! sent as a cheap rename instead of a fresh upload.
//!
//! A run has two phases:
//! 1. **Initial pass**: the local trees are indexed and diffed against the
//!    remote index; the resulting creates, modifies, renames and (optionally)
//!    deletes are dispatched and awaited.
//! 2. **Live mirroring**: filesystem notifications are correlated into
//!    operations and dispatched as they arrive.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hashsync::{Config, NotificationSource, RemoteClient, SyncClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config { roots: vec!["/srv/docs".into()], ..Default::default() };
//!     let remote = Arc::new(RemoteClient::new(&config.server)?);
//!     let mut client = SyncClient::new(config.clone(), remote)?;
//!
//!     let source = NotificationSource::start(
//!         &config.watched_roots(),
//!         client.filter().clone(),
//!         config.debounce(),
//!     )?;
//!     client.run(source, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod correlate;
pub mod digest;
pub mod dispatch;
pub mod error;
pub mod exclusion;
pub mod index;
pub mod logging;
pub mod operation;
pub mod paths;
pub mod reconcile;
pub mod remote;
pub mod strategies;
pub mod watcher;

// Re-export commonly used types and functions
pub use client::{SyncClient, SyncSummary};
pub use config::{Config, ServerConfig};
pub use correlate::{Correlator, NotificationKind, RawNotification};
pub use digest::Digest;
pub use dispatch::{DispatchPool, Dispatcher, RemoteStore};
pub use error::{SyncError, TransportError};
pub use index::{Index, IndexBuilder};
pub use operation::SyncOperation;
pub use paths::WatchedRoots;
pub use reconcile::{reconcile, Reconciliation};
pub use remote::RemoteClient;
pub use strategies::{DigestAlgorithm, SyncMode};
pub use watcher::NotificationSource;

// vim: ts=4
