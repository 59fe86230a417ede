//! Sync engine: one initial reconciliation, then live mirroring
//!
//! The initial pass builds the local index and fetches the remote index
//! concurrently, reconciles them and waits for every resulting operation to
//! finish. Only then does the live loop start consuming notification batches.
//! Live batches are handed to the dispatch pool without waiting, so neither a
//! slow remote nor hashing a large file delays the handling of the next batch.

use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::correlate::{Correlator, RawNotification};
use crate::dispatch::{DispatchPool, RemoteStore};
use crate::error::SyncError;
use crate::exclusion::PathFilter;
use crate::index::{Index, IndexBuilder};
use crate::logging::*;
use crate::reconcile::reconcile;

/// Outcome of the initial pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
	pub local_files: usize,
	pub remote_files: usize,
	pub created: usize,
	pub modified: usize,
	pub renamed: usize,
	pub deleted: usize,
	pub untouched: usize,
	/// Remote-only entries left in place
	pub leftover: usize,
	pub succeeded: usize,
	pub failed: usize,
}

impl SyncSummary {
	pub fn operations(&self) -> usize {
		self.created + self.modified + self.renamed + self.deleted
	}
}

pub struct SyncClient {
	config: Config,
	filter: PathFilter,
	store: Arc<dyn RemoteStore>,
	pool: DispatchPool,
	correlator: Arc<Correlator>,
}

impl SyncClient {
	pub fn new<R>(config: Config, store: Arc<R>) -> Result<Self, SyncError>
	where
		R: RemoteStore + 'static,
	{
		config.validate()?;

		let roots = config.watched_roots();
		let filter = PathFilter::new(roots.clone(), &config.exclude_patterns)?;
		let pool = DispatchPool::new(store.clone(), config.max_in_flight);
		let correlator = Arc::new(Correlator::new(roots, config.digest_algorithm));

		Ok(Self { config, filter, store, pool, correlator })
	}

	/// Filter shared with the notification source
	pub fn filter(&self) -> &PathFilter {
		&self.filter
	}

	/// Bring the remote in line with the local trees and wait for it to settle
	pub async fn initial_sync(&mut self) -> Result<SyncSummary, SyncError> {
		info!("Starting initial sync of {} roots", self.config.roots.len());

		let builder = IndexBuilder::from_config(&self.config, self.filter.clone());
		let (local, remote) = tokio::join!(builder.build(), self.fetch_remote());
		let remote = remote?;

		let mut summary = SyncSummary {
			local_files: local.len(),
			remote_files: remote.len(),
			..Default::default()
		};

		let roots = self.config.watched_roots();
		let reconciliation = reconcile(&local, remote, self.config.sync_mode, &roots);
		summary.created = reconciliation.count("create");
		summary.modified = reconciliation.count("modify");
		summary.renamed = reconciliation.count("rename");
		summary.deleted = reconciliation.count("delete");
		summary.untouched = reconciliation.untouched;
		if !self.config.sync_mode.prunes_remote() {
			summary.leftover = reconciliation.remaining.len();
		}

		let stats = self.pool.stats();
		let (ok_before, failed_before) = (stats.succeeded(), stats.failed());

		for op in reconciliation.operations {
			self.pool.submit(op);
		}
		self.pool.drain().await;

		summary.succeeded = stats.succeeded() - ok_before;
		summary.failed = stats.failed() - failed_before;

		info!(
			"Initial sync done: {} created, {} modified, {} renamed, {} deleted, {} untouched, {} remote-only kept",
			summary.created,
			summary.modified,
			summary.renamed,
			summary.deleted,
			summary.untouched,
			summary.leftover
		);
		if summary.failed > 0 {
			warn!("{} of {} operations failed", summary.failed, summary.operations());
		}

		Ok(summary)
	}

	async fn fetch_remote(&self) -> Result<Index, SyncError> {
		match self.store.fetch_index().await {
			Ok(index) => Ok(index),
			Err(e) if e.is_unreachable() => Err(SyncError::RemoteUnreachable { source: e }),
			Err(e) => {
				warn!("Cannot fetch remote index, assuming it is empty: {}", e);
				Ok(Index::new())
			}
		}
	}

	/// Queue one batch for correlation and dispatch. Never waits.
	pub fn handle_batch(&mut self, batch: Vec<RawNotification>) {
		debug!("Queueing batch of {} notifications", batch.len());
		self.pool.submit_batch(Arc::clone(&self.correlator), batch);
	}

	/// Run the initial pass, then mirror live changes.
	///
	/// Returns when `notifications` ends (after queued work drains) or when
	/// `shutdown` resolves (queued work is abandoned).
	pub async fn run<S, F>(
		&mut self,
		notifications: S,
		shutdown: F,
	) -> Result<SyncSummary, SyncError>
	where
		S: Stream<Item = Vec<RawNotification>> + Unpin,
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);

		let initial = tokio::select! {
			result = self.initial_sync() => Some(result),
			_ = &mut shutdown => None,
		};
		let summary = match initial {
			Some(result) => result?,
			None => {
				info!("Shutdown requested during initial sync");
				self.pool.abandon().await;
				return Ok(SyncSummary::default());
			}
		};

		self.watch(notifications, shutdown).await;
		Ok(summary)
	}

	/// Live loop only
	pub async fn watch<S, F>(&mut self, mut notifications: S, shutdown: F)
	where
		S: Stream<Item = Vec<RawNotification>> + Unpin,
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);
		info!("Watching for changes");

		loop {
			let next = tokio::select! {
				_ = &mut shutdown => None,
				batch = notifications.next() => Some(batch),
			};
			match next {
				None => {
					info!("Shutting down");
					self.pool.abandon().await;
					return;
				}
				Some(Some(batch)) => self.handle_batch(batch),
				Some(None) => break,
			}
		}

		debug!("Notification stream closed, waiting for {} operations", self.pool.pending());
		self.pool.drain().await;
	}
}

// vim: ts=4
