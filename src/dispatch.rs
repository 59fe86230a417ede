//! Dispatching classified operations to the remote store
//!
//! [`Dispatcher`] is the seam to the transport: one call per remote verb.
//! [`RemoteStore`] adds the index fetch needed for the initial pass.
//! [`DispatchPool`] fans operations out as independent tasks. Submitting
//! never waits on the network, so the notification consumer is never held
//! up; a semaphore caps how many calls are actually in flight. Live batches
//! are correlated inside the pool task too, so hashing a large file delays
//! only its own upload.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::correlate::{Correlator, RawNotification};
use crate::digest::Digest;
use crate::error::TransportError;
use crate::index::Index;
use crate::logging::*;
use crate::operation::{RemoteCall, SyncOperation};

/// Outbound calls understood by the remote store.
///
/// Each call stands alone: failures are reported through the result and
/// only affect that single operation.
#[async_trait]
pub trait Dispatcher: Send + Sync {
	async fn upsert(
		&self,
		path: &Path,
		rel_path: &Path,
		digest: &Digest,
	) -> Result<(), TransportError>;

	async fn rename(
		&self,
		old_path: &Path,
		old_rel_path: &Path,
		new_path: &Path,
		new_rel_path: &Path,
	) -> Result<(), TransportError>;

	async fn delete(&self, path: &Path, rel_path: &Path) -> Result<(), TransportError>;
}

/// A dispatcher that can also report what it currently holds
#[async_trait]
pub trait RemoteStore: Dispatcher {
	/// Fetch the remote index. Only [`TransportError::Unreachable`] is fatal
	/// to callers; implementations may degrade other failures to an empty index.
	async fn fetch_index(&self) -> Result<Index, TransportError>;
}

/// Route one operation to the matching dispatcher call
pub async fn dispatch(
	dispatcher: &dyn Dispatcher,
	op: &SyncOperation,
) -> Result<(), TransportError> {
	match op.remote_call() {
		RemoteCall::Upsert { path, rel_path, digest } => {
			dispatcher.upsert(path, rel_path, digest).await
		}
		RemoteCall::Rename { old_path, old_rel_path, new_path, new_rel_path } => {
			dispatcher.rename(old_path, old_rel_path, new_path, new_rel_path).await
		}
		RemoteCall::Delete { path, rel_path } => dispatcher.delete(path, rel_path).await,
	}
}

/// Running totals of dispatched operations
#[derive(Debug, Default)]
pub struct DispatchStats {
	succeeded: AtomicUsize,
	failed: AtomicUsize,
}

impl DispatchStats {
	pub fn succeeded(&self) -> usize {
		self.succeeded.load(Ordering::Relaxed)
	}

	pub fn failed(&self) -> usize {
		self.failed.load(Ordering::Relaxed)
	}
}

async fn run(dispatcher: &dyn Dispatcher, stats: &DispatchStats, op: &SyncOperation) {
	match dispatch(dispatcher, op).await {
		Ok(()) => {
			stats.succeeded.fetch_add(1, Ordering::Relaxed);
			debug!("Dispatched {}", op);
		}
		Err(e) => {
			stats.failed.fetch_add(1, Ordering::Relaxed);
			error!("Failed to dispatch {}: {}", op, e);
		}
	}
}

/// Fire-and-forget fan-out with a cap on in-flight calls
pub struct DispatchPool {
	dispatcher: Arc<dyn Dispatcher>,
	permits: Arc<Semaphore>,
	tasks: JoinSet<()>,
	stats: Arc<DispatchStats>,
}

impl DispatchPool {
	pub fn new(dispatcher: Arc<dyn Dispatcher>, max_in_flight: usize) -> Self {
		Self {
			dispatcher,
			permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
			tasks: JoinSet::new(),
			stats: Arc::new(DispatchStats::default()),
		}
	}

	/// Schedule `op` and return immediately. Must be called inside a tokio runtime.
	pub fn submit(&mut self, op: SyncOperation) {
		self.reap();

		let dispatcher = Arc::clone(&self.dispatcher);
		let permits = Arc::clone(&self.permits);
		let stats = Arc::clone(&self.stats);

		self.tasks.spawn(async move {
			// Closed only on shutdown, in which case the task is being aborted anyway
			let _permit = match permits.acquire_owned().await {
				Ok(p) => p,
				Err(_) => return,
			};
			run(dispatcher.as_ref(), &stats, &op).await;
		});
	}

	/// Schedule correlation of a live batch and dispatch of what it yields.
	/// Returns immediately; digests are computed in the spawned task.
	pub fn submit_batch(&mut self, correlator: Arc<Correlator>, batch: Vec<RawNotification>) {
		self.reap();

		let dispatcher = Arc::clone(&self.dispatcher);
		let permits = Arc::clone(&self.permits);
		let stats = Arc::clone(&self.stats);

		self.tasks.spawn(async move {
			let _permit = match permits.acquire_owned().await {
				Ok(p) => p,
				Err(_) => return,
			};
			for op in correlator.correlate(&batch).await {
				info!("Live: {}", op);
				run(dispatcher.as_ref(), &stats, &op).await;
			}
		});
	}

	/// Drop handles of tasks that already finished
	fn reap(&mut self) {
		while let Some(result) = self.tasks.try_join_next() {
			if let Err(e) = result {
				if e.is_panic() {
					error!("Dispatch task panicked: {}", e);
				}
			}
		}
	}

	/// Wait until every submitted operation has finished
	pub async fn drain(&mut self) {
		while let Some(result) = self.tasks.join_next().await {
			if let Err(e) = result {
				if e.is_panic() {
					error!("Dispatch task panicked: {}", e);
				}
			}
		}
	}

	/// Abort everything still queued or in flight
	pub async fn abandon(&mut self) {
		let pending = self.tasks.len();
		if pending > 0 {
			info!("Abandoning {} in-flight operations", pending);
		}
		self.permits.close();
		self.tasks.shutdown().await;
	}

	/// Operations submitted and not yet reaped
	pub fn pending(&self) -> usize {
		self.tasks.len()
	}

	pub fn stats(&self) -> Arc<DispatchStats> {
		Arc::clone(&self.stats)
	}
}


// vim: ts=4
