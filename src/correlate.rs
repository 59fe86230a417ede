//! Live correlation of filesystem notifications into sync operations
//!
//! A notification batch is one delivery from the watcher. The watcher reports
//! a rename as an independent `Removed` + `Added` pair, in either order, inside
//! the same batch. Classification therefore looks at batch shape:
//!
//! | batch                               | result                          |
//! |-------------------------------------|---------------------------------|
//! | `[Added(x)]` / `[Modified(x)]`      | upsert `x`                      |
//! | `[Removed(x)]`                      | delete `x`                      |
//! | one `Removed(a)` + one other `(b)`  | rename `a -> b`                 |
//! | two, not a rename pair              | each classified on its own      |
//! | empty, or three or more             | dropped as malformed            |
//!
//! The rename pairing is trusted as-is: digests of the two sides are not
//! compared, so an unrelated delete and create that land in one batch are
//! reported as a rename.

use std::path::PathBuf;

use crate::digest::digest_file;
use crate::error::SyncError;
use crate::logging::*;
use crate::operation::SyncOperation;
use crate::paths::WatchedRoots;
use crate::strategies::DigestAlgorithm;

/// What the watcher says happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
	Added,
	Modified,
	Removed,
}

/// A single raw filesystem notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
	pub kind: NotificationKind,
	pub path: PathBuf,
}

impl RawNotification {
	pub fn added(path: impl Into<PathBuf>) -> Self {
		Self { kind: NotificationKind::Added, path: path.into() }
	}

	pub fn modified(path: impl Into<PathBuf>) -> Self {
		Self { kind: NotificationKind::Modified, path: path.into() }
	}

	pub fn removed(path: impl Into<PathBuf>) -> Self {
		Self { kind: NotificationKind::Removed, path: path.into() }
	}
}

/// Classification of a batch before paths and digests are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
	/// Created or modified; the remote handles both the same way
	Upsert(PathBuf),
	Delete(PathBuf),
	Rename { old: PathBuf, new: PathBuf },
}

/// Turns notification batches into [`SyncOperation`]s
#[derive(Debug, Clone)]
pub struct Correlator {
	roots: WatchedRoots,
	algorithm: DigestAlgorithm,
}

impl Correlator {
	pub fn new(roots: WatchedRoots, algorithm: DigestAlgorithm) -> Self {
		Self { roots, algorithm }
	}

	/// Classify a batch by its shape. Pure; touches neither disk nor roots.
	pub fn pair(batch: &[RawNotification]) -> Result<Vec<Correlation>, SyncError> {
		match batch {
			[single] => Ok(vec![Self::single(single)]),
			[first, second] => {
				let removed_first = first.kind == NotificationKind::Removed;
				let removed_second = second.kind == NotificationKind::Removed;
				match (removed_first, removed_second) {
					(true, false) => Ok(vec![Correlation::Rename {
						old: first.path.clone(),
						new: second.path.clone(),
					}]),
					(false, true) => Ok(vec![Correlation::Rename {
						old: second.path.clone(),
						new: first.path.clone(),
					}]),
					_ => Ok(vec![Self::single(first), Self::single(second)]),
				}
			}
			_ => Err(SyncError::MalformedBatch { size: batch.len() }),
		}
	}

	fn single(notification: &RawNotification) -> Correlation {
		match notification.kind {
			NotificationKind::Added | NotificationKind::Modified => {
				Correlation::Upsert(notification.path.clone())
			}
			NotificationKind::Removed => Correlation::Delete(notification.path.clone()),
		}
	}

	/// Classify a batch and resolve it into operations.
	///
	/// Errors never escape: a malformed batch yields nothing, and an operation
	/// whose path is unresolved or whose file is unreadable is dropped. Each
	/// case is logged.
	pub async fn correlate(&self, batch: &[RawNotification]) -> Vec<SyncOperation> {
		let correlations = match Self::pair(batch) {
			Ok(c) => c,
			Err(e) => {
				error!("{}, dropping: {:?}", e, batch);
				return Vec::new();
			}
		};

		let mut operations = Vec::with_capacity(correlations.len());
		for correlation in correlations {
			match self.resolve(correlation).await {
				Ok(op) => {
					debug!("Live change: {}", op);
					operations.push(op);
				}
				Err(e) => warn!("Dropping live change: {}", e),
			}
		}
		operations
	}

	async fn resolve(&self, correlation: Correlation) -> Result<SyncOperation, SyncError> {
		match correlation {
			Correlation::Upsert(path) => {
				let rel_path = self.roots.resolve(&path)?;
				let digest = digest_file(&path, self.algorithm).await;
				if digest.is_empty() {
					return Err(SyncError::UnreadableFile { path });
				}
				// Create and Modify are indistinguishable from one notification
				Ok(SyncOperation::Modify { path, rel_path, digest })
			}
			Correlation::Delete(path) => {
				let rel_path = self.roots.resolve(&path)?;
				Ok(SyncOperation::Delete { path, rel_path })
			}
			Correlation::Rename { old, new } => {
				let old_rel_path = self.roots.resolve(&old)?;
				let new_rel_path = self.roots.resolve(&new)?;
				Ok(SyncOperation::Rename {
					old_path: old,
					old_rel_path,
					new_path: new,
					new_rel_path,
				})
			}
		}
	}
}


// vim: ts=4
