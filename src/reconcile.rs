//! Initial reconciliation of the local index against the remote index
//!
//! Every local file yields at most one operation:
//! - same path, same digest: untouched, nothing to send
//! - same path, different digest: `Modify`
//! - different path, digest known remotely: `Rename` from that remote path
//! - otherwise: `Create` (this includes files renamed *and* edited while
//!   offline, which cannot be told apart from new files)
//!
//! Matched remote entries are drained; what is left afterwards exists only on
//! the remote and is deleted in [`SyncMode::PruneRemote`].

use std::path::PathBuf;

use crate::digest::Digest;
use crate::index::Index;
use crate::logging::*;
use crate::operation::SyncOperation;
use crate::paths::WatchedRoots;
use crate::strategies::SyncMode;

/// Result of one reconciliation pass
#[derive(Debug, Default)]
pub struct Reconciliation {
	/// Operations to dispatch: modifies, then renames and creates, then deletes
	pub operations: Vec<SyncOperation>,

	/// Remote entries no local file accounted for
	pub remaining: Index,

	/// Local files already identical on the remote
	pub untouched: usize,
}

impl Reconciliation {
	pub fn count(&self, kind: &str) -> usize {
		self.operations.iter().filter(|op| op.kind() == kind).count()
	}
}

/// Diff `local` against `remote`.
///
/// Exact-path matches are settled before any rename matching so that a
/// remote file still present locally under its own path is never consumed
/// as a rename source; this keeps the result independent of iteration order.
pub fn reconcile(
	local: &Index,
	mut remote: Index,
	mode: SyncMode,
	roots: &WatchedRoots,
) -> Reconciliation {
	let mut operations = Vec::with_capacity(local.len());
	let mut untouched = 0usize;
	let mut unmatched: Vec<(PathBuf, PathBuf, &Digest)> = Vec::new();

	// Pass 1: same path on both sides
	for (path, digest) in local.iter() {
		let rel_path = match roots.relative_to(path) {
			Some(rel) => rel,
			None => {
				// Local entries come from walking the roots, so this is a caller bug
				error!("Local file {} is outside all watched roots, skipping", path.display());
				continue;
			}
		};

		match remote.get(path).cloned() {
			Some(remote_digest) if &remote_digest == digest => {
				remote.remove(path);
				untouched += 1;
			}
			Some(_) => {
				remote.remove(path);
				operations.push(SyncOperation::Modify {
					path: path.to_path_buf(),
					rel_path,
					digest: digest.clone(),
				});
			}
			None => unmatched.push((path.to_path_buf(), rel_path, digest)),
		}
	}

	// Pass 2: content match under another path, else a fresh upload
	for (path, rel_path, digest) in unmatched {
		let source = remote
			.find_by_digest(digest)
			.map(|old| (old.to_path_buf(), roots.relative_to(old)));

		let op = match source {
			Some((old_path, Some(old_rel_path))) => {
				remote.remove(&old_path);
				SyncOperation::Rename { old_path, old_rel_path, new_path: path, new_rel_path: rel_path }
			}
			Some((old_path, None)) => {
				warn!(
					"Rename source {} is outside all watched roots, uploading {} as new",
					old_path.display(),
					path.display()
				);
				SyncOperation::Create { path, rel_path, digest: digest.clone() }
			}
			None => SyncOperation::Create { path, rel_path, digest: digest.clone() },
		};
		operations.push(op);
	}

	if mode.prunes_remote() {
		for (path, _) in remote.iter() {
			match roots.relative_to(path) {
				Some(rel_path) => {
					operations.push(SyncOperation::Delete { path: path.to_path_buf(), rel_path })
				}
				None => warn!(
					"Remote-only file {} is outside all watched roots, not deleting",
					path.display()
				),
			}
		}
	}

	debug!(
		"Reconciled {} local files: {} operations, {} untouched, {} remote-only",
		local.len(),
		operations.len(),
		untouched,
		remote.len()
	);

	Reconciliation { operations, remaining: remote, untouched }
}


// vim: ts=4
