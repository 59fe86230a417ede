//! Classified, dispatch-ready units of change

use std::fmt;
use std::path::{Path, PathBuf};

use crate::digest::Digest;

/// One logical change that must be reflected on the remote store.
///
/// Absolute paths identify the local file; relative paths are what the
/// remote uses to place it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
	Create { path: PathBuf, rel_path: PathBuf, digest: Digest },
	Modify { path: PathBuf, rel_path: PathBuf, digest: Digest },
	Rename { old_path: PathBuf, old_rel_path: PathBuf, new_path: PathBuf, new_rel_path: PathBuf },
	/// Renamed and edited at once. Without rename provenance on the remote
	/// this is uploaded like a fresh file.
	RenameModify {
		old_path: PathBuf,
		old_rel_path: PathBuf,
		new_path: PathBuf,
		new_rel_path: PathBuf,
		new_digest: Digest,
	},
	Delete { path: PathBuf, rel_path: PathBuf },
}

impl SyncOperation {
	pub fn kind(&self) -> &'static str {
		match self {
			SyncOperation::Create { .. } => "create",
			SyncOperation::Modify { .. } => "modify",
			SyncOperation::Rename { .. } => "rename",
			SyncOperation::RenameModify { .. } => "rename-modify",
			SyncOperation::Delete { .. } => "delete",
		}
	}

	/// The local path this operation acts on (the new path for renames)
	pub fn path(&self) -> &Path {
		match self {
			SyncOperation::Create { path, .. }
			| SyncOperation::Modify { path, .. }
			| SyncOperation::Delete { path, .. } => path,
			SyncOperation::Rename { new_path, .. }
			| SyncOperation::RenameModify { new_path, .. } => new_path,
		}
	}

	/// The remote call this operation turns into
	pub fn remote_call(&self) -> RemoteCall<'_> {
		match self {
			SyncOperation::Create { path, rel_path, digest }
			| SyncOperation::Modify { path, rel_path, digest } => {
				RemoteCall::Upsert { path, rel_path, digest }
			}
			SyncOperation::RenameModify { new_path, new_rel_path, new_digest, .. } => {
				RemoteCall::Upsert { path: new_path, rel_path: new_rel_path, digest: new_digest }
			}
			SyncOperation::Rename { old_path, old_rel_path, new_path, new_rel_path } => {
				RemoteCall::Rename { old_path, old_rel_path, new_path, new_rel_path }
			}
			SyncOperation::Delete { path, rel_path } => RemoteCall::Delete { path, rel_path },
		}
	}
}

impl fmt::Display for SyncOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncOperation::Rename { old_rel_path, new_rel_path, .. }
			| SyncOperation::RenameModify { old_rel_path, new_rel_path, .. } => write!(
				f,
				"{} {} -> {}",
				self.kind(),
				old_rel_path.display(),
				new_rel_path.display()
			),
			SyncOperation::Create { rel_path, .. }
			| SyncOperation::Modify { rel_path, .. }
			| SyncOperation::Delete { rel_path, .. } => {
				write!(f, "{} {}", self.kind(), rel_path.display())
			}
		}
	}
}

/// The three calls the remote store understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall<'a> {
	Upsert { path: &'a Path, rel_path: &'a Path, digest: &'a Digest },
	Rename { old_path: &'a Path, old_rel_path: &'a Path, new_path: &'a Path, new_rel_path: &'a Path },
	Delete { path: &'a Path, rel_path: &'a Path },
}


// vim: ts=4
