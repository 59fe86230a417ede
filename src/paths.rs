//! Watched roots and relative path resolution

use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Ordered set of watched root directories, fixed for the process lifetime.
///
/// Relative paths sent upstream are computed against each root's *parent*
/// directory, so they keep the root's own name as their first component
/// (`/sync/a/f.txt` under root `/sync/a` becomes `a/f.txt`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedRoots {
	roots: Vec<PathBuf>,
}

impl WatchedRoots {
	pub fn new<I, P>(roots: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		WatchedRoots { roots: roots.into_iter().map(Into::into).collect() }
	}

	pub fn iter(&self) -> impl Iterator<Item = &Path> {
		self.roots.iter().map(PathBuf::as_path)
	}

	pub fn len(&self) -> usize {
		self.roots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.roots.is_empty()
	}

	/// Path relative to the parent of the first root that contains it.
	/// `None` if no root's parent is a prefix of `path`.
	pub fn relative_to(&self, path: &Path) -> Option<PathBuf> {
		self.roots.iter().find_map(|root| {
			let base = anchor(root);
			path.strip_prefix(base).ok().map(Path::to_path_buf)
		})
	}

	/// Like [`relative_to`](Self::relative_to), but unresolved paths are an error.
	pub fn resolve(&self, path: &Path) -> Result<PathBuf, SyncError> {
		self.relative_to(path).ok_or_else(|| SyncError::UnresolvedPath { path: path.to_path_buf() })
	}

	/// The first root that `path` lies under
	pub fn owning_root(&self, path: &Path) -> Option<&Path> {
		self.roots.iter().map(PathBuf::as_path).find(|root| path.starts_with(root))
	}
}

/// Directory relative paths are computed against
fn anchor(root: &Path) -> &Path {
	match root.parent() {
		Some(parent) => parent,
		None => root,
	}
}


// vim: ts=4
