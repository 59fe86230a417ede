//! Content-addressed file index
//!
//! An [`Index`] maps absolute paths to content digests and keeps a reverse
//! digest → paths map in step with it, so rename detection can ask "who else
//! has this content?" without scanning. [`IndexBuilder`] produces the local
//! index by walking the watched roots.

use futures::stream::{self, StreamExt};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::digest::{digest_file, Digest};
use crate::exclusion::PathFilter;
use crate::logging::*;
use crate::paths::WatchedRoots;
use crate::strategies::DigestAlgorithm;

/// Snapshot mapping of file path to digest, local or remote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
	by_path: BTreeMap<PathBuf, Digest>,
	by_digest: BTreeMap<Digest, BTreeSet<PathBuf>>,
}

impl Index {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace the digest recorded for `path`
	pub fn insert(&mut self, path: PathBuf, digest: Digest) -> Option<Digest> {
		let previous = self.by_path.insert(path.clone(), digest.clone());
		if let Some(old) = &previous {
			self.unlink(old, &path);
		}
		self.by_digest.entry(digest).or_default().insert(path);
		previous
	}

	pub fn remove(&mut self, path: &Path) -> Option<Digest> {
		let digest = self.by_path.remove(path)?;
		self.unlink(&digest, path);
		Some(digest)
	}

	fn unlink(&mut self, digest: &Digest, path: &Path) {
		if let Some(paths) = self.by_digest.get_mut(digest) {
			paths.remove(path);
			if paths.is_empty() {
				self.by_digest.remove(digest);
			}
		}
	}

	pub fn get(&self, path: &Path) -> Option<&Digest> {
		self.by_path.get(path)
	}

	pub fn contains(&self, path: &Path) -> bool {
		self.by_path.contains_key(path)
	}

	/// Lexicographically first path holding `digest`
	pub fn find_by_digest(&self, digest: &Digest) -> Option<&Path> {
		self.by_digest.get(digest).and_then(|paths| paths.iter().next()).map(PathBuf::as_path)
	}

	pub fn len(&self) -> usize {
		self.by_path.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_path.is_empty()
	}

	/// Entries in lexicographic path order
	pub fn iter(&self) -> impl Iterator<Item = (&Path, &Digest)> {
		self.by_path.iter().map(|(p, d)| (p.as_path(), d))
	}

	pub fn into_map(self) -> BTreeMap<PathBuf, Digest> {
		self.by_path
	}
}

impl FromIterator<(PathBuf, Digest)> for Index {
	fn from_iter<I: IntoIterator<Item = (PathBuf, Digest)>>(iter: I) -> Self {
		let mut index = Index::new();
		for (path, digest) in iter {
			index.insert(path, digest);
		}
		index
	}
}

impl Serialize for Index {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.by_path.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Index {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let map = BTreeMap::<PathBuf, Digest>::deserialize(deserializer)?;
		Ok(map.into_iter().collect())
	}
}

//////////////////
// IndexBuilder //
//////////////////

/// Walks the watched roots and hashes every regular file
pub struct IndexBuilder {
	roots: WatchedRoots,
	filter: PathFilter,
	algorithm: DigestAlgorithm,
	parallelism: usize,
	respect_ignore_files: bool,
}

impl IndexBuilder {
	pub fn new(roots: WatchedRoots, filter: PathFilter, algorithm: DigestAlgorithm) -> Self {
		Self { roots, filter, algorithm, parallelism: 4, respect_ignore_files: false }
	}

	pub fn from_config(config: &Config, filter: PathFilter) -> Self {
		Self::new(config.watched_roots(), filter, config.digest_algorithm)
			.parallelism(config.parallel_hashing)
			.respect_ignore_files(config.respect_ignore_files)
	}

	/// Maximum number of files hashed at once
	pub fn parallelism(mut self, n: usize) -> Self {
		self.parallelism = n.max(1);
		self
	}

	/// Honor .gitignore/.ignore files while walking
	pub fn respect_ignore_files(mut self, respect: bool) -> Self {
		self.respect_ignore_files = respect;
		self
	}

	/// Build the local index.
	///
	/// Files that vanish or cannot be read between listing and hashing are
	/// left out; the next live notification for them will pick them up.
	pub async fn build(&self) -> Index {
		debug!("Indexing {} watched roots...", self.roots.len());

		let roots: Vec<PathBuf> = self.roots.iter().map(Path::to_path_buf).collect();
		let respect = self.respect_ignore_files;
		let listed = match tokio::task::spawn_blocking(move || list_files(&roots, respect)).await {
			Ok(files) => files,
			Err(e) => {
				error!("Directory walk aborted: {}", e);
				Vec::new()
			}
		};

		let candidates: Vec<PathBuf> =
			listed.into_iter().filter(|p| !self.filter.is_excluded(p)).collect();

		let algorithm = self.algorithm;
		let hashed: Vec<(PathBuf, Digest)> = stream::iter(candidates)
			.map(|path| async move {
				let digest = digest_file(&path, algorithm).await;
				(path, digest)
			})
			.buffer_unordered(self.parallelism)
			.collect()
			.await;

		let mut index = Index::new();
		let mut skipped = 0usize;
		for (path, digest) in hashed {
			if digest.is_empty() {
				skipped += 1;
				continue;
			}
			index.insert(path, digest);
		}

		if skipped > 0 {
			warn!("{} files could not be read and were left out of the index", skipped);
		}
		info!("Local index built: {} files", index.len());
		index
	}
}

/// Every regular file under `roots`. Missing roots and unreadable entries
/// are logged and skipped.
pub(crate) fn list_files(roots: &[PathBuf], respect_ignore_files: bool) -> Vec<PathBuf> {
	let mut files = Vec::new();

	for root in roots {
		if !root.is_dir() {
			warn!("Watched root {} is not a directory, skipping", root.display());
			continue;
		}

		let walker = ignore::WalkBuilder::new(root)
			.hidden(false)
			.follow_links(false)
			.require_git(false)
			.ignore(respect_ignore_files)
			.git_ignore(respect_ignore_files)
			.git_global(respect_ignore_files)
			.git_exclude(respect_ignore_files)
			.parents(respect_ignore_files)
			.build();

		for entry in walker {
			match entry {
				Ok(entry) => {
					if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
						files.push(entry.into_path());
					}
				}
				Err(e) => debug!("Skipping unreadable entry under {}: {}", root.display(), e),
			}
		}
	}

	files
}


// vim: ts=4
