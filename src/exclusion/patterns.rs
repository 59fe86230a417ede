//! Glob matching for excluded paths

use super::ExclusionError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Editor swap/backup files and OS metadata; never worth syncing
const BUILTIN_EXCLUDES: &[&str] = &[
	"**/.DS_Store",
	"**/Thumbs.db",
	"**/desktop.ini",
	"**/*.swp",
	"**/*.swo",
	"**/*~",
	"**/.nfs*",
];

/// Built-in plus user patterns, compiled into one set
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	set: GlobSet,
	user_patterns: usize,
}

impl PatternMatcher {
	pub fn new(exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		let mut builder = GlobSetBuilder::new();

		let user = exclude_patterns.iter().map(String::as_str);
		for pattern in BUILTIN_EXCLUDES.iter().copied().chain(user) {
			let glob = Glob::new(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			builder.add(glob);
		}

		let set = builder
			.build()
			.map_err(|e| ExclusionError::InvalidPattern(format!("cannot compile patterns: {}", e)))?;

		Ok(Self { set, user_patterns: exclude_patterns.len() })
	}

	/// Number of patterns that came from configuration
	pub fn user_patterns(&self) -> usize {
		self.user_patterns
	}

	/// `path` is relative to its watched root
	pub fn is_excluded(&self, path: &Path) -> bool {
		self.set.is_match(path)
	}
}


// vim: ts=4
