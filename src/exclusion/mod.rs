//! Paths left out of synchronization
//!
//! Paths are matched relative to the watched root that owns them, so a
//! pattern like `build/**` means the same thing under every root.

mod patterns;

pub use patterns::PatternMatcher;

use std::error::Error;
use std::fmt;
use std::path::Path;

use crate::error::SyncError;
use crate::logging::*;
use crate::paths::WatchedRoots;

/// Decides which absolute paths take part in synchronization
#[derive(Debug, Clone)]
pub struct PathFilter {
	roots: WatchedRoots,
	matcher: PatternMatcher,
}

impl PathFilter {
	pub fn new(roots: WatchedRoots, exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		let matcher = PatternMatcher::new(exclude_patterns)?;
		debug!("Exclusion filter ready: {} user patterns", matcher.user_patterns());
		Ok(Self { roots, matcher })
	}

	/// True if `path` matches an exclusion pattern relative to its owning root.
	/// Paths outside every root are not excluded here; resolving them is the
	/// caller's job.
	pub fn is_excluded(&self, path: &Path) -> bool {
		match self.roots.owning_root(path) {
			Some(root) => match path.strip_prefix(root) {
				Ok(rel) => self.matcher.is_excluded(rel),
				Err(_) => false,
			},
			None => false,
		}
	}
}

/// Errors from the exclusion system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionError {
	/// Glob that does not parse
	InvalidPattern(String),
}

impl fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => write!(f, "bad exclude pattern {}", msg),
		}
	}
}

impl Error for ExclusionError {}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}


// vim: ts=4
