//! Consolidated strategy and mode enums
//!
//! Each enum includes a FromStr implementation for CLI and config parsing
//! and a Display implementation matching its serialized form.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// SYNC MODE
// ============================================================================

/// What to do with files the remote has but the local roots no longer do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
	/// Leave remote-only files alone (default)
	#[default]
	KeepRemote,

	/// Delete remote-only files after the initial reconciliation
	PruneRemote,
}

impl FromStr for SyncMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"keep" | "keep-remote" | "0" => Ok(Self::KeepRemote),
			"prune" | "prune-remote" | "1" => Ok(Self::PruneRemote),
			_ => Err(format!("Unknown sync mode: {}. Valid options: keep-remote, prune-remote", s)),
		}
	}
}

impl std::fmt::Display for SyncMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::KeepRemote => write!(f, "keep-remote"),
			Self::PruneRemote => write!(f, "prune-remote"),
		}
	}
}

impl SyncMode {
	pub fn prunes_remote(self) -> bool {
		matches!(self, Self::PruneRemote)
	}
}

// ============================================================================
// DIGEST ALGORITHM
// ============================================================================

/// Content digest used to compare local and remote files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
	/// SHA-256, what the remote store expects (default)
	#[default]
	Sha256,

	/// BLAKE3, for stores configured to agree on it
	Blake3,
}

impl FromStr for DigestAlgorithm {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"sha256" | "sha-256" => Ok(Self::Sha256),
			"blake3" => Ok(Self::Blake3),
			_ => Err(format!("Unknown digest algorithm: {}. Valid options: sha256, blake3", s)),
		}
	}
}

impl std::fmt::Display for DigestAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Sha256 => write!(f, "sha256"),
			Self::Blake3 => write!(f, "blake3"),
		}
	}
}


// vim: ts=4
