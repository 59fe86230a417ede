//! Streaming content digests
//!
//! Files are hashed in fixed-size reads so large files never sit in memory.
//! A file that cannot be read yields the empty digest instead of an error;
//! callers decide whether that means "skip" or "retry later".

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::path::Path;
use tokio::fs as afs;
use tokio::io::AsyncReadExt;

use crate::logging::*;
use crate::strategies::DigestAlgorithm;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Hex-encoded content digest. The empty string means "unknown/unreadable".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
	pub fn new(hex: impl Into<String>) -> Self {
		Digest(hex.into())
	}

	/// The unreadable sentinel
	pub fn empty() -> Self {
		Digest(String::new())
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Digest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Digest {
	fn from(s: &str) -> Self {
		Digest(s.to_string())
	}
}

enum Hasher {
	Sha256(Sha256),
	Blake3(Box<blake3::Hasher>),
}

impl Hasher {
	fn new(algorithm: DigestAlgorithm) -> Self {
		match algorithm {
			DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
			DigestAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
		}
	}

	fn update(&mut self, buf: &[u8]) {
		match self {
			Hasher::Sha256(h) => h.update(buf),
			Hasher::Blake3(h) => {
				h.update(buf);
			}
		}
	}

	fn finish(self) -> Digest {
		match self {
			Hasher::Sha256(h) => Digest(hex::encode(h.finalize())),
			Hasher::Blake3(h) => Digest(hex::encode(h.finalize().as_bytes())),
		}
	}
}

/// Hash an in-memory buffer
pub fn digest_bytes(buf: &[u8], algorithm: DigestAlgorithm) -> Digest {
	let mut hasher = Hasher::new(algorithm);
	hasher.update(buf);
	hasher.finish()
}

/// Hash a file by streaming it from disk.
///
/// Returns [`Digest::empty`] when the file cannot be opened or read. The
/// failure is logged here so it is never silently ignored.
pub async fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> Digest {
	match stream_digest(path, algorithm).await {
		Ok(digest) => digest,
		Err(e) => {
			warn!("Cannot compute digest of {}: {}", path.display(), e);
			Digest::empty()
		}
	}
}

async fn stream_digest(path: &Path, algorithm: DigestAlgorithm) -> std::io::Result<Digest> {
	let mut file = afs::File::open(path).await?;
	let mut hasher = Hasher::new(algorithm);
	let mut buf = vec![0u8; READ_BUF_SIZE];

	loop {
		let n = file.read(&mut buf).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}

	Ok(hasher.finish())
}


// vim: ts=4
