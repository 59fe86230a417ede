//! Error types for hashsync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Digest computation failed for a file
	UnreadableFile { path: PathBuf },

	/// Path lies outside every watched root
	UnresolvedPath { path: PathBuf },

	/// Notification batch has a cardinality we refuse to classify
	MalformedBatch { size: usize },

	/// Remote store cannot be reached at all
	RemoteUnreachable { source: TransportError },

	/// Transport error (nested)
	Transport(TransportError),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Filesystem watcher failure
	Watch { message: String },

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::UnreadableFile { path } => {
				write!(f, "Cannot compute digest of {}", path.display())
			}
			SyncError::UnresolvedPath { path } => {
				write!(f, "Path {} is outside all watched roots", path.display())
			}
			SyncError::MalformedBatch { size } => {
				write!(f, "Malformed notification batch of {} events", size)
			}
			SyncError::RemoteUnreachable { source } => {
				write!(f, "Remote store unreachable: {}", source)
			}
			SyncError::Transport(e) => write!(f, "Transport error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Watch { message } => write!(f, "Watcher error: {}", message),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::RemoteUnreachable { source } => Some(source),
			SyncError::Transport(e) => Some(e),
			SyncError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<TransportError> for SyncError {
	fn from(e: TransportError) -> Self {
		SyncError::Transport(e)
	}
}

impl From<notify::Error> for SyncError {
	fn from(e: notify::Error) -> Self {
		SyncError::Watch { message: e.to_string() }
	}
}

/// Errors raised while talking to the remote store
#[derive(Debug)]
pub enum TransportError {
	/// Connection could not be established
	Unreachable { url: String, message: String },

	/// Request did not complete in time
	Timeout { url: String },

	/// Server answered with a non-success status
	Status { url: String, status: u16, body: String },

	/// Request could not be built or sent
	Request { message: String },

	/// Local file could not be read for upload
	Io(io::Error),

	/// Response body could not be decoded
	Decode { message: String },
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::Unreachable { url, message } => {
				write!(f, "Cannot connect to {}: {}", url, message)
			}
			TransportError::Timeout { url } => write!(f, "Request to {} timed out", url),
			TransportError::Status { url, status, body } => {
				write!(f, "{} answered {}: {}", url, status, body)
			}
			TransportError::Request { message } => write!(f, "Request failed: {}", message),
			TransportError::Io(e) => write!(f, "I/O error: {}", e),
			TransportError::Decode { message } => write!(f, "Cannot decode response: {}", message),
		}
	}
}

impl Error for TransportError {}

impl From<io::Error> for TransportError {
	fn from(e: io::Error) -> Self {
		TransportError::Io(e)
	}
}

impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		let url = e.url().map(|u| u.to_string()).unwrap_or_default();
		if e.is_connect() {
			TransportError::Unreachable { url, message: e.to_string() }
		} else if e.is_timeout() {
			TransportError::Timeout { url }
		} else if e.is_decode() {
			TransportError::Decode { message: e.to_string() }
		} else {
			TransportError::Request { message: e.to_string() }
		}
	}
}

impl TransportError {
	/// True when the server could not be reached at all
	pub fn is_unreachable(&self) -> bool {
		matches!(self, TransportError::Unreachable { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_messages() {
		let err = SyncError::UnresolvedPath { path: PathBuf::from("/elsewhere/f.txt") };
		assert_eq!(err.to_string(), "Path /elsewhere/f.txt is outside all watched roots");

		let err = SyncError::MalformedBatch { size: 3 };
		assert_eq!(err.to_string(), "Malformed notification batch of 3 events");
	}

	#[test]
	fn test_unreachable_is_source_of_sync_error() {
		let transport = TransportError::Unreachable {
			url: "https://127.0.0.1:1/get_data".to_string(),
			message: "connection refused".to_string(),
		};
		assert!(transport.is_unreachable());

		let err = SyncError::RemoteUnreachable { source: transport };
		assert!(err.source().is_some());
		assert!(err.to_string().contains("connection refused"));
	}
}

// vim: ts=4
