//! Configuration for hashsync
//!
//! All settings live in one immutable `Config`, built once at startup and
//! passed by reference to every component.
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (~/.config/hashsync/config.toml, or .json/.json5)
//! 3. Environment variables (HASHSYNC_* prefix)
//! 4. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::paths::WatchedRoots;
use crate::strategies::{DigestAlgorithm, SyncMode};

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// WATCHED TREES
	// ========================================================================
	/// Directories kept in sync, in resolution order
	pub roots: Vec<PathBuf>,

	/// Glob patterns to exclude, relative to each root (e.g., "*.tmp", "build/**")
	pub exclude_patterns: Vec<String>,

	/// Honor .gitignore and .ignore files during the initial walk
	pub respect_ignore_files: bool,

	// ========================================================================
	// SYNC BEHAVIOR
	// ========================================================================
	/// Whether remote-only files are deleted after the initial pass
	pub sync_mode: SyncMode,

	/// Content digest shared with the remote store
	pub digest_algorithm: DigestAlgorithm,

	// ========================================================================
	// PERFORMANCE
	// ========================================================================
	/// Files hashed concurrently while building the local index
	pub parallel_hashing: usize,

	/// Outbound requests allowed in flight at once
	pub max_in_flight: usize,

	/// Window for grouping raw notifications into one batch (milliseconds)
	pub debounce_ms: u64,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
	pub log_level: String,

	// ========================================================================
	// REMOTE STORE
	// ========================================================================
	pub server: ServerConfig,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			roots: vec![],
			exclude_patterns: vec![],
			respect_ignore_files: false,

			sync_mode: SyncMode::KeepRemote,
			digest_algorithm: DigestAlgorithm::Sha256,

			parallel_hashing: 4,
			max_in_flight: 16,
			debounce_ms: 50,

			log_level: "info".to_string(),

			server: ServerConfig::default(),
		}
	}
}

/// Remote store connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
	pub host: String,

	pub port: u16,

	/// "https" (default) or "http"
	pub scheme: String,

	/// Total time allowed for a single request, in seconds
	pub request_timeout_secs: u64,

	/// Extra PEM root certificate trusted for the server
	pub ca_cert: Option<PathBuf>,
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig {
			host: "127.0.0.1".to_string(),
			port: 8000,
			scheme: "https".to_string(),
			request_timeout_secs: 10,
			ca_cert: None,
		}
	}
}

impl ServerConfig {
	pub fn base_url(&self) -> String {
		format!("{}://{}:{}", self.scheme, self.host, self.port)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

// ============================================================================
// LOADING
// ============================================================================

impl Config {
	/// Default config file location, if one exists on disk
	pub fn default_path() -> Option<PathBuf> {
		let base = std::env::var("XDG_CONFIG_HOME")
			.ok()
			.map(PathBuf::from)
			.or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))?;
		let dir = base.join("hashsync");

		["config.toml", "config.json", "config.json5"]
			.iter()
			.map(|name| dir.join(name))
			.find(|p| p.is_file())
	}

	/// Load a config file. `.json`/`.json5` files are parsed as JSON5,
	/// everything else as TOML. Missing keys take their defaults.
	pub fn load(path: &Path) -> Result<Config, SyncError> {
		let contents = std::fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
			message: format!("Cannot read {}: {}", path.display(), e),
		})?;

		let is_json = matches!(
			path.extension().and_then(|e| e.to_str()),
			Some("json") | Some("json5")
		);

		let parsed = if is_json {
			json5::from_str::<Config>(&contents).map_err(|e| e.to_string())
		} else {
			toml::from_str::<Config>(&contents).map_err(|e| e.to_string())
		};

		parsed.map_err(|message| SyncError::InvalidConfig {
			message: format!("{}: {}", path.display(), message),
		})
	}

	/// Apply HASHSYNC_* overrides from the process environment
	pub fn apply_env(&mut self) -> Result<(), SyncError> {
		self.apply_env_from(|key| std::env::var(key).ok())
	}

	/// Apply overrides from any key lookup (the environment in production)
	pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), SyncError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(host) = lookup("HASHSYNC_SERVER_HOST") {
			self.server.host = host;
		}
		if let Some(port) = lookup("HASHSYNC_SERVER_PORT") {
			self.server.port = port.parse().map_err(|_| SyncError::InvalidConfig {
				message: format!("HASHSYNC_SERVER_PORT is not a port number: {}", port),
			})?;
		}
		if let Some(mode) = lookup("HASHSYNC_SYNC_MODE") {
			self.sync_mode = mode.parse().map_err(|message| SyncError::InvalidConfig { message })?;
		}
		if let Some(level) = lookup("HASHSYNC_LOG") {
			self.log_level = level;
		}
		Ok(())
	}

	/// Reject configurations the client cannot run with
	pub fn validate(&self) -> Result<(), SyncError> {
		let invalid = |message: String| Err(SyncError::InvalidConfig { message });

		if self.roots.is_empty() {
			return invalid("at least one root directory is required".to_string());
		}
		if let Some(root) = self.roots.iter().find(|r| !r.is_absolute()) {
			return invalid(format!("root {} must be an absolute path", root.display()));
		}
		if self.server.host.is_empty() {
			return invalid("server host is empty".to_string());
		}
		if self.server.port == 0 {
			return invalid("server port must not be 0".to_string());
		}
		if self.server.scheme != "https" && self.server.scheme != "http" {
			return invalid(format!("unsupported scheme: {}", self.server.scheme));
		}
		if self.server.request_timeout_secs == 0 {
			return invalid("requestTimeoutSecs must be positive".to_string());
		}
		if self.parallel_hashing == 0 || self.max_in_flight == 0 {
			return invalid("parallelHashing and maxInFlight must be positive".to_string());
		}
		Ok(())
	}

	pub fn watched_roots(&self) -> WatchedRoots {
		WatchedRoots::new(self.roots.iter().cloned())
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use tempfile::TempDir;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.sync_mode, SyncMode::KeepRemote);
		assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
		assert_eq!(config.server.request_timeout_secs, 10);
		assert_eq!(config.server.base_url(), "https://127.0.0.1:8000");
	}

	#[test]
	fn test_load_toml_with_partial_server_section() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(
			&path,
			r#"
roots = ["/srv/docs", "/srv/photos"]
syncMode = "prune-remote"
excludePatterns = ["*.tmp"]

[server]
host = "sync.example.com"
port = 8443
"#,
		)
		.unwrap();

		let config = Config::load(&path).unwrap();
		assert_eq!(config.roots.len(), 2);
		assert_eq!(config.sync_mode, SyncMode::PruneRemote);
		assert_eq!(config.server.host, "sync.example.com");
		assert_eq!(config.server.port, 8443);
		// untouched keys keep their defaults
		assert_eq!(config.server.request_timeout_secs, 10);
		assert_eq!(config.max_in_flight, 16);
	}

	#[test]
	fn test_load_json5() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json5");
		std::fs::write(
			&path,
			"{ roots: ['/srv/docs'], digestAlgorithm: 'blake3', server: { scheme: 'http' } }",
		)
		.unwrap();

		let config = Config::load(&path).unwrap();
		assert_eq!(config.digest_algorithm, DigestAlgorithm::Blake3);
		assert_eq!(config.server.scheme, "http");
	}

	#[test]
	fn test_load_rejects_garbage() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(&path, "roots = 12").unwrap();
		assert!(matches!(Config::load(&path), Err(SyncError::InvalidConfig { .. })));
	}

	#[test]
	fn test_env_overrides() {
		let env: HashMap<&str, &str> = [
			("HASHSYNC_SERVER_HOST", "10.0.0.5"),
			("HASHSYNC_SERVER_PORT", "9443"),
			("HASHSYNC_SYNC_MODE", "prune"),
		]
		.into_iter()
		.collect();

		let mut config = Config::default();
		config.apply_env_from(|k| env.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(config.server.host, "10.0.0.5");
		assert_eq!(config.server.port, 9443);
		assert_eq!(config.sync_mode, SyncMode::PruneRemote);
	}

	#[test]
	fn test_env_rejects_bad_port() {
		let mut config = Config::default();
		let result = config.apply_env_from(|k| {
			(k == "HASHSYNC_SERVER_PORT").then(|| "not-a-port".to_string())
		});
		assert!(result.is_err());
	}

	#[test]
	fn test_validate() {
		let mut config = Config::default();
		assert!(config.validate().is_err(), "no roots");

		config.roots = vec![PathBuf::from("relative/dir")];
		assert!(config.validate().is_err(), "relative root");

		config.roots = vec![PathBuf::from("/srv/docs")];
		assert!(config.validate().is_ok());

		config.server.port = 0;
		assert!(config.validate().is_err(), "port 0");
	}
}

// vim: ts=4
