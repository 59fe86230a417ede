//! HTTP client for the remote store
//!
//! The store speaks four endpoints:
//!
//! | call   | request                                              |
//! |--------|------------------------------------------------------|
//! | fetch  | `GET /get_data` → `{ "<abs path>": "<digest>", ... }` |
//! | upsert | `POST /file_hash_update`, multipart `file` + `payload` |
//! | rename | `POST /file_name_update`, JSON payload               |
//! | delete | `DELETE /delete_file`, JSON payload                  |

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use std::path::Path;

use crate::config::ServerConfig;
use crate::digest::Digest;
use crate::dispatch::{Dispatcher, RemoteStore};
use crate::error::{SyncError, TransportError};
use crate::index::Index;
use crate::logging::*;

/// Body shared by every mutating request; unused fields are sent as null
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
	pub file_path: String,
	pub relative_path: Option<String>,
	pub old_path: Option<String>,
	pub old_relative_path: Option<String>,
	pub file_hash: Option<String>,
}

impl Payload {
	pub fn upsert(path: &Path, rel_path: &Path, digest: &Digest) -> Self {
		Payload {
			file_path: path_str(path),
			relative_path: Some(path_str(rel_path)),
			old_path: None,
			old_relative_path: None,
			file_hash: Some(digest.to_string()),
		}
	}

	pub fn rename(
		old_path: &Path,
		old_rel_path: &Path,
		new_path: &Path,
		new_rel_path: &Path,
	) -> Self {
		Payload {
			file_path: path_str(new_path),
			relative_path: Some(path_str(new_rel_path)),
			old_path: Some(path_str(old_path)),
			old_relative_path: Some(path_str(old_rel_path)),
			file_hash: None,
		}
	}

	pub fn delete(path: &Path, rel_path: &Path) -> Self {
		Payload {
			file_path: path_str(path),
			relative_path: Some(path_str(rel_path)),
			old_path: None,
			old_relative_path: None,
			file_hash: None,
		}
	}
}

fn path_str(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}

/// Client for one remote store
#[derive(Debug, Clone)]
pub struct RemoteClient {
	client: Client,
	base_url: String,
}

impl RemoteClient {
	pub fn new(server: &ServerConfig) -> Result<Self, SyncError> {
		let mut builder = Client::builder().timeout(server.request_timeout());

		if let Some(ca_path) = &server.ca_cert {
			let pem = std::fs::read(ca_path).map_err(|e| SyncError::InvalidConfig {
				message: format!("Cannot read CA certificate {}: {}", ca_path.display(), e),
			})?;
			let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| SyncError::InvalidConfig {
				message: format!("Invalid CA certificate {}: {}", ca_path.display(), e),
			})?;
			builder = builder.add_root_certificate(cert);
		}

		let client = builder.build().map_err(|e| SyncError::InvalidConfig {
			message: format!("Cannot build HTTP client: {}", e),
		})?;

		Ok(Self { client, base_url: server.base_url() })
	}

	fn url(&self, endpoint: &str) -> String {
		format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
	}

	/// Fetch the remote index.
	///
	/// A server that cannot be reached at all is an error; every other
	/// failure degrades to an empty index, which only means local files are
	/// uploaded as new.
	pub async fn fetch_remote_index(&self) -> Result<Index, TransportError> {
		let url = self.url("get_data");
		debug!("Fetching remote index from {}", url);

		let response = match self.client.get(&url).send().await {
			Ok(r) => r,
			Err(e) => {
				let err = TransportError::from(e);
				if err.is_unreachable() {
					return Err(err);
				}
				warn!("Cannot fetch remote index, assuming it is empty: {}", err);
				return Ok(Index::new());
			}
		};

		let response = match check_status(&url, response).await {
			Ok(r) => r,
			Err(e) => {
				warn!("Cannot fetch remote index, assuming it is empty: {}", e);
				return Ok(Index::new());
			}
		};

		match response.json::<Index>().await {
			Ok(index) => {
				info!("Remote index fetched: {} files", index.len());
				Ok(index)
			}
			Err(e) => {
				warn!("Remote index is not valid JSON, assuming it is empty: {}", e);
				Ok(Index::new())
			}
		}
	}
}

/// Turn non-success statuses into errors, logging the body of successful ones
async fn check_status(url: &str, response: Response) -> Result<Response, TransportError> {
	let status = response.status();
	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		return Err(TransportError::Status { url: url.to_string(), status: status.as_u16(), body });
	}
	Ok(response)
}

async fn finish(url: &str, response: Response) -> Result<(), TransportError> {
	let response = check_status(url, response).await?;
	let body = response.text().await.unwrap_or_default();
	debug!("{} -> {}", url, body);
	Ok(())
}

#[async_trait]
impl Dispatcher for RemoteClient {
	async fn upsert(
		&self,
		path: &Path,
		rel_path: &Path,
		digest: &Digest,
	) -> Result<(), TransportError> {
		let url = self.url("file_hash_update");
		debug!("Updating file: {}", path.display());

		// Streamed from disk, never held in memory whole
		let file = tokio::fs::File::open(path).await?;
		let len = file.metadata().await?.len();
		let payload = serde_json::to_string(&Payload::upsert(path, rel_path, digest))
			.map_err(|e| TransportError::Request { message: e.to_string() })?;

		let form = Form::new()
			.part("file", Part::stream_with_length(file, len).file_name(path_str(path)))
			.text("payload", payload);

		let response = self.client.post(&url).multipart(form).send().await?;
		finish(&url, response).await
	}

	async fn rename(
		&self,
		old_path: &Path,
		old_rel_path: &Path,
		new_path: &Path,
		new_rel_path: &Path,
	) -> Result<(), TransportError> {
		let url = self.url("file_name_update");
		debug!("Renaming file: {} -> {}", old_path.display(), new_path.display());

		let payload = Payload::rename(old_path, old_rel_path, new_path, new_rel_path);
		let response = self.client.post(&url).json(&payload).send().await?;
		finish(&url, response).await
	}

	async fn delete(&self, path: &Path, rel_path: &Path) -> Result<(), TransportError> {
		let url = self.url("delete_file");
		debug!("Removing file: {}", path.display());

		let payload = Payload::delete(path, rel_path);
		let response = self.client.delete(&url).json(&payload).send().await?;
		finish(&url, response).await
	}
}

#[async_trait]
impl RemoteStore for RemoteClient {
	async fn fetch_index(&self) -> Result<Index, TransportError> {
		self.fetch_remote_index().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rename_payload_shape() {
		let payload = Payload::rename(
			Path::new("/sync/a/old.txt"),
			Path::new("a/old.txt"),
			Path::new("/sync/a/f.txt"),
			Path::new("a/f.txt"),
		);
		let json = serde_json::to_value(&payload).unwrap();

		assert_eq!(json["file_path"], "/sync/a/f.txt");
		assert_eq!(json["relative_path"], "a/f.txt");
		assert_eq!(json["old_path"], "/sync/a/old.txt");
		assert_eq!(json["old_relative_path"], "a/old.txt");
		assert!(json["file_hash"].is_null());
	}

	#[test]
	fn test_delete_payload_nulls_unused_fields() {
		let payload = Payload::delete(Path::new("/sync/a/g.txt"), Path::new("a/g.txt"));
		let json = serde_json::to_value(&payload).unwrap();

		let obj = json.as_object().unwrap();
		assert_eq!(obj.len(), 5);
		assert!(obj["old_path"].is_null());
		assert!(obj["file_hash"].is_null());
	}

	#[test]
	fn test_urls() {
		let server = ServerConfig { host: "sync.local".to_string(), port: 8443, ..Default::default() };
		let client = RemoteClient::new(&server).unwrap();
		assert_eq!(client.url("get_data"), "https://sync.local:8443/get_data");
	}

	#[test]
	fn test_missing_ca_cert_is_config_error() {
		let server = ServerConfig {
			ca_cert: Some("/nonexistent/ca.pem".into()),
			..Default::default()
		};
		assert!(matches!(RemoteClient::new(&server), Err(SyncError::InvalidConfig { .. })));
	}

	/// Accept one request, answer 200 and hand back the raw request bytes
	async fn serve_once(listener: tokio::net::TcpListener) -> Vec<u8> {
		use tokio::io::{AsyncReadExt, AsyncWriteExt};

		let (mut socket, _) = listener.accept().await.unwrap();
		let mut request = Vec::new();
		let mut buf = [0u8; 8192];
		loop {
			let n = socket.read(&mut buf).await.unwrap();
			if n == 0 {
				break;
			}
			request.extend_from_slice(&buf[..n]);

			let text = String::from_utf8_lossy(&request).to_string();
			if let Some(end) = text.find("\r\n\r\n") {
				let length = text[..end]
					.lines()
					.find_map(|l| {
						let (name, value) = l.split_once(':')?;
						if !name.eq_ignore_ascii_case("content-length") {
							return None;
						}
						value.trim().parse::<usize>().ok()
					});
				let complete = match length {
					Some(len) => request.len() >= end + 4 + len,
					None => text.ends_with("--\r\n"),
				};
				if complete {
					break;
				}
			}
		}
		socket.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await.unwrap();
		request
	}

	#[tokio::test]
	async fn test_upsert_streams_file_and_payload() {
		let tmp = tempfile::TempDir::new().unwrap();
		let path = tmp.path().join("a").join("report.txt");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		let content = "line of report text\n".repeat(4096);
		std::fs::write(&path, &content).unwrap();

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		let server = tokio::spawn(serve_once(listener));

		let config = ServerConfig {
			scheme: "http".to_string(),
			host: "127.0.0.1".to_string(),
			port,
			request_timeout_secs: 5,
			..Default::default()
		};
		let client = RemoteClient::new(&config).unwrap();
		client
			.upsert(&path, Path::new("a/report.txt"), &Digest::from("abc123"))
			.await
			.unwrap();

		let request = String::from_utf8(server.await.unwrap()).unwrap();
		assert!(request.starts_with("POST /file_hash_update "));
		assert!(request.contains("name=\"file\""));
		assert!(request.contains(&content));
		assert!(request.contains("\"relative_path\":\"a/report.txt\""));
		assert!(request.contains("\"file_hash\":\"abc123\""));
	}

	#[tokio::test]
	async fn test_upsert_of_missing_file_fails_before_sending() {
		let client = RemoteClient::new(&ServerConfig::default()).unwrap();
		let result = client
			.upsert(Path::new("/nonexistent/a/f.txt"), Path::new("a/f.txt"), &Digest::from("h"))
			.await;
		assert!(matches!(result, Err(TransportError::Io(_))));
	}

	#[tokio::test]
	async fn test_refused_connection_is_unreachable() {
		// Grab a free port, then close it so nothing is listening there
		let port = {
			let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
			listener.local_addr().unwrap().port()
		};
		let server = ServerConfig {
			scheme: "http".to_string(),
			port,
			request_timeout_secs: 2,
			..Default::default()
		};

		let client = RemoteClient::new(&server).unwrap();
		let result = client.fetch_remote_index().await;
		assert!(matches!(result, Err(TransportError::Unreachable { .. })));
	}
}

// vim: ts=4
