//! Live correlation against real files
//!
//! Batches are fed directly to the correlator; digests are computed from
//! files on disk and compared with `digest_bytes` of the same content.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use hashsync::digest::digest_bytes;
use hashsync::{
	Correlator, DigestAlgorithm, RawNotification, SyncError, SyncOperation, WatchedRoots,
};

/// A temp dir holding one watched root named "a"
fn setup() -> (TempDir, PathBuf, Correlator) {
	let tmp = TempDir::new().unwrap();
	let root = tmp.path().join("a");
	fs::create_dir_all(&root).unwrap();
	let correlator = Correlator::new(WatchedRoots::new([root.clone()]), DigestAlgorithm::Sha256);
	(tmp, root, correlator)
}

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
	let path = root.join(name);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(&path, content).unwrap();
	path
}

#[tokio::test]
async fn test_added_file_is_upserted_with_its_digest() {
	let (_tmp, root, correlator) = setup();
	let path = write(&root, "notes/todo.txt", b"buy milk");

	let ops = correlator.correlate(&[RawNotification::added(&path)]).await;

	assert_eq!(
		ops,
		vec![SyncOperation::Modify {
			path: path.clone(),
			rel_path: PathBuf::from("a/notes/todo.txt"),
			digest: digest_bytes(b"buy milk", DigestAlgorithm::Sha256),
		}]
	);
}

#[tokio::test]
async fn test_removed_file_is_deleted_without_reading_it() {
	let (_tmp, root, correlator) = setup();
	let path = root.join("gone.txt");

	let ops = correlator.correlate(&[RawNotification::removed(&path)]).await;

	assert_eq!(
		ops,
		vec![SyncOperation::Delete { path, rel_path: PathBuf::from("a/gone.txt") }]
	);
}

#[tokio::test]
async fn test_rename_pair_in_either_order() {
	let (_tmp, root, correlator) = setup();
	let old = root.join("draft.txt");
	let new = write(&root, "final.txt", b"text");

	let expected = vec![SyncOperation::Rename {
		old_path: old.clone(),
		old_rel_path: PathBuf::from("a/draft.txt"),
		new_path: new.clone(),
		new_rel_path: PathBuf::from("a/final.txt"),
	}];

	let forward =
		correlator.correlate(&[RawNotification::removed(&old), RawNotification::added(&new)]).await;
	let backward =
		correlator.correlate(&[RawNotification::added(&new), RawNotification::removed(&old)]).await;

	assert_eq!(forward, expected);
	assert_eq!(backward, expected);
}

#[tokio::test]
async fn test_three_notifications_are_malformed_and_yield_nothing() {
	let (_tmp, root, correlator) = setup();
	let a = write(&root, "1.txt", b"1");
	let b = write(&root, "2.txt", b"2");

	let batch = [
		RawNotification::added(&a),
		RawNotification::added(&b),
		RawNotification::removed(root.join("3.txt")),
	];

	assert!(matches!(Correlator::pair(&batch), Err(SyncError::MalformedBatch { size: 3 })));
	assert!(correlator.correlate(&batch).await.is_empty());
	assert!(matches!(Correlator::pair(&[]), Err(SyncError::MalformedBatch { size: 0 })));
	assert!(correlator.correlate(&[]).await.is_empty());
}

#[tokio::test]
async fn test_path_outside_roots_is_dropped() {
	let (_tmp, _root, correlator) = setup();
	let other = TempDir::new().unwrap();
	let outside = write(other.path(), "elsewhere.txt", b"x");

	let ops = correlator.correlate(&[RawNotification::modified(&outside)]).await;
	assert!(ops.is_empty());
}

#[tokio::test]
async fn test_vanished_file_is_dropped() {
	let (_tmp, root, correlator) = setup();

	let ops = correlator.correlate(&[RawNotification::added(root.join("never-written"))]).await;
	assert!(ops.is_empty());
}

#[tokio::test]
async fn test_rename_with_unresolvable_side_is_dropped() {
	let (_tmp, root, correlator) = setup();
	let other = TempDir::new().unwrap();
	let new = write(&root, "in.txt", b"x");

	let ops = correlator
		.correlate(&[
			RawNotification::removed(other.path().join("out.txt")),
			RawNotification::added(&new),
		])
		.await;
	assert!(ops.is_empty());
}

// vim: ts=4
