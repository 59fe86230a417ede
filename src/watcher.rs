//! Filesystem notification source
//!
//! Watches every root recursively with `notify` and groups raw events per
//! debounce window. A quiet window holding at most two notifications is
//! delivered as one batch, so a rename reaches the correlator as a `Removed`
//! + `Added` pair. A busier window is delivered one notification per batch;
//! a rename caught in a burst then syncs as a delete plus an upload.
//!
//! Splitting busy windows is deliberate: a batch of three or more
//! notifications is never delivered, so the correlator's malformed-batch path
//! only fires for callers that build batches themselves.
//!
//! Within a window a path that is created and removed again leaves no trace,
//! so the temp file of an atomic save never reaches the remote. Directories
//! are resolved when the window closes: a window that is exactly a rename
//! pair keeps a moved directory whole, and anywhere else an added directory
//! stands for the files inside it.

use futures::Stream;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::correlate::{NotificationKind, RawNotification};
use crate::error::SyncError;
use crate::exclusion::PathFilter;
use crate::index::list_files;
use crate::logging::*;
use crate::paths::WatchedRoots;

/// Capacity of the raw event bridge and of the batch channel
const CHANNEL_CAPACITY: usize = 1024;

/// Map one notify event to raw notifications
pub fn translate(event: &Event) -> Vec<RawNotification> {
	let kind = match event.kind {
		EventKind::Create(_) => NotificationKind::Added,
		EventKind::Remove(_) => NotificationKind::Removed,
		EventKind::Modify(ModifyKind::Name(mode)) => return translate_rename(mode, &event.paths),
		EventKind::Modify(_) => NotificationKind::Modified,
		_ => return Vec::new(),
	};

	event.paths.iter().map(|p| RawNotification { kind, path: p.clone() }).collect()
}

fn translate_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<RawNotification> {
	match (mode, paths) {
		(RenameMode::From, _) => paths.iter().map(RawNotification::removed).collect(),
		(RenameMode::To, _) => paths.iter().map(RawNotification::added).collect(),
		(RenameMode::Both, [from, to]) => {
			vec![RawNotification::removed(from), RawNotification::added(to)]
		}
		// Platform could not tell the direction
		_ => paths
			.iter()
			.map(|p| {
				if p.exists() {
					RawNotification::added(p)
				} else {
					RawNotification::removed(p)
				}
			})
			.collect(),
	}
}

/// Notifications collected during one debounce window, one per path
#[derive(Debug, Default)]
pub struct PendingBatch {
	order: Vec<PathBuf>,
	kinds: HashMap<PathBuf, NotificationKind>,
	/// Created and removed again within this window
	transient: HashSet<PathBuf>,
}

impl PendingBatch {
	pub fn push(&mut self, notification: RawNotification) {
		use NotificationKind::*;

		let RawNotification { kind, path } = notification;
		match self.kinds.get(&path).copied() {
			None => {
				if self.transient.contains(&path) {
					// A rename reports its source more than once
					if kind == Removed {
						return;
					}
					self.transient.remove(&path);
				}
				self.order.push(path.clone());
				self.kinds.insert(path, kind);
			}
			Some(Added) if kind == Removed => {
				self.kinds.remove(&path);
				self.order.retain(|p| p != &path);
				self.transient.insert(path);
			}
			Some(previous) => {
				let merged = match (previous, kind) {
					// A new file keeps reporting Added until the window closes
					(Added, Modified) => Added,
					// Replaced in place
					(Removed, Added) | (Removed, Modified) => Modified,
					(_, next) => next,
				};
				self.kinds.insert(path, merged);
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Take the batch in first-seen order
	pub fn take(&mut self) -> Vec<RawNotification> {
		self.transient.clear();
		let mut kinds = std::mem::take(&mut self.kinds);
		std::mem::take(&mut self.order)
			.into_iter()
			.filter_map(|path| kinds.remove(&path).map(|kind| RawNotification { kind, path }))
			.collect()
	}
}

/// Split one window into correlator batches
pub fn into_batches(window: Vec<RawNotification>) -> Vec<Vec<RawNotification>> {
	if window.len() <= 2 {
		return vec![window];
	}
	debug!("Busy window with {} notifications, delivering singly", window.len());
	window.into_iter().map(|n| vec![n]).collect()
}

fn is_rename_pair(window: &[RawNotification]) -> bool {
	match window {
		[first, second] => {
			(first.kind == NotificationKind::Removed) != (second.kind == NotificationKind::Removed)
		}
		_ => false,
	}
}

/// Resolve directory notifications in a closed window.
///
/// A rename pair is returned untouched, so a moved directory goes out as one
/// rename of its path. Otherwise every added directory is replaced by an
/// `Added` notification for each non-excluded file below it.
pub async fn expand_directories(
	window: Vec<RawNotification>,
	filter: &PathFilter,
) -> Vec<RawNotification> {
	if is_rename_pair(&window) {
		return window;
	}

	let mut expanded = PendingBatch::default();
	for notification in window {
		if notification.kind != NotificationKind::Added || !notification.path.is_dir() {
			expanded.push(notification);
			continue;
		}

		let dir = notification.path;
		let walk_root = vec![dir.clone()];
		let files = match tokio::task::spawn_blocking(move || list_files(&walk_root, false)).await {
			Ok(files) => files,
			Err(e) => {
				error!("Walk of {} aborted: {}", dir.display(), e);
				continue;
			}
		};
		debug!("Added directory {} holds {} files", dir.display(), files.len());

		for file in files {
			if !filter.is_excluded(&file) {
				expanded.push(RawNotification::added(file));
			}
		}
	}
	expanded.take()
}

/// Handle to a running watcher. Dropping it stops the watch.
pub struct NotificationSource {
	_watcher: RecommendedWatcher,
	batches: mpsc::Receiver<Vec<RawNotification>>,
}

impl NotificationSource {
	/// Start watching every root. Must be called inside a tokio runtime.
	pub fn start(
		roots: &WatchedRoots,
		filter: PathFilter,
		debounce: Duration,
	) -> Result<Self, SyncError> {
		let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>(CHANNEL_CAPACITY);
		let (batch_tx, batch_rx) = mpsc::channel::<Vec<RawNotification>>(CHANNEL_CAPACITY);

		let mut watcher = RecommendedWatcher::new(
			move |res| {
				let _ = raw_tx.blocking_send(res);
			},
			notify::Config::default(),
		)?;

		for root in roots.iter() {
			watcher.watch(root, RecursiveMode::Recursive)?;
			info!("Watching directory: {}", root.display());
		}

		tokio::spawn(batch_task(raw_rx, batch_tx, filter, debounce));

		Ok(Self { _watcher: watcher, batches: batch_rx })
	}

	/// Next batch, or `None` once the watcher is gone
	pub async fn next_batch(&mut self) -> Option<Vec<RawNotification>> {
		self.batches.recv().await
	}
}

impl Stream for NotificationSource {
	type Item = Vec<RawNotification>;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.batches.poll_recv(cx)
	}
}

/// Accumulate raw events and flush them as one batch per quiet window
async fn batch_task(
	mut raw_rx: mpsc::Receiver<notify::Result<Event>>,
	batch_tx: mpsc::Sender<Vec<RawNotification>>,
	filter: PathFilter,
	debounce: Duration,
) {
	let mut pending = PendingBatch::default();
	let mut deadline: Option<tokio::time::Instant> = None;

	loop {
		tokio::select! {
			res = raw_rx.recv() => {
				match res {
					Some(Ok(event)) => {
						for notification in translate(&event) {
							// Directory metadata churn carries nothing to sync
							if notification.kind == NotificationKind::Modified && notification.path.is_dir() {
								continue;
							}
							if filter.is_excluded(&notification.path) {
								debug!("Ignoring excluded path: {}", notification.path.display());
								continue;
							}
							pending.push(notification);
							deadline = Some(tokio::time::Instant::now() + debounce);
						}
					}
					Some(Err(e)) => warn!("Watcher error: {}", e),
					None => break,
				}
			}
			_ = async {
				match deadline {
					Some(at) => tokio::time::sleep_until(at).await,
					None => std::future::pending::<()>().await,
				}
			} => {
				deadline = None;
				let window = expand_directories(pending.take(), &filter).await;
				if window.is_empty() {
					continue;
				}
				for batch in into_batches(window) {
					if batch_tx.send(batch).await.is_err() {
						return;
					}
				}
			}
		}
	}

	let window = expand_directories(pending.take(), &filter).await;
	for batch in into_batches(window) {
		if batch.is_empty() || batch_tx.send(batch).await.is_err() {
			return;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::correlate::{Correlation, Correlator};
	use notify::event::{CreateKind, DataChange, RemoveKind};
	use std::fs;
	use tempfile::TempDir;

	fn event(kind: EventKind, paths: &[&str]) -> Event {
		let mut e = Event::new(kind);
		for p in paths {
			e = e.add_path(PathBuf::from(p));
		}
		e
	}

	#[test]
	fn test_translate_basic_kinds() {
		let created = translate(&event(EventKind::Create(CreateKind::File), &["/r/a"]));
		assert_eq!(created, vec![RawNotification::added("/r/a")]);

		let modified = translate(&event(
			EventKind::Modify(ModifyKind::Data(DataChange::Content)),
			&["/r/a"],
		));
		assert_eq!(modified, vec![RawNotification::modified("/r/a")]);

		let removed = translate(&event(EventKind::Remove(RemoveKind::File), &["/r/a"]));
		assert_eq!(removed, vec![RawNotification::removed("/r/a")]);
	}

	#[test]
	fn test_translate_rename_both_splits_into_pair() {
		let pair = translate(&event(
			EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
			&["/r/old", "/r/new"],
		));
		assert_eq!(pair, vec![RawNotification::removed("/r/old"), RawNotification::added("/r/new")]);
	}

	#[test]
	fn test_translate_ignores_access_events() {
		let access = translate(&event(EventKind::Access(notify::event::AccessKind::Any), &["/r/a"]));
		assert!(access.is_empty());
	}

	#[test]
	fn test_pending_batch_coalesces_per_path() {
		let mut batch = PendingBatch::default();
		batch.push(RawNotification::added("/r/new"));
		batch.push(RawNotification::modified("/r/new"));
		batch.push(RawNotification::removed("/r/old"));
		batch.push(RawNotification::modified("/r/new"));

		assert_eq!(
			batch.take(),
			vec![RawNotification::added("/r/new"), RawNotification::removed("/r/old")]
		);
		assert!(batch.is_empty());
	}

	#[test]
	fn test_pending_batch_replace_in_place_is_modify() {
		let mut batch = PendingBatch::default();
		batch.push(RawNotification::removed("/r/doc.txt"));
		batch.push(RawNotification::added("/r/doc.txt"));

		assert_eq!(batch.take(), vec![RawNotification::modified("/r/doc.txt")]);
	}

	#[test]
	fn test_atomic_save_leaves_only_the_target() {
		let mut batch = PendingBatch::default();
		batch.push(RawNotification::added("/r/a/.f.txt.tmp"));
		batch.push(RawNotification::modified("/r/a/.f.txt.tmp"));
		batch.push(RawNotification::removed("/r/a/.f.txt.tmp"));
		batch.push(RawNotification::added("/r/a/f.txt"));
		// Same rename again, as a paired event
		batch.push(RawNotification::removed("/r/a/.f.txt.tmp"));
		batch.push(RawNotification::added("/r/a/f.txt"));

		let window = batch.take();
		assert_eq!(window, vec![RawNotification::added("/r/a/f.txt")]);
		assert_eq!(
			Correlator::pair(&window).unwrap(),
			vec![Correlation::Upsert(PathBuf::from("/r/a/f.txt"))]
		);
	}

	#[test]
	fn test_path_recreated_within_window_is_added() {
		let mut batch = PendingBatch::default();
		batch.push(RawNotification::added("/r/x"));
		batch.push(RawNotification::removed("/r/x"));
		assert!(batch.is_empty());

		batch.push(RawNotification::added("/r/x"));
		assert_eq!(batch.take(), vec![RawNotification::added("/r/x")]);

		// The next window starts clean
		batch.push(RawNotification::removed("/r/x"));
		assert_eq!(batch.take(), vec![RawNotification::removed("/r/x")]);
	}

	#[test]
	fn test_busy_window_is_delivered_singly() {
		let pair = vec![RawNotification::removed("/r/a"), RawNotification::added("/r/b")];
		assert_eq!(into_batches(pair.clone()), vec![pair]);

		let burst = vec![
			RawNotification::added("/r/1"),
			RawNotification::added("/r/2"),
			RawNotification::added("/r/3"),
		];
		let batches = into_batches(burst);
		assert_eq!(batches.len(), 3);
		assert!(batches.iter().all(|b| b.len() == 1));
	}

	fn dir_setup() -> (TempDir, PathBuf, PathFilter) {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path().join("a");
		fs::create_dir_all(&root).unwrap();
		let filter = PathFilter::new(WatchedRoots::new([root.clone()]), &["*.tmp".to_string()]).unwrap();
		(tmp, root, filter)
	}

	#[tokio::test]
	async fn test_moved_directory_stays_a_rename_pair() {
		let (_tmp, root, filter) = dir_setup();
		fs::create_dir_all(root.join("papers")).unwrap();
		fs::write(root.join("papers/x.txt"), b"x").unwrap();

		let window =
			vec![RawNotification::removed(root.join("docs")), RawNotification::added(root.join("papers"))];
		let resolved = expand_directories(window.clone(), &filter).await;

		assert_eq!(resolved, window);
		assert_eq!(
			Correlator::pair(&resolved).unwrap(),
			vec![Correlation::Rename { old: root.join("docs"), new: root.join("papers") }]
		);
	}

	#[tokio::test]
	async fn test_added_directory_expands_to_its_files() {
		let (_tmp, root, filter) = dir_setup();
		fs::create_dir_all(root.join("new/deep")).unwrap();
		fs::write(root.join("new/one.txt"), b"1").unwrap();
		fs::write(root.join("new/deep/two.txt"), b"2").unwrap();
		fs::write(root.join("new/scratch.tmp"), b"t").unwrap();

		let window = vec![
			RawNotification::added(root.join("new")),
			// Also reported on its own by the watcher
			RawNotification::added(root.join("new/one.txt")),
		];
		let mut resolved = expand_directories(window, &filter).await;
		resolved.sort_by(|a, b| a.path.cmp(&b.path));

		assert_eq!(
			resolved,
			vec![
				RawNotification::added(root.join("new/deep/two.txt")),
				RawNotification::added(root.join("new/one.txt")),
			]
		);
	}

	#[tokio::test]
	async fn test_directory_moved_in_a_busy_window_uploads_its_files() {
		let (_tmp, root, filter) = dir_setup();
		fs::create_dir_all(root.join("papers")).unwrap();
		fs::write(root.join("papers/x.txt"), b"x").unwrap();
		fs::write(root.join("other.txt"), b"o").unwrap();

		let window = vec![
			RawNotification::removed(root.join("docs")),
			RawNotification::added(root.join("papers")),
			RawNotification::modified(root.join("other.txt")),
		];
		let resolved = expand_directories(window, &filter).await;

		assert_eq!(
			resolved,
			vec![
				RawNotification::removed(root.join("docs")),
				RawNotification::added(root.join("papers/x.txt")),
				RawNotification::modified(root.join("other.txt")),
			]
		);
	}
}

// vim: ts=4
