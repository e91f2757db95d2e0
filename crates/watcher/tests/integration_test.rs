//! Integration tests for the change watcher
//!
//! These tests use temporary directories and real filesystem operations
//! to validate the watcher's behavior in realistic scenarios.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use wsync_core::{ChangeBatch, ChangeKind, ChangeOrigin, Error, Notifier, Result};
use wsync_watcher::{ChangeWatcher, WatcherConfig};

/// Forwards every batch to a channel, optionally failing the first calls
struct RecordingNotifier {
    tx: mpsc::UnboundedSender<ChangeBatch>,
    failures_left: AtomicUsize,
}

impl RecordingNotifier {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChangeBatch>) {
        Self::failing(0)
    }

    fn failing(failures: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<ChangeBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(Self {
            tx,
            failures_left: AtomicUsize::new(failures),
        });
        (notifier, rx)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_changed(&self, batch: ChangeBatch) -> Result<()> {
        let _ = self.tx.send(batch);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::notify("engine unavailable"));
        }
        Ok(())
    }
}

/// Never completes a notification
struct StuckNotifier {
    entered: Notify,
}

#[async_trait]
impl Notifier for StuckNotifier {
    async fn notify_changed(&self, _batch: ChangeBatch) -> Result<()> {
        self.entered.notify_one();
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Temp dir plus its canonical path, which is what events report
fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = std::fs::canonicalize(temp_dir.path()).unwrap();
    (temp_dir, root)
}

fn config(debounce_ms: u64) -> WatcherConfig {
    WatcherConfig::builder().debounce_ms(debounce_ms).build()
}

async fn next_batch(rx: &mut mpsc::UnboundedReceiver<ChangeBatch>) -> ChangeBatch {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a batch")
        .expect("notifier dropped")
}

/// Collect batches until one contains `path`
async fn wait_for_path(
    rx: &mut mpsc::UnboundedReceiver<ChangeBatch>,
    path: &Path,
) -> Vec<ChangeBatch> {
    let mut seen = Vec::new();
    loop {
        let batch = next_batch(rx).await;
        let found = batch.contains_path(path);
        seen.push(batch);
        if found {
            return seen;
        }
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_rapid_writes_coalesce_into_one_batch() {
    let (_guard, root) = setup();
    let file = root.join("lib.rs");
    tokio::fs::write(&file, "fn main() {}").await.unwrap();

    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(200)).unwrap();
    settle().await;

    for i in 0..5 {
        tokio::fs::write(&file, format!("fn main() {{ /* {i} */ }}"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    let batch = next_batch(&mut rx).await;
    assert_eq!(batch.origin(), ChangeOrigin::Disk);

    let kinds: Vec<ChangeKind> = batch.events_for(&file).map(|e| e.kind).collect();
    assert!(!kinds.is_empty(), "batch missing {file:?}: {batch:?}");
    assert!(kinds.iter().all(|k| *k == ChangeKind::Changed), "{kinds:?}");

    let result = timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(result.is_err(), "Received unexpected additional batch");

    assert_eq!(watcher.diagnostics().snapshot().batches_delivered, 1);
    watcher.close().await;
}

#[tokio::test]
async fn test_file_in_new_directory_is_not_lost() {
    let (_guard, root) = setup();
    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(200)).unwrap();
    settle().await;

    let subdir = root.join("pkg");
    let file = subdir.join("mod.rs");
    tokio::fs::create_dir(&subdir).await.unwrap();
    tokio::fs::write(&file, "pub fn f() {}").await.unwrap();

    let batches = wait_for_path(&mut rx, &file).await;
    assert!(batches.iter().any(|b| b
        .events_for(&subdir)
        .any(|e| e.kind == ChangeKind::Created)));
    assert!(watcher.is_watching(&subdir));

    watcher.close().await;
}

#[tokio::test]
async fn test_nested_directories_created_at_once_are_registered() {
    let (_guard, root) = setup();
    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(100)).unwrap();
    settle().await;

    let deep = root.join("a/b/c");
    tokio::fs::create_dir_all(&deep).await.unwrap();
    let file = deep.join("leaf.rs");
    tokio::fs::write(&file, "").await.unwrap();

    wait_for_path(&mut rx, &file).await;
    assert!(watcher.is_watching(&root.join("a/b")));
    assert!(watcher.is_watching(&deep));

    // Writes after the burst are seen through the new registrations.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while rx.try_recv().is_ok() {}
    tokio::fs::write(&file, "// edited").await.unwrap();
    let batches = wait_for_path(&mut rx, &file).await;
    let last = batches.last().unwrap();
    assert!(last.events_for(&file).any(|e| e.kind == ChangeKind::Changed));

    watcher.close().await;
}

#[tokio::test]
async fn test_deletion_is_reported() {
    let (_guard, root) = setup();
    let file = root.join("gone.rs");
    tokio::fs::write(&file, "").await.unwrap();

    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(50)).unwrap();
    settle().await;

    tokio::fs::remove_file(&file).await.unwrap();

    let batches = wait_for_path(&mut rx, &file).await;
    let last = batches.last().unwrap();
    assert!(last.events_for(&file).any(|e| e.kind == ChangeKind::Deleted));

    watcher.close().await;
}

#[tokio::test]
async fn test_deleted_directory_is_unregistered() {
    let (_guard, root) = setup();
    let subdir = root.join("old");
    std::fs::create_dir_all(subdir.join("inner")).unwrap();

    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(50)).unwrap();
    assert!(watcher.is_watching(&subdir.join("inner")));
    settle().await;

    tokio::fs::remove_dir_all(&subdir).await.unwrap();
    wait_for_path(&mut rx, &subdir).await;

    assert!(!watcher.is_watching(&subdir));
    assert!(!watcher.is_watching(&subdir.join("inner")));
    assert!(watcher.is_watching(&root));

    watcher.close().await;
}

#[tokio::test]
async fn test_rename_reports_both_sides() {
    let (_guard, root) = setup();
    let from = root.join("before.rs");
    let to = root.join("after.rs");
    tokio::fs::write(&from, "").await.unwrap();

    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(100)).unwrap();
    settle().await;

    tokio::fs::rename(&from, &to).await.unwrap();

    let batches = wait_for_path(&mut rx, &to).await;
    let events: Vec<_> = batches.iter().flat_map(|b| b.events().to_vec()).collect();
    assert!(events
        .iter()
        .any(|e| e.path == from && e.kind == ChangeKind::Deleted));
    assert!(events
        .iter()
        .any(|e| e.path == to && e.kind == ChangeKind::Created));

    watcher.close().await;
}

#[tokio::test]
async fn test_ignore_patterns() {
    let (_guard, root) = setup();
    let (notifier, mut rx) = RecordingNotifier::new();
    let config = WatcherConfig::builder()
        .debounce_ms(100)
        .add_ignore_pattern("*.log")
        .add_ignore_pattern("build")
        .build();
    std::fs::create_dir(root.join("build")).unwrap();

    let watcher = ChangeWatcher::with_config(notifier, &root, config).unwrap();
    assert!(!watcher.is_watching(&root.join("build")));
    settle().await;

    let kept = root.join("main.rs");
    tokio::fs::write(root.join("debug.log"), "noise").await.unwrap();
    tokio::fs::write(root.join("build/out.o"), "noise").await.unwrap();
    tokio::fs::write(&kept, "fn main() {}").await.unwrap();

    let batches = wait_for_path(&mut rx, &kept).await;
    for batch in &batches {
        assert!(!batch.contains_path(&root.join("debug.log")));
        assert!(!batch.contains_path(&root.join("build/out.o")));
    }
    assert!(watcher.diagnostics().snapshot().events_ignored > 0);

    watcher.close().await;
}

#[tokio::test]
async fn test_missing_root_fails_setup() {
    let (_guard, root) = setup();
    let (notifier, _rx) = RecordingNotifier::new();

    let err = ChangeWatcher::new(notifier, root.join("missing")).unwrap_err();
    assert!(err.is_watch_setup(), "{err}");
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_file_root_fails_setup() {
    let (_guard, root) = setup();
    let file = root.join("not_a_dir.rs");
    std::fs::write(&file, "").unwrap();
    let (notifier, _rx) = RecordingNotifier::new();

    let err = ChangeWatcher::new(notifier, &file).unwrap_err();
    assert!(err.is_watch_setup());
    assert!(err.to_string().contains("not a directory"));
}

#[test]
fn test_setup_outside_runtime_fails() {
    let (_guard, root) = setup();
    let (notifier, _rx) = RecordingNotifier::new();

    let err = ChangeWatcher::new(notifier, &root).unwrap_err();
    assert!(err.is_watch_setup());
}

#[tokio::test]
async fn test_failed_notification_is_swallowed() {
    let (_guard, root) = setup();
    let (notifier, mut rx) = RecordingNotifier::failing(1);
    let watcher = ChangeWatcher::with_config(notifier, &root, config(50)).unwrap();
    settle().await;

    let first = root.join("first.rs");
    tokio::fs::write(&first, "").await.unwrap();
    wait_for_path(&mut rx, &first).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    while rx.try_recv().is_ok() {}
    let second = root.join("second.rs");
    tokio::fs::write(&second, "").await.unwrap();
    let batches = wait_for_path(&mut rx, &second).await;

    // The failed batch is not retried.
    assert!(batches.iter().all(|b| !b.contains_path(&first)));

    let snap = watcher.diagnostics().snapshot();
    assert_eq!(snap.notify_failures, 1);
    assert!(snap.batches_delivered >= 1);

    watcher.close().await;
}

#[tokio::test]
async fn test_resync_after_failed_notification() {
    let (_guard, root) = setup();
    let existing = root.join("existing.rs");
    std::fs::write(&existing, "").unwrap();

    let (notifier, mut rx) = RecordingNotifier::failing(1);
    let config = WatcherConfig::builder()
        .debounce_ms(50)
        .resync_on_notify_failure(true)
        .build();
    let watcher = ChangeWatcher::with_config(notifier, &root, config).unwrap();
    settle().await;

    let first = root.join("first.rs");
    tokio::fs::write(&first, "").await.unwrap();
    wait_for_path(&mut rx, &first).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = root.join("second.rs");
    tokio::fs::write(&second, "").await.unwrap();
    let batches = wait_for_path(&mut rx, &second).await;
    let last = batches.last().unwrap();

    assert!(last.contains_path(&existing));
    assert!(last.contains_path(&first));

    watcher.close().await;
}

#[tokio::test]
async fn test_close_with_pending_batch_drops_it() {
    let (_guard, root) = setup();
    let (notifier, mut rx) = RecordingNotifier::new();
    let watcher = ChangeWatcher::with_config(notifier, &root, config(10_000)).unwrap();
    settle().await;

    tokio::fs::write(root.join("late.rs"), "").await.unwrap();
    settle().await;

    timeout(Duration::from_secs(1), watcher.close())
        .await
        .expect("close did not return promptly");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_close_during_inflight_flush() {
    let (_guard, root) = setup();
    let notifier = Arc::new(StuckNotifier {
        entered: Notify::new(),
    });
    let watcher = ChangeWatcher::with_config(notifier.clone(), &root, config(50)).unwrap();
    settle().await;

    tokio::fs::write(root.join("a.rs"), "").await.unwrap();
    timeout(Duration::from_secs(5), notifier.entered.notified())
        .await
        .expect("flush never started");

    timeout(Duration::from_secs(1), watcher.close())
        .await
        .expect("close did not return promptly");

    // The event loop owned the only other reference.
    assert_eq!(Arc::strong_count(&notifier), 1);
}

#[tokio::test]
async fn test_close_releases_registrations() {
    let (_guard, root) = setup();
    std::fs::create_dir_all(root.join("src")).unwrap();
    let (notifier, _rx) = RecordingNotifier::new();

    let watcher = ChangeWatcher::new(notifier.clone(), &root).unwrap();
    assert_eq!(
        watcher.watched_directories(),
        vec![root.clone(), root.join("src")]
    );

    watcher.close().await;
    assert_eq!(Arc::strong_count(&notifier), 1);
}
