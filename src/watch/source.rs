//! Source tree watcher.

use std::path::PathBuf;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::watch::events::{classify, FileEvent, FileEventKind};

/// Watches the source directory and forwards add/change/unlink events
/// for files with the source extension, plus added and removed
/// directories that may hold such files.
pub struct SourceWatcher {
    root: PathBuf,
    extension: String,
    event_tx: mpsc::UnboundedSender<FileEvent>,
}

impl SourceWatcher {
    /// Create a new SourceWatcher.
    ///
    /// Returns the watcher and a receiver for file events.
    pub fn new(
        root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<FileEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                root: root.into(),
                extension: extension.into(),
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching. Events are delivered until the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx.clone();
        let extension = self.extension.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for file_event in classify(&event) {
                        if should_forward(&file_event, &extension) {
                            let _ = tx.send(file_event);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        tracing::info!(path = ?self.root, extension = %self.extension, "Source watcher started");
        Ok(watcher)
    }
}

/// Source files, new directories, and anything that vanished (it may have been a directory).
fn should_forward(event: &FileEvent, extension: &str) -> bool {
    let is_source = event.path.extension().and_then(|e| e.to_str()) == Some(extension);
    match event.kind {
        FileEventKind::Change => is_source,
        FileEventKind::Add => is_source || event.path.is_dir(),
        FileEventKind::Unlink => is_source || !event.path.exists(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_forwarding_rules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("routes")).unwrap();
        std::fs::write(root.join("notes.txt"), "x").unwrap();

        let forwarded = |kind, path: PathBuf| should_forward(&FileEvent::new(kind, path), "rhai");

        assert!(forwarded(FileEventKind::Change, root.join("a.rhai")));
        assert!(!forwarded(FileEventKind::Change, root.join("notes.txt")));
        assert!(!forwarded(FileEventKind::Change, root.join("routes")));
        assert!(forwarded(FileEventKind::Add, root.join("routes")));
        assert!(!forwarded(FileEventKind::Add, root.join("notes.txt")));
        assert!(forwarded(FileEventKind::Unlink, root.join("gone")));
        assert!(!forwarded(FileEventKind::Unlink, root.join("notes.txt")));
    }

    #[tokio::test]
    async fn test_reports_renamed_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("users")).unwrap();
        std::fs::write(root.join("users/a.rhai"), "fn get() { 1 }").unwrap();

        let (watcher, mut rx) = SourceWatcher::new(&root, "rhai");
        let _watcher = watcher.run().unwrap();
        std::fs::rename(root.join("users"), root.join("people")).unwrap();

        let mut seen = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            seen.push(event);
        }
        assert!(
            seen.contains(&FileEvent::new(FileEventKind::Unlink, root.join("users"))),
            "{seen:?}"
        );
        assert!(
            seen.contains(&FileEvent::new(FileEventKind::Add, root.join("people"))),
            "{seen:?}"
        );
    }

    #[tokio::test]
    async fn test_reports_new_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (watcher, mut rx) = SourceWatcher::new(&root, "rhai");
        let _watcher = watcher.run().unwrap();

        std::fs::write(root.join("notes.txt"), "ignored").unwrap();
        std::fs::write(root.join("a.rhai"), "fn get() { 1 }").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event received")
            .unwrap();
        assert_eq!(event.path, root.join("a.rhai"));
    }
}
