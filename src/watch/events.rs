//! File events and their classification from raw watcher events.

use std::fmt;
use std::path::PathBuf;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Add,
    Change,
    Unlink,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileEventKind::Add => "ADD",
            FileEventKind::Change => "CHANGE",
            FileEventKind::Unlink => "UNLINK",
        })
    }
}

/// A single file event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Map a raw watcher event to add/change/unlink events.
///
/// Metadata and access events are dropped. Directory events are kept;
/// the watch loop expands them to the files inside.
pub fn classify(event: &Event) -> Vec<FileEvent> {
    let all = |kind: FileEventKind| {
        event
            .paths
            .iter()
            .map(|p| FileEvent::new(kind, p.clone()))
            .collect::<Vec<_>>()
    };

    match event.kind {
        EventKind::Create(_) => all(FileEventKind::Add),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(FileEventKind::Unlink),
            RenameMode::To => all(FileEventKind::Add),
            RenameMode::Both => {
                let mut events = Vec::with_capacity(2);
                if let Some(from) = event.paths.first() {
                    events.push(FileEvent::new(FileEventKind::Unlink, from.clone()));
                }
                if let Some(to) = event.paths.get(1) {
                    events.push(FileEvent::new(FileEventKind::Add, to.clone()));
                }
                events
            }
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        FileEventKind::Add
                    } else {
                        FileEventKind::Unlink
                    };
                    FileEvent::new(kind, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(_) => all(FileEventKind::Change),
        EventKind::Remove(_) => all(FileEventKind::Unlink),
        EventKind::Any | EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}
