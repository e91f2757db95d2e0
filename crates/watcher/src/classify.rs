//! Mapping of raw notify events onto [`ChangeKind`]

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use wsync_core::{ChangeEvent, ChangeKind};

/// Classify a raw notify event into zero or more change events
///
/// Read-only access signals produce nothing. Renames split into a deletion
/// of the old path and a creation of the new one. Any signal not recognised
/// below is reported as [`ChangeKind::Changed`].
pub(crate) fn classify(event: &Event) -> Vec<ChangeEvent> {
    match &event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            with_kind(event, ChangeKind::Changed)
        }
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => with_kind(event, ChangeKind::Created),
        EventKind::Remove(_) => with_kind(event, ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => classify_rename(event, *mode),
        _ => with_kind(event, ChangeKind::Changed),
    }
}

fn with_kind(event: &Event, kind: ChangeKind) -> Vec<ChangeEvent> {
    event
        .paths
        .iter()
        .map(|path| ChangeEvent::new(path.clone(), kind))
        .collect()
}

fn classify_rename(event: &Event, mode: RenameMode) -> Vec<ChangeEvent> {
    match mode {
        RenameMode::From => with_kind(event, ChangeKind::Deleted),
        RenameMode::To => with_kind(event, ChangeKind::Created),
        RenameMode::Both => {
            let mut changes = Vec::with_capacity(event.paths.len());
            let mut paths = event.paths.iter();
            if let Some(from) = paths.next() {
                changes.push(ChangeEvent::deleted(from.clone()));
            }
            if let Some(to) = paths.next() {
                changes.push(ChangeEvent::created(to.clone()));
            }
            changes.extend(paths.map(|p| ChangeEvent::changed(p.clone())));
            changes
        }
        // Backends that cannot tell the two sides apart (FSEvents) report a
        // bare rename; the path's current existence decides which side it was.
        RenameMode::Any | RenameMode::Other => event
            .paths
            .iter()
            .map(|path| {
                if path.exists() {
                    ChangeEvent::created(path.clone())
                } else {
                    ChangeEvent::deleted(path.clone())
                }
            })
            .collect(),
    }
}
