// src/watch/debounce.rs

//! Turning raw `notify` events into [`FsEvent`]s and coalescing bursts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use super::event::{FsEvent, FsEventKind};

/// Classifies raw events, remembering which paths are known to exist so
/// that a create over an existing path (atomic save) reads as a change.
#[derive(Debug, Default)]
pub struct EventClassifier {
    known: HashSet<PathBuf>,
}

impl EventClassifier {
    pub fn new(existing: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            known: existing.into_iter().collect(),
        }
    }

    pub fn classify(&mut self, kind: &EventKind, path: &Path) -> Option<FsEventKind> {
        match kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                Some(self.appeared(path))
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.known.remove(path);
                Some(FsEventKind::Removed)
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    Some(self.appeared(path))
                } else {
                    self.known.remove(path);
                    Some(FsEventKind::Removed)
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) | EventKind::Any => {
                self.known.insert(path.to_path_buf());
                Some(FsEventKind::Changed)
            }
            EventKind::Access(_) | EventKind::Other => None,
        }
    }

    fn appeared(&mut self, path: &Path) -> FsEventKind {
        if self.known.insert(path.to_path_buf()) {
            FsEventKind::Created
        } else {
            FsEventKind::Changed
        }
    }
}

/// Collects events inside one debounce window, keeping one entry per path
/// in first-seen order.
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: Vec<FsEvent>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn push(&mut self, event: FsEvent) {
        match self.pending.iter().position(|e| e.path == event.path) {
            Some(idx) => match merge(self.pending[idx].kind, event.kind) {
                Some(kind) => self.pending[idx].kind = kind,
                None => {
                    self.pending.remove(idx);
                }
            },
            None => self.pending.push(event),
        }
    }

    pub fn drain(&mut self) -> Vec<FsEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Net effect of two events on the same path; `None` cancels both.
fn merge(prev: FsEventKind, next: FsEventKind) -> Option<FsEventKind> {
    use FsEventKind::*;
    match (prev, next) {
        (Created, Changed) => Some(Created),
        (Created, Removed) => None,
        (Removed, Created) => Some(Changed),
        (_, next) => Some(next),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn create_over_known_path_is_a_change() {
        let mut c = EventClassifier::new([PathBuf::from("/d/a.js")]);
        let create = EventKind::Create(CreateKind::File);
        assert_eq!(c.classify(&create, Path::new("/d/a.js")), Some(FsEventKind::Changed));
        assert_eq!(c.classify(&create, Path::new("/d/b.js")), Some(FsEventKind::Created));
        // b is known from now on.
        assert_eq!(c.classify(&create, Path::new("/d/b.js")), Some(FsEventKind::Changed));
    }

    #[test]
    fn remove_forgets_path() {
        let mut c = EventClassifier::new([PathBuf::from("/d/a.js")]);
        let remove = EventKind::Remove(RemoveKind::File);
        let create = EventKind::Create(CreateKind::File);
        assert_eq!(c.classify(&remove, Path::new("/d/a.js")), Some(FsEventKind::Removed));
        assert_eq!(c.classify(&create, Path::new("/d/a.js")), Some(FsEventKind::Created));
    }

    #[test]
    fn data_change_is_change_and_metadata_is_ignored() {
        let mut c = EventClassifier::default();
        let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let meta = EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions));
        assert_eq!(c.classify(&data, Path::new("/a")), Some(FsEventKind::Changed));
        assert_eq!(c.classify(&meta, Path::new("/a")), None);
    }

    #[test]
    fn coalescer_merges_bursts_per_path() {
        let mut co = Coalescer::new();
        co.push(FsEvent::new(FsEventKind::Changed, "/a"));
        co.push(FsEvent::new(FsEventKind::Changed, "/a"));
        co.push(FsEvent::new(FsEventKind::Removed, "/b"));
        co.push(FsEvent::new(FsEventKind::Created, "/b"));
        co.push(FsEvent::new(FsEventKind::Created, "/c"));
        co.push(FsEvent::new(FsEventKind::Removed, "/c"));

        let out = co.drain();
        assert_eq!(
            out,
            vec![
                FsEvent::new(FsEventKind::Changed, "/a"),
                FsEvent::new(FsEventKind::Changed, "/b"),
            ]
        );
        assert!(co.is_empty());
    }
}
