//! Learning progress: completed and bookmarked topics plus per-topic notes.
//!
//! Every role starts from saved progress: the server's when logged in, the
//! device's otherwise. Only members write changes back, to the local store on
//! every change and to the backend after a quiet period.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::models::{ProgressSnapshot, Role};
use crate::store::{keys, LocalStore};
use crate::sync::Debouncer;

pub fn topic_key(category: &str, topic: &str) -> String {
    format!("{}::{}", category, topic)
}

/// Backend side of progress sync.
pub trait ProgressRemote: Send + 'static {
    fn fetch_progress(&self) -> ApiResult<ProgressSnapshot>;
    fn push_progress(&self, snapshot: &ProgressSnapshot) -> ApiResult<()>;
}

struct SyncTarget<'a> {
    store: &'a LocalStore,
    debouncer: Option<Debouncer<ProgressSnapshot>>,
}

pub struct ProgressTracker<'a> {
    completed: BTreeSet<String>,
    bookmarked: BTreeSet<String>,
    notes: BTreeMap<String, String>,
    expanded: BTreeSet<String>,
    dark_mode: bool,
    sync: Option<SyncTarget<'a>>,
}

impl<'a> ProgressTracker<'a> {
    pub fn view_only() -> Self {
        Self {
            completed: BTreeSet::new(),
            bookmarked: BTreeSet::new(),
            notes: BTreeMap::new(),
            expanded: BTreeSet::new(),
            dark_mode: false,
            sync: None,
        }
    }

    /// Loads from the server, falling back to the local store. Members then
    /// persist every change; other roles only change in-memory state.
    pub fn for_role<R: ProgressRemote>(
        role: Role,
        store: &'a LocalStore,
        remote: Option<R>,
        window: Duration,
    ) -> Result<Self> {
        let persistent = role == Role::Member;
        let initial = load_snapshot(store, remote.as_ref(), persistent)?;

        let mut tracker = Self::view_only();
        tracker.completed = initial.completed_topics.into_iter().collect();
        tracker.bookmarked = initial.bookmarked_topics.into_iter().collect();
        tracker.notes = initial.notes;
        tracker.dark_mode = store.get_json(keys::DARK_MODE)?.unwrap_or(false);

        if !persistent {
            debug!(%role, "progress changes are not saved for this role");
            return Ok(tracker);
        }

        let debouncer = match remote {
            Some(remote) => Some(Debouncer::spawn(window, move |snapshot: ProgressSnapshot| {
                match remote.push_progress(&snapshot) {
                    Ok(()) => debug!(completed = snapshot.completed_topics.len(), "progress synced"),
                    Err(e) => warn!("Failed to sync progress: {}", e),
                }
            })?),
            None => None,
        };
        tracker.sync = Some(SyncTarget { store, debouncer });
        Ok(tracker)
    }

    pub fn is_persistent(&self) -> bool {
        self.sync.is_some()
    }

    /// Returns the new completion state.
    pub fn toggle_complete(&mut self, key: &str) -> Result<bool> {
        let now = toggle(&mut self.completed, key);
        self.persist()?;
        Ok(now)
    }

    /// Returns the new bookmark state.
    pub fn toggle_bookmark(&mut self, key: &str) -> Result<bool> {
        let now = toggle(&mut self.bookmarked, key);
        self.persist()?;
        Ok(now)
    }

    /// Empty text removes the note.
    pub fn set_note(&mut self, key: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            self.notes.remove(key);
        } else {
            self.notes.insert(key.to_string(), text.to_string());
        }
        self.persist()
    }

    pub fn toggle_expanded(&mut self, category: &str) -> bool {
        toggle(&mut self.expanded, category)
    }

    pub fn toggle_dark_mode(&mut self) -> Result<bool> {
        self.dark_mode = !self.dark_mode;
        if let Some(target) = &self.sync {
            target.store.set_json(keys::DARK_MODE, &self.dark_mode)?;
        }
        Ok(self.dark_mode)
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.contains(key)
    }

    pub fn is_bookmarked(&self, key: &str) -> bool {
        self.bookmarked.contains(key)
    }

    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }

    pub fn is_expanded(&self, category: &str) -> bool {
        self.expanded.contains(category)
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn completed_in(&self, category: &str) -> usize {
        let prefix = topic_key(category, "");
        self.completed.iter().filter(|k| k.starts_with(&prefix)).count()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed_topics: self.completed.iter().cloned().collect(),
            bookmarked_topics: self.bookmarked.iter().cloned().collect(),
            notes: self.notes.clone(),
        }
    }

    /// Pushes any pending change without waiting for the window.
    pub fn flush(&self) {
        if let Some(debouncer) = self.sync.as_ref().and_then(|t| t.debouncer.as_ref()) {
            debouncer.flush();
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(target) = &self.sync else {
            return Ok(());
        };
        let snapshot = self.snapshot();
        write_local(target.store, &snapshot)?;
        if let Some(debouncer) = &target.debouncer {
            debouncer.schedule(snapshot);
        }
        Ok(())
    }
}

fn toggle(set: &mut BTreeSet<String>, key: &str) -> bool {
    if set.remove(key) {
        false
    } else {
        set.insert(key.to_string());
        true
    }
}

/// Server state wins and, with `mirror`, is copied into the local store. The
/// local store covers offline use and fetch failures.
pub fn load_snapshot<R: ProgressRemote>(
    store: &LocalStore,
    remote: Option<&R>,
    mirror: bool,
) -> Result<ProgressSnapshot> {
    if let Some(remote) = remote {
        match remote.fetch_progress() {
            Ok(snapshot) => {
                if mirror {
                    write_local(store, &snapshot)?;
                }
                return Ok(snapshot);
            }
            Err(e) => warn!("Failed to load progress from server, using local copy: {}", e),
        }
    }
    read_local(store)
}

fn read_local(store: &LocalStore) -> Result<ProgressSnapshot> {
    Ok(ProgressSnapshot {
        completed_topics: store.get_json(keys::COMPLETED_TOPICS)?.unwrap_or_default(),
        bookmarked_topics: store.get_json(keys::BOOKMARKED_TOPICS)?.unwrap_or_default(),
        notes: store.get_json(keys::TOPIC_NOTES)?.unwrap_or_default(),
    })
}

fn write_local(store: &LocalStore, snapshot: &ProgressSnapshot) -> Result<()> {
    store.set_json(keys::COMPLETED_TOPICS, &snapshot.completed_topics)?;
    store.set_json(keys::BOOKMARKED_TOPICS, &snapshot.bookmarked_topics)?;
    store.set_json(keys::TOPIC_NOTES, &snapshot.notes)
}
