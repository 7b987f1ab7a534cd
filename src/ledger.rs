// File: src/ledger.rs
//! Append-only record of user reactions. Events are never edited or removed;
//! the ranking side only reads windows of them.

use crate::config::LedgerSettings;
use crate::core::types::{FeedbackEvent, RecipeId};
use crate::error::PersistenceError;
use crate::persistence::{append_json_line, read_json_lines};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct FeedbackLedger {
    events: RwLock<Vec<FeedbackEvent>>,
    path: Option<PathBuf>,
}

impl FeedbackLedger {
    pub fn in_memory() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Opens the JSON-lines ledger named in `settings`. Lines that fail to
    /// decode are skipped; an unreadable file yields an empty ledger.
    pub fn open(settings: &LedgerSettings) -> Self {
        let Some(path) = settings.path.clone() else {
            return Self::in_memory();
        };

        let mut events = match read_json_lines::<FeedbackEvent>(&path) {
            Ok((events, skipped)) => {
                if skipped > 0 {
                    warn!(path = %path.display(), skipped, "skipped undecodable ledger lines");
                }
                events
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ledger unreadable, starting empty");
                Vec::new()
            }
        };
        events.sort_by_key(|event| event.timestamp);
        info!(path = %path.display(), events = events.len(), "feedback ledger opened");

        Self {
            events: RwLock::new(events),
            path: Some(path),
        }
    }

    /// Appends `event`, keeping the ledger ordered by timestamp. The event is
    /// kept in memory even when the durable write fails.
    pub fn append(&self, event: FeedbackEvent) -> Result<(), PersistenceError> {
        let written = match &self.path {
            Some(path) => append_json_line(&event, path),
            None => Ok(()),
        };

        let mut events = self.events.write();
        let at = events.partition_point(|existing| existing.timestamp <= event.timestamp);
        events.insert(at, event);
        written
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every event, oldest first.
    pub fn events(&self) -> Vec<FeedbackEvent> {
        self.events.read().clone()
    }

    /// The most recent `n` events, oldest first.
    pub fn recent_window(&self, n: usize) -> Vec<FeedbackEvent> {
        let events = self.events.read();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// The most recent `n` events together with the ledger length they were
    /// taken at, read under one lock.
    pub fn training_window(&self, n: usize) -> (Vec<FeedbackEvent>, usize) {
        let events = self.events.read();
        let start = events.len().saturating_sub(n);
        (events[start..].to_vec(), events.len())
    }

    pub fn recipe_ids(&self) -> HashSet<RecipeId> {
        self.events.read().iter().map(|event| event.recipe_id).collect()
    }
}
