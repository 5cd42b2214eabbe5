//! In-memory backing stores for the voice-agent tool catalogue: alarms,
//! reminders, notes, and calendar events. Each store is a thin
//! `RwLock<HashMap<...>>` wrapper, matching the shape `manager.rs`'s
//! `ProcessManager` already uses for shared mutable state in this crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Alarm {
    pub id: String,
    pub label: String,
    pub time: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub id: String,
    pub text: String,
    pub due: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub when: String,
    pub created_at: DateTime<Utc>,
}

/// A generic keyed record store shared by the alarm/reminder/note/calendar
/// tools. Each method returns owned clones — callers never hold the lock
/// across an `.await`.
#[derive(Default)]
pub struct RecordStore<T: Clone> {
    records: RwLock<HashMap<String, T>>,
}

impl<T: Clone> RecordStore<T> {
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, id: impl Into<String>, record: T) {
        self.records.write().insert(id.into(), record);
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.records.write().remove(id)
    }

    pub fn list(&self) -> Vec<T> {
        self.records.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.records.read().get(id).cloned()
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// All catalogue-backing stores, bundled so the tool catalogue can share a
/// single `Arc<ToolStores>`.
#[derive(Default)]
pub struct ToolStores {
    pub alarms: RecordStore<Alarm>,
    pub reminders: RecordStore<Reminder>,
    pub notes: RecordStore<Note>,
    pub calendar: RecordStore<CalendarEvent>,
}

impl ToolStores {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_list_remove_roundtrip() {
        let store: RecordStore<Alarm> = RecordStore::new();
        let id = new_id();
        store.insert(
            id.clone(),
            Alarm { id: id.clone(), label: "wake up".into(), time: "07:00".into(), created_at: Utc::now() },
        );
        assert_eq!(store.list().len(), 1);
        assert!(store.get(&id).is_some());
        assert!(store.remove(&id).is_some());
        assert!(store.list().is_empty());
    }
}
