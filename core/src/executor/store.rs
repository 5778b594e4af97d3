use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use super::events::MissionEvent;
use super::types::{TaskId, TaskResult, TaskStatus};

const EVENT_CAPACITY: usize = 1024;

/// Live result collection of one mission.
///
/// The key set is fixed at launch, so the map itself is never written after
/// construction. Each entry has its own lock: writers to different ids never
/// contend, and every mutation goes through [`ResultStore::update`].
pub struct ResultStore {
    entries: HashMap<TaskId, Mutex<TaskResult>>,
    events: broadcast::Sender<MissionEvent>,
}

impl ResultStore {
    pub fn new(ids: impl IntoIterator<Item = TaskId>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let entries = ids
            .into_iter()
            .map(|id| (id, Mutex::new(TaskResult::pending(id))))
            .collect();
        Self { entries, events }
    }

    fn lock(entry: &Mutex<TaskResult>) -> MutexGuard<'_, TaskResult> {
        match entry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Atomic read-modify-write of one entry. `None` if the id is unknown.
    pub fn update<R>(&self, id: TaskId, f: impl FnOnce(&mut TaskResult) -> R) -> Option<R> {
        let entry = self.entries.get(&id)?;
        let mut guard = Self::lock(entry);
        Some(f(&mut guard))
    }

    pub fn get(&self, id: TaskId) -> Option<TaskResult> {
        self.entries.get(&id).map(|e| Self::lock(e).clone())
    }

    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.entries.get(&id).map(|e| Self::lock(e).status)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids currently in `status`, ascending.
    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .entries
            .iter()
            .filter(|(_, e)| Self::lock(e).status == status)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Consistent-per-entry copy of every result, sorted by id.
    pub fn snapshot(&self) -> Vec<TaskResult> {
        let mut out: Vec<TaskResult> = self.entries.values().map(|e| Self::lock(e).clone()).collect();
        out.sort_by_key(|r| r.id);
        out
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MissionEvent> {
        self.events.subscribe()
    }

    /// Fire-and-forget; having no subscribers is fine.
    pub fn publish(&self, event: MissionEvent) {
        let _ = self.events.send(event);
    }
}
