//! Eviction bookkeeping shared by every backend.
//!
//! A [`SessionIndex`] pairs a lookup table with a [`RecencyList`]. Each live
//! session owns exactly one table entry and one list node, and every access
//! moves its node to the front, so the back of the list is always the
//! longest-idle session and a GC sweep can stop at the first live node.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use cookie_sessions_core::{SessionId, StorageError};
use tokio::time::Instant;

use super::recency::{NodeRef, RecencyList};

struct Entry<T> {
    sid: SessionId,
    last_access: Instant,
    generation: u64,
    value: T,
}

/// Lookup table plus recency list.
pub struct SessionIndex<T> {
    table: HashMap<SessionId, NodeRef>,
    list: RecencyList<Entry<T>>,
    next_generation: u64,
}

impl<T: Clone> Default for SessionIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SessionIndex<T> {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            list: RecencyList::new(),
            next_generation: 0,
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.table.len(), self.list.len());
        self.table.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Insert a new session at the front.
    ///
    /// `make` receives the generation assigned to this incarnation of `sid`.
    ///
    /// # Errors
    /// Returns [`StorageError::AlreadyExists`] if `sid` is live.
    pub fn insert_with(
        &mut self,
        sid: &SessionId,
        make: impl FnOnce(u64) -> T,
    ) -> Result<T, StorageError> {
        if self.table.contains_key(sid) {
            return Err(StorageError::AlreadyExists(sid.clone()));
        }
        let generation = self.next_generation;
        self.next_generation += 1;

        let value = make(generation);
        let node = self.list.push_front(Entry {
            sid: sid.clone(),
            last_access: Instant::now(),
            generation,
            value: value.clone(),
        });
        self.table.insert(sid.clone(), node);
        Ok(value)
    }

    /// Look up `sid` and mark it as just accessed.
    pub fn get_and_touch(&mut self, sid: &SessionId) -> Option<T> {
        let node = *self.table.get(sid)?;
        let entry = self.list.get_mut(node)?;
        entry.last_access = entry.last_access.max(Instant::now());
        let value = entry.value.clone();
        self.list.move_to_front(node);
        Some(value)
    }

    /// Mark `sid` as just accessed if it is still the given incarnation.
    ///
    /// Returns `false` when the session was destroyed or reaped (and possibly
    /// re-created) since the caller obtained its handle.
    pub fn touch(&mut self, sid: &SessionId, generation: u64) -> bool {
        let Some(&node) = self.table.get(sid) else {
            return false;
        };
        let Some(entry) = self.list.get_mut(node) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }
        entry.last_access = entry.last_access.max(Instant::now());
        self.list.move_to_front(node);
        true
    }

    /// Remove `sid`, returning its value.
    pub fn remove(&mut self, sid: &SessionId) -> Option<T> {
        let node = self.table.remove(sid)?;
        self.list.remove(node).map(|entry| entry.value)
    }

    /// Remove `sid` only if it is still the given incarnation.
    pub fn remove_generation(&mut self, sid: &SessionId, generation: u64) -> Option<T> {
        let node = *self.table.get(sid)?;
        if self.list.get(node)?.generation != generation {
            return None;
        }
        self.remove(sid)
    }

    /// Remove every session idle for longer than `max_lifetime` at `now`.
    ///
    /// Walks from the back and stops at the first session still within its
    /// lifetime.
    pub fn sweep(&mut self, max_lifetime: Duration, now: Instant) -> Vec<(SessionId, T)> {
        let mut reaped = Vec::new();
        while let Some(node) = self.list.back() {
            let Some(entry) = self.list.get(node) else {
                break;
            };
            let expired = entry
                .last_access
                .checked_add(max_lifetime)
                .is_some_and(|deadline| deadline < now);
            if !expired {
                break;
            }
            if let Some(entry) = self.list.remove(node) {
                self.table.remove(&entry.sid);
                reaped.push((entry.sid, entry.value));
            }
        }
        reaped
    }

    /// Last access time of `sid`.
    #[must_use]
    pub fn last_access(&self, sid: &SessionId) -> Option<Instant> {
        let node = *self.table.get(sid)?;
        self.list.get(node).map(|entry| entry.last_access)
    }

    /// Live session ids, most recently accessed first.
    #[must_use]
    pub fn ids_by_recency(&self) -> Vec<SessionId> {
        self.list.iter().map(|entry| entry.sid.clone()).collect()
    }
}

/// Lock a std mutex, mapping poisoning to a storage error.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Internal(e.to_string()))
}
