/// Coalescing buffer of progress updates waiting for the durable store
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::ProgressRecord;

/// (user_id, content_id)
pub type PairKey = (String, String);

/// Latest un-flushed progress per (user, content). A newer update for a pair
/// replaces the older one; draining swaps the whole map out in one step.
#[derive(Default)]
pub struct PendingUpdates {
    inner: Mutex<HashMap<PairKey, ProgressRecord>>,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ProgressRecord) {
        let key = (record.user_id.clone(), record.content_id.clone());
        self.inner.lock().insert(key, record);
    }

    /// Take one pair out, if pending
    pub fn take(&self, user_id: &str, content_id: &str) -> Option<ProgressRecord> {
        self.inner
            .lock()
            .remove(&(user_id.to_string(), content_id.to_string()))
    }

    /// Everything pending, leaving the buffer empty
    pub fn drain(&self) -> HashMap<PairKey, ProgressRecord> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Put a failed entry back unless a newer update already took its place.
    /// Returns whether it was re-queued.
    pub fn requeue_if_absent(&self, record: ProgressRecord) -> bool {
        let key = (record.user_id.clone(), record.content_id.clone());
        let mut inner = self.inner.lock();
        if inner.contains_key(&key) {
            return false;
        }
        inner.insert(key, record);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
