//! Correlation-id allocation and the table of requests awaiting a response.

use std::collections::HashMap;

use super::Continuation;

/// Outstanding requests keyed by correlation id.
///
/// Ids are allocated from a counter that starts at 1, wraps from
/// [`i32::MAX`] back to 1 and skips ids that are still pending. Id 0 is never
/// handed out; the service uses it for messages that answer no request.
pub(super) struct PendingTable {
    next_id: i32,
    entries: HashMap<i32, Continuation>,
}

impl PendingTable {
    pub(super) fn new() -> Self {
        Self::starting_at(1)
    }

    pub(super) fn starting_at(next_id: i32) -> Self {
        Self {
            next_id: next_id.max(1),
            entries: HashMap::new(),
        }
    }

    /// Registers `continuation` under a fresh id and returns the id.
    pub(super) fn register(&mut self, continuation: Continuation) -> i32 {
        let id = self.allocate();
        self.entries.insert(id, continuation);
        id
    }

    pub(super) fn take(&mut self, id: i32) -> Option<Continuation> {
        self.entries.remove(&id)
    }

    /// Removes every entry, in no particular order.
    pub(super) fn drain(&mut self) -> Vec<Continuation> {
        self.entries.drain().map(|(_, continuation)| continuation).collect()
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    fn allocate(&mut self) -> i32 {
        loop {
            let id = self.next_id;
            self.next_id = if id == i32::MAX { 1 } else { id + 1 };
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }
}
