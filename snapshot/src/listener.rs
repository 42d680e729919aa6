//! `ListenerSet`: an ordered, deterministic set of snapshot listeners.

use crate::view::SnapshotView;
use std::sync::Arc;

/// A registered snapshot listener.
///
/// C-style event APIs model a listener as a `(callback: fn pointer, user_data: *mut
/// c_void)` pair, comparable and orderable by the function pointer's address. The
/// idiomatic Rust replacement used here folds `user_data` into whatever state a
/// `SnapshotListener` implementation closes over, and uses the `Arc`'s address for
/// identity and ordering instead of a raw function pointer (see DESIGN.md OQ-2).
pub trait SnapshotListener: Send + Sync {
    fn on_snapshot(&self, view: &SnapshotView<'_>);
}

const MIN_CAPACITY: usize = 4;

/// Ordered by listener identity; ordering is implementation-defined but deterministic,
/// so iteration order is stable across dispatches.
#[derive(Default)]
pub struct ListenerSet {
    entries: Vec<Arc<dyn SnapshotListener>>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.entries.len())
            .finish()
    }
}

fn identity(listener: &Arc<dyn SnapshotListener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MIN_CAPACITY),
        }
    }

    /// Idempotent: inserting an already-present listener is a no-op, and always
    /// succeeds — mirroring `dx_add_snapshot_listener`, which reports success
    /// whether the listener was newly added or already present.
    pub fn insert(&mut self, listener: Arc<dyn SnapshotListener>) {
        let id = identity(&listener);
        if let Err(pos) = self.entries.binary_search_by_key(&id, identity) {
            self.grow_if_needed();
            self.entries.insert(pos, listener);
        }
    }

    /// Idempotent: removing an absent listener is not an error, mirroring dxFeed's
    /// `dx_remove_snapshot_listener`.
    pub fn remove(&mut self, listener: &Arc<dyn SnapshotListener>) {
        let id = identity(listener);
        if let Ok(pos) = self.entries.binary_search_by_key(&id, identity) {
            self.entries.remove(pos);
            self.shrink_if_needed();
        }
    }

    /// Snapshot-safe iteration under whatever external lock the caller already holds.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SnapshotListener>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Double when full (the halving growth policy applied symmetrically by
    /// `shrink_if_needed`).
    fn grow_if_needed(&mut self) {
        if self.entries.len() == self.entries.capacity() {
            let new_capacity = (self.entries.capacity() * 2).max(MIN_CAPACITY);
            self.entries.reserve_exact(new_capacity - self.entries.capacity());
        }
    }

    /// Halve when quarter-full, floored at `MIN_CAPACITY`.
    fn shrink_if_needed(&mut self) {
        let capacity = self.entries.capacity();
        if capacity > MIN_CAPACITY && self.entries.len() <= capacity / 4 {
            let new_capacity = (capacity / 2).max(MIN_CAPACITY);
            self.entries.shrink_to(new_capacity);
        }
    }
}
