//! The non-owning view a [`crate::listener::SnapshotListener`] is invoked with.

use crate::record::{EventKind, EventRecord};

/// Snapshot-safe, non-owning view of a [`crate::snapshot::Snapshot`]'s current buffer,
/// built under the registry guard and passed to every listener on dispatch.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotView<'a> {
    pub record_id: u16,
    pub event_kind: EventKind,
    pub event_type: u32,
    pub symbol: &'a str,
    pub records: &'a [EventRecord],
    pub is_new_snapshot: bool,
}

impl<'a> SnapshotView<'a> {
    pub fn records_count(&self) -> usize {
        self.records.len()
    }
}
