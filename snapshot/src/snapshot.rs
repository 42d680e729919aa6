//! The per-snapshot state machine, embedded directly as a field of [`Snapshot`]
//! rather than split into a sibling type, since every transition needs simultaneous
//! access to `status`, `records`, and the pending delta.

use crate::error::SnapshotError;
use crate::key::SnapshotKey;
use crate::listener::ListenerSet;
use crate::record::EventRecord;
use smol_str::SmolStr;
use std::cmp::Ordering;

/// Stream marker bits carried by every absorbed event batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const NONE: Self = Self(0);
    pub const SNAPSHOT_BEGIN: Self = Self(0b0001);
    pub const SNAPSHOT_END: Self = Self(0b0010);
    pub const TX_PENDING: Self = Self(0b0100);
    pub const REMOVE_EVENT: Self = Self(0b1000);

    pub const fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for EventFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// `Unknown | Begin | Full | Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    Unknown,
    Begin,
    Full,
    Pending,
}

/// A single `(record-kind, symbol, source)` snapshot: ordered records, listeners, and
/// the state machine driving both. Created by [`crate::registry::SnapshotRegistry::create`],
/// destroyed by [`crate::registry::SnapshotRegistry::close`].
pub struct Snapshot<Sub> {
    pub(crate) id: u64,
    pub(crate) key: SnapshotKey,
    pub(crate) record_id: u16,
    pub(crate) event_kind: crate::record::EventKind,
    pub(crate) event_type_mask: u32,
    pub(crate) symbol: SmolStr,
    pub(crate) source: Option<SmolStr>,
    pub(crate) status: SnapshotStatus,
    pub(crate) records: Vec<EventRecord>,
    pending: Vec<EventRecord>,
    pub(crate) listeners: ListenerSet,
    pub(crate) subscription: Sub,
}

impl<Sub> Snapshot<Sub> {
    pub(crate) fn new(
        id: u64,
        key: SnapshotKey,
        record_id: u16,
        event_kind: crate::record::EventKind,
        event_type_mask: u32,
        symbol: SmolStr,
        source: Option<SmolStr>,
        subscription: Sub,
    ) -> Self {
        Self {
            id,
            key,
            record_id,
            event_kind,
            event_type_mask,
            symbol,
            source,
            status: SnapshotStatus::Unknown,
            records: Vec::new(),
            pending: Vec::new(),
            listeners: ListenerSet::new(),
            subscription,
        }
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Absorb one event batch, driving the state machine. Returns
    /// `Some(is_new_snapshot)` when the caller should dispatch to listeners, `None`
    /// otherwise.
    ///
    /// An allocation failure anywhere in this call resets the snapshot to `Unknown`
    /// and clears its buffer rather than propagating — no retries are issued, and the
    /// next `SNAPSHOT_BEGIN` resynchronizes.
    pub fn absorb(&mut self, flags: EventFlags, data: &[EventRecord]) -> Option<bool> {
        match self.try_absorb(flags, data) {
            Ok(dispatch) => dispatch,
            Err(SnapshotError::InsufficientMemory) => {
                tracing::info!(
                    symbol = %self.symbol,
                    "snapshot allocation failed during absorb; resetting to Unknown, \
                     next SNAPSHOT_BEGIN will resynchronize"
                );
                self.records.clear();
                self.pending.clear();
                self.status = SnapshotStatus::Unknown;
                None
            }
            Err(_) => None,
        }
    }

    fn try_absorb(
        &mut self,
        flags: EventFlags,
        data: &[EventRecord],
    ) -> Result<Option<bool>, SnapshotError> {
        if flags.contains(EventFlags::SNAPSHOT_BEGIN) {
            self.records.clear();
            self.pending.clear();
            self.status = SnapshotStatus::Begin;
            self.append_owned(data)?;

            return if flags.contains(EventFlags::SNAPSHOT_END) {
                self.finish_begin()
            } else {
                Ok(None)
            };
        }

        match self.status {
            SnapshotStatus::Unknown => {
                // Nothing has anchored the buffer yet; discard silently and wait for
                // the next SNAPSHOT_BEGIN to resynchronize.
                Ok(None)
            }
            SnapshotStatus::Begin => {
                self.append_owned(data)?;
                if flags.contains(EventFlags::SNAPSHOT_END) {
                    self.finish_begin()
                } else {
                    Ok(None)
                }
            }
            SnapshotStatus::Full => {
                if flags.contains(EventFlags::TX_PENDING) {
                    self.status = SnapshotStatus::Pending;
                    self.buffer_pending(data)?;
                    Ok(None)
                } else {
                    self.apply_ops_in_place(data)?;
                    Ok(Some(false))
                }
            }
            SnapshotStatus::Pending => {
                if flags.contains(EventFlags::TX_PENDING) {
                    self.buffer_pending(data)?;
                    Ok(None)
                } else {
                    self.buffer_pending(data)?;
                    let ops = std::mem::take(&mut self.pending);
                    self.apply_ops_in_place(&ops)?;
                    self.status = SnapshotStatus::Full;
                    Ok(Some(false))
                }
            }
        }
    }

    fn append_owned(&mut self, data: &[EventRecord]) -> Result<(), SnapshotError> {
        for record in data {
            self.records.push(record.try_clone()?);
        }
        Ok(())
    }

    fn buffer_pending(&mut self, data: &[EventRecord]) -> Result<(), SnapshotError> {
        for record in data {
            self.pending.push(record.try_clone()?);
        }
        Ok(())
    }

    /// `SNAPSHOT_END` in `Begin`: sort + dedup by canonical key (last writer wins),
    /// drop removal-flagged records, transition to `Full`.
    fn finish_begin(&mut self) -> Result<Option<bool>, SnapshotError> {
        self.records.sort_by(EventRecord::canonical_cmp);
        dedup_keep_last(&mut self.records);
        self.records.retain(|record| !record.is_removal());
        self.status = SnapshotStatus::Full;
        Ok(Some(true))
    }

    /// Insert-or-replace-by-canonical-key, remove on removal flag — used both for a
    /// cleared `TX_PENDING` delta and for a plain single-record update batch absorbed
    /// while `Full`.
    fn apply_ops_in_place(&mut self, ops: &[EventRecord]) -> Result<(), SnapshotError> {
        for op in ops {
            let owned = op.try_clone()?;
            let position = self
                .records
                .binary_search_by(|probe| probe.canonical_cmp(&owned));

            if owned.is_removal() {
                if let Ok(index) = position {
                    self.records.remove(index);
                }
            } else {
                match position {
                    Ok(index) => self.records[index] = owned,
                    Err(index) => self.records.insert(index, owned),
                }
            }
        }
        Ok(())
    }
}

/// Keep the last of each run of canonical-key duplicates in a sorted, stable-ordered
/// buffer: reverse, `dedup_by` (which keeps the first of each run), reverse back.
fn dedup_keep_last(records: &mut Vec<EventRecord>) {
    records.reverse();
    records.dedup_by(|a, b| a.canonical_cmp(b) == Ordering::Equal);
    records.reverse();
}
