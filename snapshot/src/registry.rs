//! `SnapshotRegistry`: the single mutex-guarded collection of live snapshots for
//! one connection, plus the handle-based public API over it.

use crate::dispatch::{EventBus, EventDispatch, IncomingBatch};
use crate::error::SnapshotError;
use crate::key::SnapshotKey;
use crate::listener::SnapshotListener;
use crate::record::EventKind;
use crate::snapshot::Snapshot;
use crate::view::SnapshotView;
use fnv::FnvHashSet;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::sync::Arc;

/// Opaque handle to a live [`Snapshot`] (see DESIGN.md OQ-3): an id issued by a
/// per-registry counter, never reused within a process, plus the snapshot's own
/// [`SnapshotKey`] so the registry can binary-search its key-sorted array straight
/// to the snapshot's position instead of scanning for the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotHandle {
    id: u64,
    key: SnapshotKey,
}

struct RegistryInner<Sub> {
    /// Kept sorted by `key` at all times; every insert and removal preserves the
    /// order so lookups can binary-search instead of scanning.
    snapshots: Vec<Box<Snapshot<Sub>>>,
    next_id: u64,
    installed_subscriptions: FnvHashSet<Sub>,
    in_callback: bool,
}

impl<Sub> RegistryInner<Sub> {
    /// Binary-search to `handle.key`'s position, then confirm `id` still matches —
    /// guards against a stale handle whose key slot was freed by `close` and later
    /// reused by a new `create`.
    fn position_of(&self, handle: SnapshotHandle) -> Result<usize, SnapshotError> {
        let position = self
            .snapshots
            .binary_search_by(|s| s.key.cmp(&handle.key))
            .map_err(|_| SnapshotError::InvalidHandle)?;
        if self.snapshots[position].id == handle.id {
            Ok(position)
        } else {
            Err(SnapshotError::InvalidHandle)
        }
    }

    fn find_mut(&mut self, handle: SnapshotHandle) -> Result<&mut Snapshot<Sub>, SnapshotError> {
        let position = self.position_of(handle)?;
        Ok(self.snapshots[position].as_mut())
    }
}

/// One connection's worth of live snapshots, guarded by a single non-reentrant
/// mutex. `add_listener`/`remove_listener`/`close` may be called from within a
/// listener callback only via a fresh call into the registry after the callback
/// returns — see the `in_callback` debug assertion below.
pub struct SnapshotRegistry<B: EventBus> {
    bus: B,
    inner: Mutex<RegistryInner<B::Subscription>>,
}

impl<B: EventBus> SnapshotRegistry<B> {
    pub fn new(bus: B) -> Arc<Self> {
        Arc::new(Self {
            bus,
            inner: Mutex::new(RegistryInner {
                snapshots: Vec::new(),
                next_id: 1,
                installed_subscriptions: FnvHashSet::default(),
                in_callback: false,
            }),
        })
    }

    /// Create a new snapshot for `(record_id, symbol, source)`, installing a bus
    /// subscription the first time this `subscription` value is seen. Fails with
    /// [`SnapshotError::AlreadyExists`] if the triple is already registered, or
    /// [`SnapshotError::EmptySymbol`] if `symbol` is empty.
    pub fn create(
        self: &Arc<Self>,
        subscription: B::Subscription,
        event_kind: EventKind,
        record_id: u16,
        symbol: impl Into<SmolStr>,
        source: Option<impl Into<SmolStr>>,
    ) -> Result<SnapshotHandle, SnapshotError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(SnapshotError::EmptySymbol);
        }
        let source = source.map(Into::into);
        let key = SnapshotKey::new(record_id, &symbol, source.as_deref());

        let event_type = self.bus.event_type_of(&subscription);
        if event_type == 0 {
            return Err(SnapshotError::InvalidSubscription);
        }

        let mut inner = self.inner.lock();
        let position = match inner.snapshots.binary_search_by(|s| s.key.cmp(&key)) {
            Ok(_) => return Err(SnapshotError::AlreadyExists(key)),
            Err(position) => position,
        };

        let id = inner.next_id;
        inner.next_id += 1;
        let snapshot = Snapshot::new(
            id,
            key,
            record_id,
            event_kind,
            event_type,
            symbol.clone(),
            source,
            subscription.clone(),
        );
        inner.snapshots.insert(position, Box::new(snapshot));

        if !inner.installed_subscriptions.contains(&subscription) {
            let dispatch = EventDispatch::new(self);
            self.bus
                .subscribe(subscription.clone(), Arc::new(move |batch| dispatch.on_batch(batch)))?;
            inner.installed_subscriptions.insert(subscription);
        }

        tracing::debug!(handle = id, %symbol, record_id, "snapshot created");
        Ok(SnapshotHandle { id, key })
    }

    /// Remove a snapshot from the registry; its listeners are dropped with it.
    /// Closing an already-closed or unknown handle is an error, not a no-op —
    /// unlike listener `insert`/`remove`, which are idempotent by design.
    pub fn close(&self, handle: SnapshotHandle) -> Result<(), SnapshotError> {
        let mut inner = self.inner.lock();
        let position = inner.position_of(handle)?;
        inner.snapshots.remove(position);
        Ok(())
    }

    pub fn add_listener(
        &self,
        handle: SnapshotHandle,
        listener: Arc<dyn SnapshotListener>,
    ) -> Result<(), SnapshotError> {
        let mut inner = self.inner.lock();
        debug_assert!(
            !inner.in_callback,
            "add_listener called while a dispatch callback holds the registry lock"
        );
        inner.find_mut(handle)?.listeners.insert(listener);
        Ok(())
    }

    pub fn remove_listener(
        &self,
        handle: SnapshotHandle,
        listener: &Arc<dyn SnapshotListener>,
    ) -> Result<(), SnapshotError> {
        let mut inner = self.inner.lock();
        debug_assert!(
            !inner.in_callback,
            "remove_listener called while a dispatch callback holds the registry lock"
        );
        inner.find_mut(handle)?.listeners.remove(listener);
        Ok(())
    }

    /// The subscription value `handle` was created with, letting a caller
    /// re-derive what a snapshot is listening for without threading it through
    /// separately.
    pub fn subscription_of(&self, handle: SnapshotHandle) -> Result<B::Subscription, SnapshotError> {
        let mut inner = self.inner.lock();
        Ok(inner.find_mut(handle)?.subscription.clone())
    }

    /// Entry point for an [`EventBus`]'s callback: absorb one batch into every
    /// matching snapshot and dispatch to listeners for each one that produced a new
    /// view.
    pub(crate) fn absorb_batch(&self, batch: IncomingBatch) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.in_callback {
            tracing::warn!("event bus re-entered the registry mid-dispatch; batch dropped");
            return;
        }

        for snapshot in inner.snapshots.iter_mut() {
            if snapshot.event_type_mask & batch.event_type == 0 {
                continue;
            }
            if snapshot.symbol.as_str() != batch.symbol.as_str() {
                continue;
            }

            let Some(is_new_snapshot) = snapshot.absorb(batch.flags, &batch.records) else {
                continue;
            };
            if snapshot.listeners.is_empty() {
                continue;
            }

            let view = SnapshotView {
                record_id: snapshot.record_id,
                event_kind: snapshot.event_kind,
                event_type: snapshot.event_type_mask,
                symbol: snapshot.symbol.as_str(),
                records: &snapshot.records,
                is_new_snapshot,
            };

            inner.in_callback = true;
            for listener in snapshot.listeners.iter() {
                listener.on_snapshot(&view);
            }
            inner.in_callback = false;
        }
    }
}
