//! `EventDispatch`: the sole consumer of an external event bus, routing each
//! incoming batch to every snapshot whose `(event_type_mask, symbol)` matches,
//! driving its state machine, and dispatching to listeners under the registry guard.

use crate::error::SnapshotError;
use crate::record::EventRecord;
use crate::registry::SnapshotRegistry;
use crate::snapshot::EventFlags;
use smol_str::SmolStr;
use std::sync::{Arc, Weak};

/// One decoded batch of events for a single symbol, as handed to the registry by a
/// transport/decoder the core does not know about.
#[derive(Debug, Clone, derive_more::Constructor)]
pub struct IncomingBatch {
    pub event_type: u32,
    pub symbol: SmolStr,
    pub flags: EventFlags,
    pub records: Vec<EventRecord>,
}

/// The subscription/transport seam. A real integration drives events in over
/// whatever medium it uses (a socket, a channel, a replayed log) and calls back into
/// [`EventDispatch::on_batch`] — this crate owns no transport of its own.
pub trait EventBus: Send + Sync + 'static {
    /// Opaque subscription description a concrete bus understands (e.g. an exchange
    /// + record kinds + symbol list). Must be comparable so the registry can avoid
    /// installing the same subscription twice.
    type Subscription: Clone + Eq + std::hash::Hash + Send + Sync + std::fmt::Debug;

    /// The `event_type` bit this subscription's batches will carry.
    fn event_type_of(&self, subscription: &Self::Subscription) -> u32;

    /// Install a callback invoked once per [`IncomingBatch`] the bus receives for
    /// `subscription`. Called at most once per distinct subscription value.
    fn subscribe(
        &self,
        subscription: Self::Subscription,
        on_batch: Arc<dyn Fn(IncomingBatch) + Send + Sync>,
    ) -> Result<(), SnapshotError>;
}

/// Bound to a single [`SnapshotRegistry`] via a weak reference, so an [`EventBus`]
/// holding the dispatch callback does not keep the registry alive past its owner's
/// drop — registry lifetime follows the connection it's scoped to.
pub(crate) struct EventDispatch<B: EventBus> {
    registry: Weak<SnapshotRegistry<B>>,
}

impl<B: EventBus> EventDispatch<B> {
    pub(crate) fn new(registry: &Arc<SnapshotRegistry<B>>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
        }
    }

    /// A linear scan over every live snapshot, dispatching the batch to each one
    /// whose event-type mask and symbol match, under a single held lock.
    pub(crate) fn on_batch(&self, batch: IncomingBatch) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        registry.absorb_batch(batch);
    }
}
