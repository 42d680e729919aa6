//! Snapshot assembly for normalised market-data event streams.
//!
//! A client subscribes to a raw event bus (trades, quotes, orders, ...) and this
//! crate turns the arriving batches — tagged with stream markers such as
//! `SNAPSHOT_BEGIN`/`SNAPSHOT_END`/`TX_PENDING` — into a consistent, ordered,
//! deduplicated record buffer per `(record kind, symbol, source)`, dispatched to
//! registered listeners each time it changes.
//!
//! ```text
//! EventBus -> EventDispatch -> SnapshotRegistry -> Snapshot (state machine) -> ListenerSet
//! ```
//!
//! Everything above a single connection's registry is guarded by one
//! [`parking_lot::Mutex`]; see [`registry::SnapshotRegistry`] for the concurrency
//! contract.

pub mod dispatch;
pub mod error;
pub mod key;
pub mod listener;
pub mod record;
pub mod registry;
pub mod snapshot;
pub mod view;

pub use dispatch::{EventBus, IncomingBatch};
pub use error::SnapshotError;
pub use key::SnapshotKey;
pub use listener::{ListenerSet, SnapshotListener};
pub use record::{EventKind, EventRecord};
pub use registry::{SnapshotHandle, SnapshotRegistry};
pub use snapshot::{EventFlags, Snapshot, SnapshotStatus};
pub use view::SnapshotView;
