use crate::key::SnapshotKey;
use smol_str::SmolStr;

/// All [`Error`](std::error::Error)s generated by the snapshot assembly engine.
///
/// Losing protocol state mid-stream is deliberately not a variant here: it is an
/// internal resynchronisation event, logged at `info` level and never surfaced to a
/// caller (see [`crate::snapshot::Snapshot::absorb`]).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    /// Use of a closed, or never-created, [`SnapshotHandle`](crate::registry::SnapshotHandle).
    #[error("invalid or closed snapshot handle")]
    InvalidHandle,

    /// The connection the registry is scoped to is not usable (never initialised, or
    /// already torn down).
    #[error("connection is not initialised")]
    InvalidConnection,

    /// `create` was called with a `(record_id, symbol, source)` triple already present
    /// in the registry.
    #[error("a snapshot for key {0} already exists in this registry")]
    AlreadyExists(SnapshotKey),

    /// The `EventBus` subscription's event-type is zero or otherwise malformed.
    #[error("subscription has an invalid or empty event-type mask")]
    InvalidSubscription,

    /// A `null`/absent listener was supplied to `add_listener`.
    #[error("listener must not be null")]
    InvalidListener,

    /// An allocation failed during a deep-copy or array growth.
    #[error("insufficient memory")]
    InsufficientMemory,

    /// The `symbol` supplied to `create` was empty.
    #[error("symbol must be non-empty")]
    EmptySymbol,

    /// Propagated from an `EventBus::subscribe` failure.
    #[error("event bus subscription failed: {0}")]
    Bus(SmolStr),
}
