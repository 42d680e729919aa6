//! End-to-end scenarios driven through the public registry/dispatch API against an
//! in-memory test double for the external event bus.

use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::sync::Arc;
use toucan_snapshot::dispatch::{EventBus, IncomingBatch};
use toucan_snapshot::error::SnapshotError;
use toucan_snapshot::record::{EventKind, EventRecord, OrderRecord, Side};
use toucan_snapshot::registry::SnapshotRegistry;
use toucan_snapshot::snapshot::EventFlags;
use toucan_snapshot::view::SnapshotView;
use toucan_snapshot::SnapshotListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TestSubscription(u32);

type Callback = Arc<dyn Fn(IncomingBatch) + Send + Sync>;

#[derive(Default)]
struct TestBusInner {
    callback: Mutex<Option<Callback>>,
}

/// Cheaply cloned handle onto a shared callback slot: one clone is moved into the
/// registry at construction, the other stays with the test so it can push batches
/// the way a real transport thread would invoke the installed subscription.
#[derive(Clone, Default)]
struct TestBus(Arc<TestBusInner>);

impl EventBus for TestBus {
    type Subscription = TestSubscription;

    fn event_type_of(&self, subscription: &Self::Subscription) -> u32 {
        subscription.0
    }

    fn subscribe(
        &self,
        _subscription: Self::Subscription,
        on_batch: Callback,
    ) -> Result<(), SnapshotError> {
        *self.0.callback.lock() = Some(on_batch);
        Ok(())
    }
}

impl TestBus {
    fn push(&self, batch: IncomingBatch) {
        let callback = self.0.callback.lock().clone().expect("subscribed");
        callback(batch);
    }
}

struct RecordingListener {
    calls: Mutex<Vec<(bool, Vec<i64>)>>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(bool, Vec<i64>)> {
        self.calls.lock().clone()
    }
}

impl SnapshotListener for RecordingListener {
    fn on_snapshot(&self, view: &SnapshotView<'_>) {
        let indices = view
            .records
            .iter()
            .map(|r| match r {
                EventRecord::Order(o) => o.index,
                _ => unreachable!(),
            })
            .collect();
        self.calls.lock().push((view.is_new_snapshot, indices));
    }
}

fn order(index: i64, removed: bool) -> EventRecord {
    EventRecord::Order(OrderRecord {
        index,
        price: dec!(100),
        size: dec!(1),
        side: Side::Buy,
        removed,
    })
}

fn batch(flags: EventFlags, records: Vec<EventRecord>) -> IncomingBatch {
    IncomingBatch {
        event_type: 1,
        symbol: "IBM".into(),
        flags,
        records,
    }
}

#[test]
fn order_book_build_up_and_transactional_update() {
    let bus = TestBus::default();
    let registry = SnapshotRegistry::new(bus.clone());
    let handle = registry
        .create(
            TestSubscription(1),
            EventKind::Order,
            7,
            "IBM",
            Some("NTV"),
        )
        .unwrap();

    let listener = RecordingListener::new();
    registry.add_listener(handle, listener.clone()).unwrap();
    assert_eq!(
        registry.subscription_of(handle).unwrap(),
        TestSubscription(1)
    );

    bus.push(batch(
        EventFlags::SNAPSHOT_BEGIN,
        vec![order(3, false), order(1, false)],
    ));
    bus.push(batch(EventFlags::NONE, vec![order(2, false)]));
    bus.push(batch(EventFlags::SNAPSHOT_END, vec![]));

    assert_eq!(listener.calls(), vec![(true, vec![1, 2, 3])]);

    bus.push(batch(EventFlags::TX_PENDING, vec![order(2, true)]));
    assert_eq!(listener.calls().len(), 1, "TX_PENDING must not dispatch");

    bus.push(batch(EventFlags::NONE, vec![order(4, false)]));
    assert_eq!(
        listener.calls(),
        vec![(true, vec![1, 2, 3]), (false, vec![1, 3, 4])]
    );
}

#[test]
fn resync_after_full_restarts_records() {
    let bus = TestBus::default();
    let registry = SnapshotRegistry::new(bus.clone());
    let handle = registry
        .create(TestSubscription(1), EventKind::Order, 7, "IBM", Some("NTV"))
        .unwrap();
    let listener = RecordingListener::new();
    registry.add_listener(handle, listener.clone()).unwrap();

    bus.push(batch(
        EventFlags::SNAPSHOT_BEGIN,
        vec![order(3, false), order(1, false)],
    ));
    bus.push(batch(EventFlags::SNAPSHOT_END, vec![]));

    bus.push(batch(EventFlags::SNAPSHOT_BEGIN, vec![order(10, false)]));
    bus.push(batch(EventFlags::SNAPSHOT_END, vec![]));

    assert_eq!(listener.calls().last(), Some(&(true, vec![10])));
}

#[test]
fn duplicate_create_is_rejected() {
    let registry = SnapshotRegistry::new(TestBus::default());
    registry
        .create(TestSubscription(1), EventKind::Order, 7, "IBM", Some("NTV"))
        .unwrap();

    let second = registry.create(TestSubscription(1), EventKind::Order, 7, "IBM", Some("NTV"));
    assert!(matches!(second, Err(SnapshotError::AlreadyExists(_))));
}

#[test]
fn listener_idempotence_dispatches_once() {
    let bus = TestBus::default();
    let registry = SnapshotRegistry::new(bus.clone());
    let handle = registry
        .create(TestSubscription(1), EventKind::Order, 7, "IBM", Some("NTV"))
        .unwrap();
    let listener = RecordingListener::new();
    registry.add_listener(handle, listener.clone()).unwrap();
    registry.add_listener(handle, listener.clone()).unwrap();

    bus.push(batch(EventFlags::SNAPSHOT_BEGIN, vec![order(1, false)]));
    bus.push(batch(EventFlags::SNAPSHOT_END, vec![]));

    assert_eq!(listener.calls().len(), 1);
}

#[test]
fn close_then_add_listener_returns_invalid_handle() {
    let registry = SnapshotRegistry::new(TestBus::default());
    let handle = registry
        .create(TestSubscription(1), EventKind::Order, 7, "IBM", Some("NTV"))
        .unwrap();
    registry.close(handle).unwrap();

    let listener = RecordingListener::new();
    let result = registry.add_listener(handle, listener);
    assert!(matches!(result, Err(SnapshotError::InvalidHandle)));
}

#[test]
fn empty_event_type_subscription_is_rejected() {
    let registry = SnapshotRegistry::new(TestBus::default());
    let result = registry.create(TestSubscription(0), EventKind::Order, 7, "IBM", Some("NTV"));
    assert!(matches!(result, Err(SnapshotError::InvalidSubscription)));
}
