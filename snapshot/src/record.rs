//! A closed `EventKind` enum and an `EventRecord` sum type over it, with
//! `clone`/`free`/`compare`/`is_removal` expressed as an exhaustive match instead of
//! a per-kind function-pointer dispatch table.

use crate::error::SnapshotError;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Closed set of event kinds carried by the snapshot protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventKind {
    Trade,
    Quote,
    Summary,
    Profile,
    Order,
    TimeAndSale,
    Candle,
    TradeEth,
    SpreadOrder,
    Greeks,
    Series,
}

/// Side of a two-sided order, used by [`OrderRecord`] and [`SpreadOrderRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

macro_rules! record_struct {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            $(pub $field: $ty,)*
            pub removed: bool,
        }
    };
}

record_struct!(TradeRecord { time: i64, sequence: i32, price: Decimal, size: Decimal });
record_struct!(QuoteRecord { time: i64, sequence: i32, bid_price: Decimal, ask_price: Decimal });
record_struct!(SummaryRecord { time: i64, sequence: i32, open: Decimal, high: Decimal, low: Decimal, close: Decimal });
record_struct!(ProfileRecord { description: String });
record_struct!(OrderRecord { index: i64, price: Decimal, size: Decimal, side: Side });
record_struct!(TimeAndSaleRecord { time: i64, sequence: i32, price: Decimal, size: Decimal });
record_struct!(CandleRecord { time: i64, sequence: i32, open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal });
record_struct!(TradeEthRecord { time: i64, sequence: i32, price: Decimal, size: Decimal });
record_struct!(SpreadOrderRecord { index: i64, price: Decimal, size: Decimal, spread_symbol: String });
record_struct!(GreeksRecord { time: i64, sequence: i32, delta: Decimal, gamma: Decimal, theta: Decimal, vega: Decimal });
record_struct!(SeriesRecord { expiration: i32, sequence: i32, volatility: Decimal });

/// A typed record belonging to exactly one [`EventKind`]; a snapshot's buffer never
/// mixes kinds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EventRecord {
    Trade(TradeRecord),
    Quote(QuoteRecord),
    Summary(SummaryRecord),
    Profile(ProfileRecord),
    Order(OrderRecord),
    TimeAndSale(TimeAndSaleRecord),
    Candle(CandleRecord),
    TradeEth(TradeEthRecord),
    SpreadOrder(SpreadOrderRecord),
    Greeks(GreeksRecord),
    Series(SeriesRecord),
}

impl EventRecord {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::Trade,
            Self::Quote(_) => EventKind::Quote,
            Self::Summary(_) => EventKind::Summary,
            Self::Profile(_) => EventKind::Profile,
            Self::Order(_) => EventKind::Order,
            Self::TimeAndSale(_) => EventKind::TimeAndSale,
            Self::Candle(_) => EventKind::Candle,
            Self::TradeEth(_) => EventKind::TradeEth,
            Self::SpreadOrder(_) => EventKind::SpreadOrder,
            Self::Greeks(_) => EventKind::Greeks,
            Self::Series(_) => EventKind::Series,
        }
    }

    /// Whether this record represents a removal rather than an insert/replace.
    pub fn is_removal(&self) -> bool {
        match self {
            Self::Trade(r) => r.removed,
            Self::Quote(r) => r.removed,
            Self::Summary(r) => r.removed,
            Self::Profile(r) => r.removed,
            Self::Order(r) => r.removed,
            Self::TimeAndSale(r) => r.removed,
            Self::Candle(r) => r.removed,
            Self::TradeEth(r) => r.removed,
            Self::SpreadOrder(r) => r.removed,
            Self::Greeks(r) => r.removed,
            Self::Series(r) => r.removed,
        }
    }

    /// Canonical ordering key comparison. Panics if `self` and `other` are not the
    /// same [`EventKind`] — a single snapshot's buffer never mixes kinds, so callers
    /// never cross this boundary.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Order(a), Self::Order(b)) => a.index.cmp(&b.index),
            (Self::SpreadOrder(a), Self::SpreadOrder(b)) => a.index.cmp(&b.index),
            (Self::Candle(a), Self::Candle(b)) => (a.time, a.sequence).cmp(&(b.time, b.sequence)),
            (Self::TimeAndSale(a), Self::TimeAndSale(b)) => {
                (a.time, a.sequence).cmp(&(b.time, b.sequence))
            }
            (Self::Greeks(a), Self::Greeks(b)) => (a.time, a.sequence).cmp(&(b.time, b.sequence)),
            (Self::Series(a), Self::Series(b)) => {
                (a.expiration, a.sequence).cmp(&(b.expiration, b.sequence))
            }
            // Trade/Quote/Summary/TradeEth are time-series-like; ordered the same way
            // as the Candle/TimeAndSale group since they share the same
            // (time, sequence) shape.
            (Self::Trade(a), Self::Trade(b)) => (a.time, a.sequence).cmp(&(b.time, b.sequence)),
            (Self::Quote(a), Self::Quote(b)) => (a.time, a.sequence).cmp(&(b.time, b.sequence)),
            (Self::Summary(a), Self::Summary(b)) => {
                (a.time, a.sequence).cmp(&(b.time, b.sequence))
            }
            (Self::TradeEth(a), Self::TradeEth(b)) => {
                (a.time, a.sequence).cmp(&(b.time, b.sequence))
            }
            // Profile is a single full-replace record per symbol; there's nothing to
            // order it against within one snapshot.
            (Self::Profile(_), Self::Profile(_)) => Ordering::Equal,
            _ => unreachable!("EventRecord::canonical_cmp called across mismatched EventKinds"),
        }
    }

    /// Fallible deep copy. Owned string fields attempt to reserve their exact
    /// capacity before copying so a genuine allocation failure surfaces as
    /// [`SnapshotError::InsufficientMemory`] instead of aborting the process.
    pub fn try_clone(&self) -> Result<Self, SnapshotError> {
        fn try_clone_string(s: &str) -> Result<String, SnapshotError> {
            let mut out = String::new();
            out.try_reserve_exact(s.len())
                .map_err(|_| SnapshotError::InsufficientMemory)?;
            out.push_str(s);
            Ok(out)
        }

        Ok(match self {
            Self::Profile(r) => Self::Profile(ProfileRecord {
                description: try_clone_string(&r.description)?,
                removed: r.removed,
            }),
            Self::SpreadOrder(r) => Self::SpreadOrder(SpreadOrderRecord {
                spread_symbol: try_clone_string(&r.spread_symbol)?,
                ..r.clone()
            }),
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(index: i64) -> EventRecord {
        EventRecord::Order(OrderRecord {
            index,
            price: dec!(100),
            size: dec!(1),
            side: Side::Buy,
            removed: false,
        })
    }

    #[test]
    fn order_canonical_order_is_by_index() {
        assert_eq!(order(1).canonical_cmp(&order(2)), Ordering::Less);
        assert_eq!(order(2).canonical_cmp(&order(1)), Ordering::Greater);
        assert_eq!(order(1).canonical_cmp(&order(1)), Ordering::Equal);
    }

    #[test]
    fn try_clone_is_a_deep_copy() {
        let original = EventRecord::Profile(ProfileRecord {
            description: "IBM common stock".into(),
            removed: false,
        });
        let cloned = original.try_clone().unwrap();
        assert_eq!(original, cloned);
        if let (EventRecord::Profile(a), EventRecord::Profile(b)) = (&original, &cloned) {
            assert_ne!(a.description.as_ptr(), b.description.as_ptr());
        } else {
            unreachable!()
        }
    }

    #[test]
    fn is_removal_reads_the_per_kind_flag() {
        let mut o = OrderRecord {
            index: 1,
            price: dec!(1),
            size: dec!(1),
            side: Side::Sell,
            removed: true,
        };
        assert!(EventRecord::Order(o.clone()).is_removal());
        o.removed = false;
        assert!(!EventRecord::Order(o).is_removal());
    }
}
