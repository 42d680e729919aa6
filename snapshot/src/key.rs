//! Deterministic composite key over `(record_id, symbol, source)`.

/// 64-bit composite key accelerating registry lookups.
///
/// Bit layout:
/// - bits 56-63: low 8 bits of `record_id`
/// - bits 24-55: 32-bit hash of `symbol`
/// - bits 0-23: low 24 bits of the hash of `source` (0 if `source` is absent)
///
/// Collisions are possible and tolerated: [`SnapshotKey`] is an accelerator, not an
/// identity. The registry re-checks the full `(record_id, symbol, source)` tuple on
/// every lookup hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0:#018x}")]
pub struct SnapshotKey(u64);

impl SnapshotKey {
    pub fn new(record_id: u16, symbol: &str, source: Option<&str>) -> Self {
        let record_bits = (record_id as u64 & 0xFF) << 56;
        let symbol_bits = (rolling_hash(symbol) as u64) << 24;
        let source_bits = source.map(rolling_hash).unwrap_or(0) as u64 & 0xFF_FFFF;

        Self(record_bits | symbol_bits | source_bits)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Stable per-codepoint rolling hash: `h = h*31 + c`, seeded at 0.
///
/// Applied identically to both the symbol and the (optional) order-book source
/// tag, matching the dxFeed wire protocol's own symbol/source hashing convention.
pub fn rolling_hash(s: &str) -> i32 {
    let mut h: i32 = 0;
    for c in s.chars() {
        h = h.wrapping_mul(31).wrapping_add(c as i32);
    }
    h
}
