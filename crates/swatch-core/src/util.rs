//! Small numeric helpers and the memo cell used by the engine's dataflow.

/// Returns `value` if finite, otherwise `0.0`.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Rounds to the nearest integer, mapping non-finite input to `0`.
#[allow(clippy::cast_possible_truncation)]
pub fn safe_int(value: f64) -> i64 {
    let value = finite_or_zero(value).round();
    // `as` saturates at the i64 bounds.
    value as i64
}

/// Single-slot memo: keeps the last computed value together with the inputs
/// that produced it, recomputing only when the inputs change.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    slot: Option<(K, V)>,
    computations: u64,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            slot: None,
            computations: 0,
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, computing it first if the cell is
    /// empty or was filled for different inputs.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> &V {
        if let Some((cached, _)) = &self.slot {
            if *cached != key {
                self.slot = None;
            }
        }
        if self.slot.is_none() {
            self.computations += 1;
        }
        let (_, value) = self.slot.get_or_insert_with(|| {
            let value = compute(&key);
            (key, value)
        });
        value
    }

    /// Last computed value, if any.
    pub fn value(&self) -> Option<&V> {
        self.slot.as_ref().map(|(_, value)| value)
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Number of times the cell actually ran its computation.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
