use std::sync::atomic::{AtomicU64, Ordering};

/// Per-node completion tracking: one atomic f64 slot per local worker
/// thread, stored as bit patterns in an `AtomicU64`. Each slot has exactly
/// one writer (the owning worker) and one reader (the node's monitor); no
/// further synchronization is layered on top of that invariant.
pub struct ProgressVec {
    slots: Vec<AtomicU64>,
}

impl ProgressVec {
    /// All slots start at 0.0; sized before workers are spawned.
    pub fn new(threads_per_node: usize) -> Self {
        ProgressVec {
            slots: (0..threads_per_node)
                .map(|_| AtomicU64::new(0.0f64.to_bits()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Release-store `value` into `slot`. Called only by the slot's owning
    /// worker; values are fractions in `[0.0, 1.0]`.
    pub fn publish(&self, slot: usize, value: f64) {
        self.slots[slot].store(value.to_bits(), Ordering::Release);
    }

    /// Acquire-load of `slot`. A reading of exactly `1.0` happens-after the
    /// worker's final store, so it proves the worker completed its range.
    pub fn snapshot(&self, slot: usize) -> f64 {
        f64::from_bits(self.slots[slot].load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_at_zero() {
        let v = ProgressVec::new(8);
        assert_eq!(v.len(), 8);
        for slot in 0..8 {
            assert_eq!(v.snapshot(slot), 0.0);
        }
    }

    #[test]
    fn publish_roundtrips_exact_values() {
        let v = ProgressVec::new(2);
        for &value in &[0.0, 0.25, 0.5, 0.998, 1.0] {
            v.publish(1, value);
            assert_eq!(v.snapshot(1), value);
            // the sibling slot is untouched
            assert_eq!(v.snapshot(0), 0.0);
        }
    }
}
