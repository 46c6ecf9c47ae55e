//! Deterministic random number generation.
//!
//! RULE: No analysis may call any platform RNG.
//! Randomised algorithms (Louvain node order, label propagation order and
//! tie-breaking) draw from an AlgorithmRng derived from the configured seed.
//!
//! Each algorithm gets its own stream, seeded from (seed XOR slot index),
//! so two algorithms in the same request never share a sequence and the
//! same seed always reproduces the same partition.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single algorithm run.
pub struct AlgorithmRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl AlgorithmRng {
    /// Create an RNG from the configured seed and a stable slot.
    pub fn new(seed: u64, slot: AlgorithmSlot) -> Self {
        let derived_seed = seed ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            name: slot.name(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll an index in [0, n). Returns 0 when n is 0.
    pub fn next_index(&mut self, n: usize) -> usize {
        use rand::RngCore;
        if n == 0 {
            return 0;
        }
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

/// Stable algorithm slot assignments.
/// NEVER reorder or remove entries; only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum AlgorithmSlot {
    Louvain = 0,
    LabelPropagation = 1,
}

impl AlgorithmSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Louvain => "louvain",
            Self::LabelPropagation => "label_propagation",
        }
    }
}
