//! Accumulators that support concurrent `+=` through a shared reference.
//!
//! Leaf statistics are updated from many worker threads at once while the
//! tree itself is only held behind a shared lock. Two accumulator flavors
//! cover the cases:
//!
//! - [`AtomicF32`]: lock-free scalar accumulation over `AtomicU32` bit-casts.
//! - [`AtomicValue`]: mutex-guarded accumulation for arbitrary value types.
//!   Contention is distributed across leaves, so a short critical section
//!   is sufficient.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::value::TreeValue;

// =============================================================================
// AtomicF32
// =============================================================================

/// An `f32` accumulator with atomic add, load and store.
///
/// Addition is a compare-exchange loop over the bit representation; loads and
/// stores are relaxed. This matches the commutative-accumulator contract:
/// deposits may interleave in any order without changing the final sum.
#[derive(Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    /// Create an accumulator holding `value`.
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// Read the current value.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Overwrite the current value.
    #[inline]
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Atomically add `delta` to the current value.
    pub fn add(&self, delta: f32) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Clone for AtomicF32 {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl std::fmt::Debug for AtomicF32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

// =============================================================================
// AtomicValue
// =============================================================================

/// A mutex-guarded accumulator for user value types.
#[derive(Default)]
pub struct AtomicValue<V>(Mutex<V>);

impl<V> AtomicValue<V> {
    /// Create an accumulator holding `value`.
    pub fn new(value: V) -> Self {
        Self(Mutex::new(value))
    }

    /// Overwrite the current value.
    pub fn store(&self, value: V) {
        *self.0.lock() = value;
    }
}

impl<V: Clone> AtomicValue<V> {
    /// Clone out the current value.
    pub fn load(&self) -> V {
        self.0.lock().clone()
    }
}

impl<V: TreeValue> AtomicValue<V> {
    /// Accumulate `factor * other` into the current value.
    pub fn add_scaled(&self, other: &V, factor: f32) {
        self.0.lock().accumulate_scaled(other, factor);
    }
}

impl<V: Clone> Clone for AtomicValue<V> {
    fn clone(&self) -> Self {
        Self::new(self.load())
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for AtomicValue<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", &*self.0.lock())
    }
}
