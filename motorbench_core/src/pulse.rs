//! Encoder edge accumulator shared between the edge callback and the control loop.

use std::sync::atomic::{AtomicU32, Ordering};

use motorbench_traits::EdgeHandler;

/// Counts encoder edges between sampling ticks.
///
/// `on_edge` may run on any thread (GPIO interrupt callback, simulated encoder)
/// while the control loop calls `consume_and_reset`. Both are single atomic
/// read-modify-write operations on the same word, so every edge lands in
/// exactly one consumed batch.
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: AtomicU32,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one edge.
    #[inline]
    pub fn on_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the edges seen since the previous call and zero the counter.
    #[inline]
    pub fn consume_and_reset(&self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Edges accumulated so far, without consuming them.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl EdgeHandler for PulseCounter {
    #[inline]
    fn on_edge(&self) {
        PulseCounter::on_edge(self);
    }
}
