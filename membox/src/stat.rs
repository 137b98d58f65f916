//! Process-wide pool counters. Compiled out unless the `stat` feature is on.

use std::sync::atomic::{AtomicUsize, Ordering};

static ALLOCATIONS: Counter = Counter::new();
static EXHAUSTED: Counter = Counter::new();
static FREES: Counter = Counter::new();
static REJECTED_FREES: Counter = Counter::new();

#[inline(always)]
pub fn run(block: impl Fn()) {
    if cfg!(not(feature = "stat")) {
        return;
    }
    block()
}

#[inline(always)]
pub fn track_allocation(exhausted: bool) {
    run(|| {
        if exhausted {
            EXHAUSTED.inc(1);
        } else {
            ALLOCATIONS.inc(1);
        }
    })
}

#[inline(always)]
pub fn track_free(rejected: bool) {
    run(|| {
        if rejected {
            REJECTED_FREES.inc(1);
        } else {
            FREES.inc(1);
        }
    })
}

pub struct Counter(AtomicUsize);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }
    #[inline(always)]
    pub fn get(&self) -> usize {
        if cfg!(not(feature = "stat")) {
            return 0;
        }
        self.0.load(Ordering::SeqCst)
    }
    #[inline(always)]
    pub fn inc(&self, delta: usize) {
        if cfg!(not(feature = "stat")) {
            return;
        }
        self.0.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub allocations: usize,
    pub exhausted: usize,
    pub frees: usize,
    pub rejected_frees: usize,
}

pub fn totals() -> Totals {
    Totals {
        allocations: ALLOCATIONS.get(),
        exhausted: EXHAUSTED.get(),
        frees: FREES.get(),
        rejected_frees: REJECTED_FREES.get(),
    }
}

#[cfg(not(feature = "stat"))]
pub fn report() {}

#[cfg(feature = "stat")]
pub fn report() {
    let t = totals();
    println!("alloc: {} (exhausted: {})", t.allocations, t.exhausted);
    println!("free: {} (rejected: {})", t.frees, t.rejected_frees);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "stat"))]
    #[test]
    fn counters_read_zero_when_disabled() {
        track_allocation(false);
        track_free(true);
        assert_eq!(totals(), Totals::default());
    }

    #[cfg(feature = "stat")]
    #[test]
    fn counters_accumulate() {
        let before = totals();
        track_allocation(false);
        track_allocation(true);
        track_free(false);
        track_free(true);
        let after = totals();
        assert!(after.allocations > before.allocations);
        assert!(after.exhausted > before.exhausted);
        assert!(after.frees > before.frees);
        assert!(after.rejected_frees > before.rejected_frees);
    }
}
