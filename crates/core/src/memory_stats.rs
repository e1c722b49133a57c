//! Allocation statistics for the Brisk heap.
//!
//! The reference implementation links every heap object into a process-wide
//! intrusive "all objects" list purely for diagnostics and bulk teardown at
//! shutdown. Brisk's heap objects are reclaimed by `Rc`, so there is nothing
//! to bulk-tear-down; what remains worth keeping is the diagnostic value —
//! a live count per object kind and a running total of bytes charged to the
//! heap, surfaced by the CLI's `--stats` flag.
//!
//! Brisk is strictly single-threaded (spec §5), so this is a `thread_local`
//! registry rather than the teacher's cross-thread one guarded by atomics.

use std::cell::Cell;

/// One counter per `HeapObject` kind, in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counts {
    pub strings: usize,
    pub arrays: usize,
    pub tables: usize,
    pub functions: usize,
    pub natives: usize,
    pub pointers: usize,
    pub cstructs: usize,
    pub cfunctions: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.strings
            + self.arrays
            + self.tables
            + self.functions
            + self.natives
            + self.pointers
            + self.cstructs
            + self.cfunctions
    }
}

thread_local! {
    static LIVE: Cell<Counts> = Cell::new(Counts::default());
    static BYTES_ALLOCATED: Cell<u64> = const { Cell::new(0) };
}

/// Heap-object kinds tracked by the registry. Mirrors `HeapObject`'s
/// variants one-for-one so a caller can bump the right counter without
/// matching on the object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    Array,
    Table,
    Function,
    Native,
    Pointer,
    CStruct,
    CFunction,
}

/// Record the creation of a heap object of the given kind, charging
/// `size_bytes` to the running byte counter.
pub fn record_alloc(kind: Kind, size_bytes: usize) {
    LIVE.with(|c| {
        let mut counts = c.get();
        match kind {
            Kind::Str => counts.strings += 1,
            Kind::Array => counts.arrays += 1,
            Kind::Table => counts.tables += 1,
            Kind::Function => counts.functions += 1,
            Kind::Native => counts.natives += 1,
            Kind::Pointer => counts.pointers += 1,
            Kind::CStruct => counts.cstructs += 1,
            Kind::CFunction => counts.cfunctions += 1,
        }
        c.set(counts);
    });
    BYTES_ALLOCATED.with(|b| b.set(b.get() + size_bytes as u64));
}

/// Record the destruction of a heap object of the given kind (called from
/// `HeapObject`'s `Drop` impl once its `Rc` strong count reaches zero).
pub fn record_free(kind: Kind) {
    LIVE.with(|c| {
        let mut counts = c.get();
        match kind {
            Kind::Str => counts.strings = counts.strings.saturating_sub(1),
            Kind::Array => counts.arrays = counts.arrays.saturating_sub(1),
            Kind::Table => counts.tables = counts.tables.saturating_sub(1),
            Kind::Function => counts.functions = counts.functions.saturating_sub(1),
            Kind::Native => counts.natives = counts.natives.saturating_sub(1),
            Kind::Pointer => counts.pointers = counts.pointers.saturating_sub(1),
            Kind::CStruct => counts.cstructs = counts.cstructs.saturating_sub(1),
            Kind::CFunction => counts.cfunctions = counts.cfunctions.saturating_sub(1),
        }
        c.set(counts);
    });
}

/// Snapshot of currently-live object counts.
pub fn live_counts() -> Counts {
    LIVE.with(|c| c.get())
}

/// Total bytes ever charged via `record_alloc` (monotonic, not a live total —
/// matches the reference implementation's "bump counter of live bytes",
/// which is likewise never decremented on free).
pub fn bytes_allocated() -> u64 {
    BYTES_ALLOCATED.with(|b| b.get())
}

/// Reset all counters. Exposed for test isolation only.
#[doc(hidden)]
pub fn reset_for_tests() {
    LIVE.with(|c| c.set(Counts::default()));
    BYTES_ALLOCATED.with(|b| b.set(0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_free_round_trip() {
        reset_for_tests();
        record_alloc(Kind::Str, 16);
        record_alloc(Kind::Array, 64);
        assert_eq!(live_counts().strings, 1);
        assert_eq!(live_counts().arrays, 1);
        assert_eq!(bytes_allocated(), 80);

        record_free(Kind::Str);
        assert_eq!(live_counts().strings, 0);
        assert_eq!(live_counts().total(), 1);
        // bytes_allocated is monotonic: freeing never reduces it.
        assert_eq!(bytes_allocated(), 80);
    }

    #[test]
    fn free_below_zero_saturates() {
        reset_for_tests();
        record_free(Kind::Table);
        assert_eq!(live_counts().tables, 0);
    }
}
