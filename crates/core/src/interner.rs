//! Global string interner (spec.md §2, §3): canonicalizes strings so that
//! two strings with equal bytes are the same heap object, reducing
//! equality to pointer identity.
//!
//! Brisk is single-threaded (spec §5), so the interner is a `thread_local`
//! map rather than a mutex-guarded global. Entries are `Weak`, so the
//! interner does not itself keep a string alive — when the last `Rc`
//! pointing at an interned string drops, the string is freed like any
//! other heap object and the interner's entry is pruned lazily on the next
//! lookup that hits the same bucket (spec.md §4.1: "string release removes
//! the interner entry if the released string was the canonical one").

use crate::value::{BriskStr, HeapObject};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

thread_local! {
    static INTERNER: RefCell<HashMap<Box<str>, Weak<HeapObject>>> = RefCell::new(HashMap::new());
}

/// FNV-1a, 32-bit, the hash spec.md §3 stores inline on every string object.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Intern `s`, returning the canonical heap object for its content. Two
/// calls with equal `s` return `Rc`s pointing at the same object as long as
/// at least one strong reference to the previous result is still alive.
pub fn intern(s: &str) -> Rc<HeapObject> {
    INTERNER.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(weak) = table.get(s) {
            if let Some(strong) = weak.upgrade() {
                return strong;
            }
        }
        let hash = fnv1a(s.as_bytes());
        let obj = Rc::new(HeapObject::Str(BriskStr {
            hash,
            bytes: s.into(),
        }));
        crate::memory_stats::record_alloc(crate::memory_stats::Kind::Str, s.len());
        table.insert(s.into(), Rc::downgrade(&obj));
        obj
    })
}

/// Number of live entries in the interner table (including stale `Weak`s
/// not yet pruned). Exposed for tests and the CLI `--stats` flag.
pub fn table_len() -> usize {
    INTERNER.with(|t| t.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_content_is_same_object() {
        let a = intern("hello");
        let b = intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_content_is_different_object() {
        let a = intern("hello");
        let b = intern("world");
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn dropping_all_strong_refs_allows_reinterning_fresh() {
        let key = "transient-test-key-xyz";
        {
            let a = intern(key);
            drop(a);
        }
        // The Weak entry may still be present but dead; interning again
        // must hand back a live, usable object rather than a dead upgrade.
        let b = intern(key);
        if let HeapObject::Str(s) = &*b {
            assert_eq!(s.as_str(), key);
        } else {
            panic!("expected Str");
        }
    }

    #[test]
    fn fnv1a_is_stable() {
        // Spot check against a known FNV-1a 32-bit vector for "".
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
    }
}
