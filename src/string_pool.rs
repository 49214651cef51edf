//! A lifetime-scoped, arena-backed string pool (spec.md C1).
//!
//! Interning is the only module-wide mutable resource (spec.md §5): every
//! interned string lives for the pool's lifetime and is never individually
//! freed. We back storage with `bumpalo`, the same arena crate
//! `cranelift-codegen` depends on, and hand out stable [`StringId`]s.

use std::collections::HashMap;

use bumpalo::Bump;

use crate::define_id;

define_id! {
    /// A stable id for an interned string. Never reused.
    #[derive(Hash)]
    pub struct StringId;
}

pub struct StringPool {
    bump: Bump,
    // SAFETY invariant: every `&'static str` below is actually backed by
    // `bump`'s storage and is valid exactly as long as `bump` is alive.
    // `Bump` never moves or frees individual allocations, so the addresses
    // are stable across further `alloc_str` calls; we only ever read these
    // slices back out bound to `&self`'s lifetime (see `resolve`), never
    // leak the 'static lifetime outward.
    strings: Vec<&'static str>,
    by_value: HashMap<&'static str, StringId>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            bump: Bump::new(),
            strings: Vec::new(),
            by_value: HashMap::new(),
        }
    }

    /// Interns `s`, returning the same id on repeated calls with an equal
    /// string (spec.md §8 round-trip property: `intern(s); intern(s)`
    /// returns the same id).
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.by_value.get(s) {
            return id;
        }
        let allocated: &str = self.bump.alloc_str(s);
        // SAFETY: see the field invariant documented on `strings`/`by_value`.
        let static_ref: &'static str = unsafe { std::mem::transmute(allocated) };
        let id = StringId::from_index(self.strings.len() as u32);
        self.strings.push(static_ref);
        self.by_value.insert(static_ref, id);
        id
    }

    pub fn resolve(&self, id: StringId) -> &str {
        self.strings[id.index() as usize]
    }

    pub fn try_resolve(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.index() as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Formats `fmt`-style arguments into an interned string, mirroring
    /// asmcmp's `format(fmt, ...) -> interned string` operation (spec.md
    /// §4.6).
    pub fn intern_fmt(&mut self, args: std::fmt::Arguments<'_>) -> StringId {
        self.intern(&args.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut pool = StringPool::new();
        let a = pool.intern("hello");
        let b = pool.intern("hello");
        assert_eq!(a, b);
        assert_eq!(pool.resolve(a), "hello");
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut pool = StringPool::new();
        let a = pool.intern("foo");
        let b = pool.intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn intern_fmt_builds_interned_string() {
        let mut pool = StringPool::new();
        let id = pool.intern_fmt(format_args!("L{}", 42));
        assert_eq!(pool.resolve(id), "L42");
    }
}
