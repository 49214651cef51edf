//! An interval tree keyed by `[begin, end)`, augmented with `max_subtree_end`
//! so point queries can prune whole subtrees (spec.md §3, §8; grounded in
//! `examples/original_source/source/core/interval_tree.c`).
//!
//! The C original builds this on top of a self-balancing binary search tree
//! ("hashtree") of *entries* keyed by `begin`, where each entry owns a
//! nested ordered map of *nodes* keyed by `end`, and caches
//! `max_subtree_end` on the entry, recomputed up to the root on every
//! insertion. We reproduce that two-level shape with an arena-indexed,
//! unbalanced binary search tree of entries (no raw pointers, no unsafe);
//! the `max_subtree_end` augmentation and its recompute-to-root discipline
//! are preserved exactly, which is what spec.md §8's quantified invariant
//! is about.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

type Key = u64;

struct Entry<V> {
    begin: Key,
    max_subtree_end: Key,
    nodes: BTreeMap<Key, V>,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// Opaque cursor returned by [`IntervalTree::find`] and fed to
/// [`IntervalTree::find_next`] to resume a point-query scan.
#[derive(Clone, Copy, Debug)]
pub struct Finder {
    entry: usize,
    end: Key,
    position: Key,
}

pub struct IntervalTree<V> {
    entries: Vec<Entry<V>>,
    root: Option<usize>,
    by_begin: std::collections::HashMap<Key, usize>,
}

impl<V> Default for IntervalTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntervalTree<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            root: None,
            by_begin: std::collections::HashMap::new(),
        }
    }

    fn recompute_max_end(&mut self, mut idx: usize) {
        loop {
            let entry_own_max = self.entries[idx]
                .nodes
                .keys()
                .next_back()
                .copied()
                .unwrap_or(self.entries[idx].begin);
            let mut m = entry_own_max.max(self.entries[idx].begin);
            if let Some(l) = self.entries[idx].left {
                m = m.max(self.entries[l].max_subtree_end);
            }
            if let Some(r) = self.entries[idx].right {
                m = m.max(self.entries[r].max_subtree_end);
            }
            self.entries[idx].max_subtree_end = m;
            match self.entries[idx].parent {
                Some(p) => idx = p,
                None => break,
            }
        }
    }

    fn find_entry(&self, begin: Key) -> Option<usize> {
        self.by_begin.get(&begin).copied()
    }

    fn insert_entry(&mut self, begin: Key) -> usize {
        if let Some(idx) = self.find_entry(begin) {
            return idx;
        }
        let new_idx = self.entries.len();
        self.entries.push(Entry {
            begin,
            max_subtree_end: begin,
            nodes: BTreeMap::new(),
            parent: None,
            left: None,
            right: None,
        });
        self.by_begin.insert(begin, new_idx);

        match self.root {
            None => self.root = Some(new_idx),
            Some(mut cur) => loop {
                if begin < self.entries[cur].begin {
                    match self.entries[cur].left {
                        Some(next) => cur = next,
                        None => {
                            self.entries[cur].left = Some(new_idx);
                            self.entries[new_idx].parent = Some(cur);
                            break;
                        }
                    }
                } else {
                    match self.entries[cur].right {
                        Some(next) => cur = next,
                        None => {
                            self.entries[cur].right = Some(new_idx);
                            self.entries[new_idx].parent = Some(cur);
                            break;
                        }
                    }
                }
            },
        }
        new_idx
    }

    /// Inserts `[begin, end)` with the associated value. `begin == end` is a
    /// valid single point (spec.md §8 boundary case). Fails with
    /// `already-exists` if an identical interval is already present.
    pub fn insert(&mut self, begin: Key, end: Key, value: V) -> Result<()> {
        if begin > end {
            return Err(Error::InvalidParameter(
                "interval end shall be greater or equal to begin".into(),
            ));
        }
        let idx = self.insert_entry(begin);
        if self.entries[idx].nodes.contains_key(&end) {
            return Err(Error::AlreadyExists(
                "identical interval already exists in the interval tree".into(),
            ));
        }
        self.entries[idx].nodes.insert(end, value);
        self.entries[idx].max_subtree_end = self.entries[idx].max_subtree_end.max(end);
        self.recompute_max_end(idx);
        Ok(())
    }

    /// Exact-key lookup.
    pub fn get(&self, begin: Key, end: Key) -> Result<&V> {
        let idx = self
            .find_entry(begin)
            .ok_or_else(|| Error::NotFound("unable to find interval in the interval tree".into()))?;
        self.entries[idx]
            .nodes
            .get(&end)
            .ok_or_else(|| Error::NotFound("unable to find interval in the interval tree".into()))
    }

    fn find_min_node(&self, node: Option<usize>, position: Key) -> Option<(usize, Key)> {
        let idx = node?;
        let entry = &self.entries[idx];

        if position < entry.begin {
            return self.find_min_node(entry.left, position);
        }
        if let Some(l) = entry.left {
            let left = &self.entries[l];
            if position >= left.begin && position < left.max_subtree_end {
                if let Some(hit) = self.find_min_node(Some(l), position) {
                    return Some(hit);
                }
            }
        }

        if position >= entry.begin && position < entry.max_subtree_end {
            // Smallest `end` that is still `> position`, else smallest end overall.
            let mut cursor = entry
                .nodes
                .range(position..)
                .next()
                .map(|(&end, _)| end)
                .or_else(|| entry.nodes.keys().next().copied());
            while let Some(end) = cursor {
                if position < end {
                    if position >= entry.begin && position < end {
                        return Some((idx, end));
                    }
                    break;
                }
                cursor = entry.nodes.range((end + 1)..).next().map(|(&e, _)| e);
            }
        }

        self.find_min_node(entry.right, position)
    }

    /// Finds an interval containing `position`, in logarithmic time on
    /// balanced inputs (spec.md §4.7). Returns an opaque [`Finder`] usable
    /// with [`Self::find_next`] to resume the scan.
    pub fn find(&self, position: Key) -> Result<(Key, Key, &V, Finder)> {
        match self.find_min_node(self.root, position) {
            Some((idx, end)) => {
                let entry = &self.entries[idx];
                let value = &entry.nodes[&end];
                Ok((
                    entry.begin,
                    end,
                    value,
                    Finder {
                        entry: idx,
                        end,
                        position,
                    },
                ))
            }
            None => Err(Error::IteratorEnd),
        }
    }

    /// `lookup(point) -> source_location | NONE` convenience wrapper used by
    /// the debug / source-map layer (spec.md §4.7, §9).
    pub fn lookup(&self, point: Key) -> Option<&V> {
        self.find(point).ok().map(|(_, _, v, _)| v)
    }

    /// Resumes a scan from a previous [`Finder`], looking for the next
    /// interval (in ascending `end` within the same entry, then by entry
    /// order) that still contains `finder.position`.
    pub fn find_next(&self, finder: &Finder) -> Result<(Key, Key, &V, Finder)> {
        let entry = &self.entries[finder.entry];
        if let Some((&end, value)) = entry.nodes.range((finder.end + 1)..).find(|&(&e, _)| {
            finder.position >= entry.begin && finder.position < e
        }) {
            return Ok((
                entry.begin,
                end,
                value,
                Finder {
                    entry: finder.entry,
                    end,
                    position: finder.position,
                },
            ));
        }

        // Advance to subsequent entries in ascending `begin` order.
        for (&begin, &idx) in self.sorted_entries().iter().filter(|&&(b, _)| b > entry.begin) {
            let candidate = &self.entries[idx];
            if finder.position < begin {
                return Err(Error::IteratorEnd);
            }
            if finder.position < candidate.max_subtree_end {
                if let Some((&end, value)) = candidate
                    .nodes
                    .iter()
                    .find(|&(&e, _)| finder.position >= candidate.begin && finder.position < e)
                {
                    return Ok((
                        candidate.begin,
                        end,
                        value,
                        Finder {
                            entry: idx,
                            end,
                            position: finder.position,
                        },
                    ));
                }
            }
        }
        Err(Error::IteratorEnd)
    }

    fn sorted_entries(&self) -> Vec<(Key, usize)> {
        let mut v: Vec<(Key, usize)> = self.by_begin.iter().map(|(&b, &i)| (b, i)).collect();
        v.sort_unstable_by_key(|&(b, _)| b);
        v
    }

    /// Removes every stored interval contained within `[begin, end]`
    /// (inclusive on both ends, matching the round-trip property in
    /// spec.md §8: `insert(b, e, v); remove_all_in([b, e])` returns the
    /// tree to its initial state).
    pub fn remove_all_in(&mut self, begin: Key, end: Key) {
        let mut to_recompute = Vec::new();
        for (&b, &idx) in self.by_begin.clone().iter() {
            if b < begin || b > end {
                continue;
            }
            let ends_to_drop: Vec<Key> = self.entries[idx]
                .nodes
                .range(..=end)
                .map(|(&e, _)| e)
                .collect();
            for e in ends_to_drop {
                self.entries[idx].nodes.remove(&e);
            }
            to_recompute.push(idx);
        }
        for idx in to_recompute {
            if self.entries[idx].nodes.is_empty() {
                self.entries[idx].max_subtree_end = self.entries[idx].begin;
            }
            self.recompute_max_end(idx);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.nodes.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, Key, &V)> {
        let mut entries: Vec<&Entry<V>> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.begin);
        entries
            .into_iter()
            .flat_map(|e| e.nodes.iter().map(move |(&end, v)| (e.begin, end, v)))
    }

    /// Validates the `max_subtree_end` augmentation for every entry against
    /// a direct recomputation — used by tests (spec.md §8).
    #[cfg(test)]
    fn check_invariant(&self) -> bool {
        fn subtree_max<V>(tree: &IntervalTree<V>, idx: Option<usize>) -> Option<u64> {
            let idx = idx?;
            let e = &tree.entries[idx];
            let mut m = e.nodes.keys().next_back().copied().unwrap_or(e.begin);
            if let Some(l) = subtree_max(tree, e.left) {
                m = m.max(l);
            }
            if let Some(r) = subtree_max(tree, e.right) {
                m = m.max(r);
            }
            Some(m)
        }
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.nodes.is_empty() || Some(e.max_subtree_end) == subtree_max(self, Some(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut t = IntervalTree::new();
        t.insert(1, 5, "a").unwrap();
        assert_eq!(*t.get(1, 5).unwrap(), "a");
    }

    #[test]
    fn point_interval() {
        let mut t = IntervalTree::new();
        t.insert(3, 3, "point").unwrap();
        let (b, e, v, _) = t.find(3).unwrap();
        assert_eq!((b, e, *v), (3, 3, "point"));
    }

    #[test]
    fn begin_greater_than_end_rejected() {
        let mut t = IntervalTree::new();
        assert!(t.insert(5, 1, "x").is_err());
    }

    #[test]
    fn s4_max_subtree_end_scenario() {
        // spec.md §8 S4. `find(6)` does return `c` (owned by the
        // `begin=4` entry) as the spec states, but `find_next` from there
        // does *not* reach `iterator-end` in one step: that entry has no
        // node past `end=9`, so the scan advances to the next entry by
        // `begin` — the `begin=6` entry holding `d=[6,7)` — whose
        // `max_subtree_end` (7) still exceeds position 6 and which still
        // contains it. Tracing `find_next` against this input by hand
        // shows it returns `d`, not `iterator-end` — the spec's prose
        // undershoots what its own example data implies, so this test
        // asserts the traced-through behavior, with a second `find_next`
        // call to reach the genuine end of the scan.
        let mut t = IntervalTree::new();
        t.insert(1, 5, "a").unwrap();
        t.insert(2, 3, "b").unwrap();
        t.insert(4, 9, "c").unwrap();
        t.insert(6, 7, "d").unwrap();
        assert!(t.check_invariant());

        let (_, _, v, finder) = t.find(6).unwrap();
        assert_eq!(*v, "c");

        let (_, _, v, finder) = t.find_next(&finder).unwrap();
        assert_eq!(*v, "d");

        assert!(t.find_next(&finder).is_err());
    }

    #[test]
    fn round_trip_insert_remove() {
        let mut t: IntervalTree<&str> = IntervalTree::new();
        assert!(t.is_empty());
        t.insert(10, 20, "x").unwrap();
        assert!(!t.is_empty());
        t.remove_all_in(10, 20);
        assert!(t.is_empty());
    }

    #[test]
    fn not_found_outside_range() {
        let mut t: IntervalTree<&str> = IntervalTree::new();
        t.insert(10, 20, "x").unwrap();
        assert!(t.find(25).is_err());
        assert!(t.find(5).is_err());
    }
}
