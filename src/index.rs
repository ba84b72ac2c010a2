//! Successor-array index: the materialized successor function for one N.
//!
//! For a fixed N, every page maps to at most one successor (the target of
//! its Nth outgoing link). The index stores that relation as two parallel
//! arrays sorted by page id, giving O(log n) lookup with memory proportional
//! to the number of tracked pages — no per-key hash overhead at the
//! tens-of-millions-of-pages scale this runs at.
//!
//! The index is built once per N and never mutated afterwards; it is `Sync`
//! and can be shared freely across parallel trace and basin work.

use log::warn;
use serde::Serialize;

/// A page identifier: 64-bit, non-negative, stable across N values.
pub type PageId = u64;

/// Sentinel stored in the values array for "tracked but no Nth link".
/// Reserved: a real page id must never equal this value (input rows
/// carrying it are rejected as malformed in `io`).
pub(crate) const NO_SUCCESSOR: PageId = PageId::MAX;

/// A raw (page_id, next_id) record as delivered by the upstream extractor.
/// `next_id = None` means the page has no Nth outgoing link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPair {
    pub page_id: PageId,
    pub next_id: Option<PageId>,
}

/// Outcome of a key lookup. `NoLink` and `Untracked` both behave as HALT
/// for traversal, but callers may want to log them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The page is tracked and has a successor.
    Next(PageId),
    /// The page is tracked at this N but its Nth link is absent.
    NoLink,
    /// The page does not appear in this N's relation at all.
    Untracked,
}

/// Data-quality counters collected while building an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Tracked pages after deduplication.
    pub pages: usize,
    /// Tracked pages whose successor is absent.
    pub halts: usize,
    /// Duplicate page ids in the input (last write won).
    pub duplicates: usize,
}

/// Immutable successor function for one N value.
///
/// `keys` is ascending-sorted and unique; `values[i]` is the successor of
/// `keys[i]`, or [`NO_SUCCESSOR`].
#[derive(Debug, Clone)]
pub struct SuccessorIndex {
    n: u32,
    keys: Vec<PageId>,
    values: Vec<PageId>,
    stats: IndexStats,
}

impl SuccessorIndex {
    /// Build an index from raw records. Input need not be sorted or
    /// deduplicated; duplicate page ids are resolved last-write-wins and
    /// counted as a data-quality warning. Never fails on missing data —
    /// partial relations simply yield more HALTs.
    pub fn build(n: u32, pairs: impl IntoIterator<Item = RawPair>) -> Self {
        let mut entries: Vec<(PageId, PageId)> = pairs
            .into_iter()
            .map(|p| (p.page_id, p.next_id.unwrap_or(NO_SUCCESSOR)))
            .collect();
        // Stable sort so equal keys keep input order and the last one wins.
        entries.sort_by_key(|&(k, _)| k);

        let mut keys: Vec<PageId> = Vec::with_capacity(entries.len());
        let mut values: Vec<PageId> = Vec::with_capacity(entries.len());
        let mut duplicates = 0usize;
        for (k, v) in entries {
            if keys.last() == Some(&k) {
                duplicates += 1;
                if let Some(last) = values.last_mut() {
                    *last = v;
                }
            } else {
                keys.push(k);
                values.push(v);
            }
        }
        if duplicates > 0 {
            warn!("N={n}: {duplicates} duplicate page ids in successor input (last write wins)");
        }

        let halts = values.iter().filter(|&&v| v == NO_SUCCESSOR).count();
        let stats = IndexStats {
            pages: keys.len(),
            halts,
            duplicates,
        };
        SuccessorIndex {
            n,
            keys,
            values,
            stats,
        }
    }

    /// The N value this index was built for.
    pub fn n(&self) -> u32 {
        self.n
    }

    /// Number of tracked pages.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Binary-search lookup distinguishing the two HALT-ish cases.
    pub fn lookup(&self, page: PageId) -> Lookup {
        match self.keys.binary_search(&page) {
            Ok(i) => {
                let v = self.values[i];
                if v == NO_SUCCESSOR {
                    Lookup::NoLink
                } else {
                    Lookup::Next(v)
                }
            }
            Err(_) => Lookup::Untracked,
        }
    }

    /// Successor of `page`, collapsing both HALT cases to `None`.
    pub fn successor(&self, page: PageId) -> Option<PageId> {
        match self.lookup(page) {
            Lookup::Next(next) => Some(next),
            Lookup::NoLink | Lookup::Untracked => None,
        }
    }

    /// All tracked page ids, ascending.
    pub fn pages(&self) -> impl Iterator<Item = PageId> + '_ {
        self.keys.iter().copied()
    }

    /// All (page, successor) entries, ascending by page.
    pub fn entries(&self) -> impl Iterator<Item = (PageId, Option<PageId>)> + '_ {
        self.keys.iter().zip(self.values.iter()).map(|(&k, &v)| {
            let next = if v == NO_SUCCESSOR { None } else { Some(v) };
            (k, next)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(page_id: PageId, next_id: Option<PageId>) -> RawPair {
        RawPair { page_id, next_id }
    }

    #[test]
    fn test_build_sorts_unsorted_input() {
        let idx = SuccessorIndex::build(
            3,
            vec![pair(30, Some(10)), pair(10, Some(20)), pair(20, Some(30))],
        );
        assert_eq!(idx.len(), 3);
        let pages: Vec<_> = idx.pages().collect();
        assert_eq!(pages, vec![10, 20, 30]);
        assert_eq!(idx.successor(10), Some(20));
        assert_eq!(idx.successor(30), Some(10));
    }

    #[test]
    fn test_lookup_distinguishes_nolink_from_untracked() {
        let idx = SuccessorIndex::build(3, vec![pair(1, Some(2)), pair(2, None)]);
        assert_eq!(idx.lookup(1), Lookup::Next(2));
        assert_eq!(idx.lookup(2), Lookup::NoLink);
        assert_eq!(idx.lookup(99), Lookup::Untracked);
        // Both HALT cases collapse under successor()
        assert_eq!(idx.successor(2), None);
        assert_eq!(idx.successor(99), None);
    }

    #[test]
    fn test_duplicates_last_write_wins() {
        let idx = SuccessorIndex::build(
            5,
            vec![pair(1, Some(2)), pair(1, Some(3)), pair(1, Some(4))],
        );
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.successor(1), Some(4));
        assert_eq!(idx.stats().duplicates, 2);
    }

    #[test]
    fn test_stats_count_halts() {
        let idx = SuccessorIndex::build(
            4,
            vec![pair(1, Some(2)), pair(2, None), pair(3, None)],
        );
        let stats = idx.stats();
        assert_eq!(stats.pages, 3);
        assert_eq!(stats.halts, 2);
        assert_eq!(stats.duplicates, 0);
    }

    #[test]
    fn test_empty_index() {
        let idx = SuccessorIndex::build(3, Vec::new());
        assert!(idx.is_empty());
        assert_eq!(idx.lookup(0), Lookup::Untracked);
    }

    #[test]
    fn test_entries_roundtrip() {
        let idx = SuccessorIndex::build(3, vec![pair(2, None), pair(1, Some(2))]);
        let entries: Vec<_> = idx.entries().collect();
        assert_eq!(entries, vec![(1, Some(2)), (2, None)]);
    }
}
