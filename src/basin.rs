//! Basin mapping: reverse breadth-first search outward from a terminal
//! cycle, assigning every reverse-reachable page a depth (its forward
//! distance to the cycle).
//!
//! The reverse relation is materialized CSR-style: the forward (page →
//! successor) entries are flipped into (target, source) pairs and sorted,
//! so a target's preimages are one contiguous slice found by binary search.
//! Memory stays proportional to the edge count — no per-target hash maps.
//!
//! Because the forward graph is functional (one outgoing edge per page),
//! each non-cycle page appears in exactly one preimage slice and is
//! therefore discovered exactly once; a page's basin and depth are written
//! once and never reassigned.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::index::{PageId, SuccessorIndex};
use crate::trace::CycleKey;

#[derive(Debug, Error)]
pub enum BasinError {
    #[error("cycle has no members")]
    EmptyCycle,
    #[error("cycle does not close under the successor function: {member} -> {found:?}")]
    NotClosed {
        member: PageId,
        found: Option<PageId>,
    },
}

/// Preimage lookup for one N: which pages map *to* a given page.
///
/// Immutable once built; build it eagerly before any parallel basin work.
#[derive(Debug, Clone)]
pub struct ReverseIndex {
    /// Sorted edge targets, aligned with `sources`. Equal targets form a
    /// contiguous run; `sources` within a run are ascending.
    targets: Vec<PageId>,
    sources: Vec<PageId>,
}

impl ReverseIndex {
    pub fn build(index: &SuccessorIndex) -> Self {
        let mut edges: Vec<(PageId, PageId)> = index
            .entries()
            .filter_map(|(page, next)| next.map(|target| (target, page)))
            .collect();
        edges.sort_unstable();
        let (targets, sources) = edges.into_iter().unzip();
        ReverseIndex { targets, sources }
    }

    /// Pages whose successor is `target`, ascending. A target that never
    /// appears as a value (including dangling successors) has an empty
    /// slice — harmless, nothing can be assigned through it.
    pub fn preimages(&self, target: PageId) -> &[PageId] {
        let lo = self.targets.partition_point(|&t| t < target);
        let hi = self.targets.partition_point(|&t| t <= target);
        &self.sources[lo..hi]
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }
}

/// Optional bounds on basin exploration and output volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasinConstraints {
    /// Stop expanding past this depth.
    pub max_depth: Option<usize>,
    /// Record at most this many membership rows (true size still counted).
    pub max_members: Option<usize>,
}

/// One recorded basin membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasinMember {
    pub page_id: PageId,
    /// Forward steps to first reach a cycle member; cycle members are 0.
    pub depth: usize,
}

/// Aggregate depth statistics over every assigned page (not just the
/// recorded rows, so they stay exact under member truncation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthStats {
    pub mean: f64,
    pub median: f64,
    pub max: usize,
}

/// A mapped basin: the reverse-reachable set of one terminal cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Basin {
    pub cycle: CycleKey,
    /// Recorded rows, ordered by (depth, page_id). May be capped; see
    /// `truncated` and `true_size`.
    pub members: Vec<BasinMember>,
    /// Exact count of assigned pages, regardless of the member cap. Under
    /// a depth cutoff this is the count reachable within the bound.
    pub true_size: usize,
    /// True when membership rows were dropped by the member cap, or when
    /// the depth cutoff stopped expansion with pages still unexplored.
    pub truncated: bool,
    /// Deepest depth actually assigned.
    pub max_depth_reached: usize,
    depths: Vec<usize>,
}

impl Basin {
    pub fn depth_stats(&self) -> DepthStats {
        if self.depths.is_empty() {
            return DepthStats {
                mean: 0.0,
                median: 0.0,
                max: 0,
            };
        }
        let mut sorted = self.depths.clone();
        sorted.sort_unstable();
        let sum: usize = sorted.iter().sum();
        let mean = sum as f64 / sorted.len() as f64;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        };
        DepthStats {
            mean,
            median,
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Map the basin of one terminal cycle by reverse BFS.
///
/// The frontier starts as the cycle members at depth 0. Frontiers and
/// preimage slices are processed in ascending page-id order, so output is
/// deterministic and the member cap keeps shallowest-then-lowest-id rows.
///
/// Fails loudly on an empty cycle or one that does not close under the
/// successor function — both are caller contract violations, never an
/// empty basin.
pub fn map_basin(
    index: &SuccessorIndex,
    reverse: &ReverseIndex,
    cycle: &CycleKey,
    constraints: &BasinConstraints,
) -> Result<Basin, BasinError> {
    if cycle.is_empty() {
        return Err(BasinError::EmptyCycle);
    }
    for &member in cycle.members() {
        match index.successor(member) {
            Some(next) if cycle.contains(next) => {}
            found => return Err(BasinError::NotClosed { member, found }),
        }
    }

    let mut assigned: HashMap<PageId, usize> = HashMap::new();
    let mut members: Vec<BasinMember> = Vec::new();
    let mut depths: Vec<usize> = Vec::new();
    let mut truncated = false;
    let mut max_depth_reached = 0usize;

    // CycleKey members are already ascending.
    let mut frontier: Vec<PageId> = cycle.members().to_vec();
    let mut depth = 0usize;

    while !frontier.is_empty() {
        for &page in &frontier {
            assigned.insert(page, depth);
            depths.push(depth);
            max_depth_reached = depth;
            match constraints.max_members {
                Some(cap) if members.len() >= cap => truncated = true,
                _ => members.push(BasinMember {
                    page_id: page,
                    depth,
                }),
            }
        }

        let mut next: Vec<PageId> = Vec::new();
        for &page in &frontier {
            for &pre in reverse.preimages(page) {
                if !assigned.contains_key(&pre) {
                    next.push(pre);
                }
            }
        }
        // One forward edge per page, so no page appears in two preimage
        // slices; sorting alone gives deterministic round order.
        next.sort_unstable();

        if let Some(cap) = constraints.max_depth {
            if depth >= cap && !next.is_empty() {
                truncated = true;
                next.clear();
            }
        }
        frontier = next;
        depth += 1;
    }

    debug!(
        "basin {}: {} pages, max depth {}, truncated={}",
        cycle,
        depths.len(),
        max_depth_reached,
        truncated
    );

    Ok(Basin {
        cycle: cycle.clone(),
        members,
        true_size: depths.len(),
        truncated,
        max_depth_reached,
        depths,
    })
}

/// Map several disjoint cycles' basins in parallel. Basins of distinct
/// cycles at the same N are disjoint by construction, so this shares only
/// the read-only index and reverse index.
pub fn map_basins(
    index: &SuccessorIndex,
    reverse: &ReverseIndex,
    cycles: &[CycleKey],
    constraints: &BasinConstraints,
) -> Result<Vec<Basin>, BasinError> {
    cycles
        .par_iter()
        .map(|c| map_basin(index, reverse, c, constraints))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RawPair;
    use crate::trace::{TerminalKind, trace};

    fn index(pairs: &[(PageId, Option<PageId>)]) -> SuccessorIndex {
        SuccessorIndex::build(
            3,
            pairs.iter().map(|&(page_id, next_id)| RawPair { page_id, next_id }),
        )
    }

    #[test]
    fn test_reverse_index_preimages() {
        let idx = index(&[(1, Some(3)), (2, Some(3)), (3, Some(1)), (4, None)]);
        let rev = ReverseIndex::build(&idx);
        assert_eq!(rev.edge_count(), 3);
        assert_eq!(rev.preimages(3), &[1, 2]);
        assert_eq!(rev.preimages(1), &[3]);
        assert_eq!(rev.preimages(4), &[] as &[PageId]);
        // Dangling target (never a key) has no preimages either way.
        assert_eq!(rev.preimages(99), &[] as &[PageId]);
    }

    #[test]
    fn test_basin_of_two_cycle() {
        // 1 → 2 → 3 → 2
        let idx = index(&[(1, Some(2)), (2, Some(3)), (3, Some(2))]);
        let rev = ReverseIndex::build(&idx);
        let cycle = CycleKey::new(vec![2, 3]);
        let basin = map_basin(&idx, &rev, &cycle, &BasinConstraints::default()).unwrap();

        assert_eq!(basin.true_size, 3);
        assert!(!basin.truncated);
        assert_eq!(
            basin.members,
            vec![
                BasinMember { page_id: 2, depth: 0 },
                BasinMember { page_id: 3, depth: 0 },
                BasinMember { page_id: 1, depth: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_cycle_rejected() {
        let idx = index(&[(1, Some(1))]);
        let rev = ReverseIndex::build(&idx);
        let err = map_basin(&idx, &rev, &CycleKey::new(Vec::new()), &BasinConstraints::default());
        assert!(matches!(err, Err(BasinError::EmptyCycle)));
    }

    #[test]
    fn test_unclosed_cycle_rejected() {
        // 2 → 3 but 3 → 4: {2, 3} is not a cycle.
        let idx = index(&[(2, Some(3)), (3, Some(4)), (4, Some(4))]);
        let rev = ReverseIndex::build(&idx);
        let err = map_basin(&idx, &rev, &CycleKey::new(vec![2, 3]), &BasinConstraints::default());
        assert!(matches!(err, Err(BasinError::NotClosed { member: 3, .. })));
    }

    #[test]
    fn test_depth_cutoff_truncates() {
        // 4 → 3 → 2 → 1 → 1
        let idx = index(&[(4, Some(3)), (3, Some(2)), (2, Some(1)), (1, Some(1))]);
        let rev = ReverseIndex::build(&idx);
        let cycle = CycleKey::new(vec![1]);
        let constraints = BasinConstraints {
            max_depth: Some(1),
            max_members: None,
        };
        let basin = map_basin(&idx, &rev, &cycle, &constraints).unwrap();
        assert!(basin.truncated);
        assert_eq!(basin.max_depth_reached, 1);
        assert_eq!(basin.true_size, 2); // pages 1 and 2
    }

    #[test]
    fn test_member_cap_keeps_counting_true_size() {
        // Star into a self-loop: 10..20 → 1 → 1
        let mut pairs: Vec<(PageId, Option<PageId>)> = vec![(1, Some(1))];
        for p in 10..20 {
            pairs.push((p, Some(1)));
        }
        let idx = index(&pairs);
        let rev = ReverseIndex::build(&idx);
        let cycle = CycleKey::new(vec![1]);
        let constraints = BasinConstraints {
            max_depth: None,
            max_members: Some(3),
        };
        let basin = map_basin(&idx, &rev, &cycle, &constraints).unwrap();
        assert!(basin.truncated);
        assert_eq!(basin.true_size, 11);
        assert_eq!(basin.members.len(), 3);
        // Shallowest first, then lowest page ids.
        assert_eq!(basin.members[0].page_id, 1);
        assert_eq!(basin.members[1].page_id, 10);
        assert_eq!(basin.members[2].page_id, 11);
    }

    #[test]
    fn test_round_trip_depth_matches_forward_trace() {
        // Chain into a 2-cycle with a side branch.
        let idx = index(&[
            (1, Some(2)),
            (2, Some(3)),
            (3, Some(2)),
            (10, Some(1)),
            (11, Some(1)),
            (12, Some(11)),
        ]);
        let rev = ReverseIndex::build(&idx);
        let cycle = CycleKey::new(vec![2, 3]);
        let basin = map_basin(&idx, &rev, &cycle, &BasinConstraints::default()).unwrap();

        for member in &basin.members {
            let t = trace(&idx, member.page_id, 500);
            assert_eq!(t.kind, TerminalKind::Cycle);
            // Forward steps to first cycle member equals assigned depth.
            assert_eq!(t.steps, member.depth, "page {}", member.page_id);
            assert_eq!(CycleKey::new(t.cycle), cycle);
        }
    }

    #[test]
    fn test_idempotent() {
        let idx = index(&[(1, Some(2)), (2, Some(2)), (3, Some(1))]);
        let rev = ReverseIndex::build(&idx);
        let cycle = CycleKey::new(vec![2]);
        let a = map_basin(&idx, &rev, &cycle, &BasinConstraints::default()).unwrap();
        let b = map_basin(&idx, &rev, &cycle, &BasinConstraints::default()).unwrap();
        assert_eq!(a.members, b.members);
        assert_eq!(a.true_size, b.true_size);
    }

    #[test]
    fn test_disjoint_basins_cover_everything() {
        // Two cycles: {1,2} fed by 5, {3} fed by 6; 7 halts.
        let idx = index(&[
            (1, Some(2)),
            (2, Some(1)),
            (3, Some(3)),
            (5, Some(1)),
            (6, Some(3)),
            (7, None),
        ]);
        let rev = ReverseIndex::build(&idx);
        let cycles = vec![CycleKey::new(vec![1, 2]), CycleKey::new(vec![3])];
        let basins = map_basins(&idx, &rev, &cycles, &BasinConstraints::default()).unwrap();

        let mut seen: Vec<PageId> = Vec::new();
        for basin in &basins {
            for m in &basin.members {
                assert!(!seen.contains(&m.page_id), "page in two basins");
                seen.push(m.page_id);
            }
        }
        seen.sort_unstable();
        // Union of basins plus the HALT page equals the full page set.
        assert_eq!(seen, vec![1, 2, 3, 5, 6]);
        assert_eq!(trace(&idx, 7, 500).kind, TerminalKind::Halt);
    }

    #[test]
    fn test_depth_stats() {
        // 1→1 (depth 0), 2→1 (1), 3→2 (2), 4→3 (3)
        let idx = index(&[(1, Some(1)), (2, Some(1)), (3, Some(2)), (4, Some(3))]);
        let rev = ReverseIndex::build(&idx);
        let basin =
            map_basin(&idx, &rev, &CycleKey::new(vec![1]), &BasinConstraints::default()).unwrap();
        let stats = basin.depth_stats();
        assert_eq!(stats.max, 3);
        assert!((stats.mean - 1.5).abs() < 1e-9);
        assert!((stats.median - 1.5).abs() < 1e-9);
    }
}
