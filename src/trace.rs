//! Single-path trace: follow the successor function from a start page until
//! a cycle, a dead end, or the step budget.
//!
//! Each trace owns its visited map and path buffer for the duration of one
//! call; nothing is shared across calls except the read-only index, so
//! batches of traces are embarrassingly parallel.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;

use crate::index::{Lookup, PageId, SuccessorIndex};

/// How a trace ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalKind {
    /// A previously visited page recurred.
    Cycle,
    /// The successor was absent (untracked page or no Nth link).
    Halt,
    /// The step budget ran out before resolving.
    StepLimit,
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalKind::Cycle => write!(f, "CYCLE"),
            TerminalKind::Halt => write!(f, "HALT"),
            TerminalKind::StepLimit => write!(f, "STEP_LIMIT"),
        }
    }
}

/// The result of tracing one start page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub start: PageId,
    pub kind: TerminalKind,
    /// Cycle members in discovery order; empty unless `kind == Cycle`.
    pub cycle: Vec<PageId>,
    /// For `Cycle`: steps to the first cycle member. Otherwise: steps taken.
    pub steps: usize,
    /// Every page visited, in order, starting at `start`.
    pub path: Vec<PageId>,
}

/// Canonical cycle identity: the sorted set of member ids. Cycles found
/// from different start points compare equal under this key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CycleKey(Vec<PageId>);

impl CycleKey {
    pub fn new(members: impl IntoIterator<Item = PageId>) -> Self {
        let mut m: Vec<PageId> = members.into_iter().collect();
        m.sort_unstable();
        m.dedup();
        CycleKey(m)
    }

    /// Member ids, ascending.
    pub fn members(&self) -> &[PageId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.0.binary_search(&page).is_ok()
    }
}

impl fmt::Display for CycleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in &self.0 {
            if !first {
                write!(f, "-")?;
            }
            write!(f, "{id}")?;
            first = false;
        }
        Ok(())
    }
}

/// Trace from `start`, applying the successor function until a repeat
/// (CYCLE), an absent successor (HALT), or `max_steps` (STEP_LIMIT).
///
/// A self-loop is a valid cycle of size 1 discovered at step 0. A start
/// page that is itself untracked halts with zero steps taken.
pub fn trace(index: &SuccessorIndex, start: PageId, max_steps: usize) -> Trace {
    if matches!(index.lookup(start), Lookup::Untracked) {
        return Trace {
            start,
            kind: TerminalKind::Halt,
            cycle: Vec::new(),
            steps: 0,
            path: Vec::new(),
        };
    }

    // Visited map and path buffer are owned by this call and dropped on
    // return; max_steps bounds both.
    let mut visited: HashMap<PageId, usize> = HashMap::new();
    let mut path: Vec<PageId> = Vec::new();
    let mut current = start;

    for _ in 0..max_steps {
        if let Some(&first_seen) = visited.get(&current) {
            let cycle = path[first_seen..].to_vec();
            return Trace {
                start,
                kind: TerminalKind::Cycle,
                cycle,
                steps: first_seen,
                path,
            };
        }
        visited.insert(current, path.len());
        path.push(current);

        match index.successor(current) {
            Some(next) => current = next,
            None => {
                let steps = path.len();
                return Trace {
                    start,
                    kind: TerminalKind::Halt,
                    cycle: Vec::new(),
                    steps,
                    path,
                };
            }
        }
    }

    let steps = path.len();
    Trace {
        start,
        kind: TerminalKind::StepLimit,
        cycle: Vec::new(),
        steps,
        path,
    }
}

/// Trace every start id independently, in parallel. Result order matches
/// input order.
pub fn sample_traces(index: &SuccessorIndex, starts: &[PageId], max_steps: usize) -> Vec<Trace> {
    starts
        .par_iter()
        .map(|&s| trace(index, s, max_steps))
        .collect()
}

/// Trace many start ids and collect the distinct terminal cycles they
/// reach, keyed by canonical identity. The value keeps the members in the
/// order they were first discovered.
pub fn discover_cycles(
    index: &SuccessorIndex,
    starts: &[PageId],
    max_steps: usize,
) -> BTreeMap<CycleKey, Vec<PageId>> {
    let mut found: BTreeMap<CycleKey, Vec<PageId>> = BTreeMap::new();
    for t in sample_traces(index, starts, max_steps) {
        if t.kind == TerminalKind::Cycle {
            let key = CycleKey::new(t.cycle.iter().copied());
            found.entry(key).or_insert(t.cycle);
        }
    }
    found
}
