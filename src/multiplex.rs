//! Cross-N assembly: align per-N basin assignments for the same page
//! universe, find pages whose terminal basin changes with N ("tunnel
//! nodes"), and classify the change pattern.
//!
//! A page absent from some N's table is "unknown at N": it contributes no
//! transition by itself, but a basin change between its nearest known
//! neighbors still counts. Assembly is order-independent — the per-N input
//! is keyed by a `BTreeMap` and output rows are sorted by page id.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::PageId;

#[derive(Debug, Error)]
pub enum MultiplexError {
    #[error("multiplex assembly needs at least 2 N layers, got {0}")]
    NotEnoughLayers(usize),
}

/// One row of a per-N basin table, as read back from the basin mapper's
/// output. The cycle identity is the canonical string form of the cycle
/// key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinRecord {
    pub page_id: PageId,
    pub cycle_identity: String,
    pub depth: usize,
}

/// Pattern of basin-identity change across increasing N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelType {
    /// Each distinct identity appears in one contiguous run; the page
    /// settles and never returns to a basin it left.
    Progressive,
    /// Some identity recurs after the sequence moved away from it.
    Alternating,
}

impl fmt::Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelType::Progressive => write!(f, "progressive"),
            TunnelType::Alternating => write!(f, "alternating"),
        }
    }
}

/// One classified tunnel node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunnelRow {
    pub page_id: PageId,
    pub n_basins_bridged: usize,
    pub n_transitions: usize,
    pub tunnel_type: TunnelType,
    /// Transitions normalized by (analyzed N count − 1); monotone in
    /// transitions for a fixed N range.
    pub tunnel_score: f64,
    /// Basin identity at each analyzed N in order, `?` where unknown,
    /// `;`-joined.
    pub basin_list: String,
}

/// The assembled cross-N table.
#[derive(Debug, Clone, Serialize)]
pub struct MultiplexTable {
    /// N values analyzed, ascending.
    pub analyzed_n: Vec<u32>,
    /// Pages present in at least two per-N tables.
    pub pages_compared: usize,
    /// Tunnel nodes, sorted by page id.
    pub tunnels: Vec<TunnelRow>,
}

/// Assemble per-N basin tables into a tunnel classification table.
///
/// Conflicting identities for the same (N, page) keep the last one and log
/// a warning; a page should belong to exactly one basin per N.
pub fn assemble(
    per_n: &BTreeMap<u32, Vec<BasinRecord>>,
) -> Result<MultiplexTable, MultiplexError> {
    if per_n.len() < 2 {
        return Err(MultiplexError::NotEnoughLayers(per_n.len()));
    }
    let analyzed_n: Vec<u32> = per_n.keys().copied().collect();

    // page -> (N -> identity)
    let mut by_page: BTreeMap<PageId, BTreeMap<u32, &str>> = BTreeMap::new();
    for (&n, rows) in per_n {
        for row in rows {
            let layers = by_page.entry(row.page_id).or_default();
            if let Some(old) = layers.insert(n, row.cycle_identity.as_str()) {
                if old != row.cycle_identity {
                    warn!(
                        "page {} assigned to two basins at N={n} ({old} and {}); keeping the latter",
                        row.page_id, row.cycle_identity
                    );
                }
            }
        }
    }

    let mut pages_compared = 0usize;
    let mut tunnels: Vec<TunnelRow> = Vec::new();
    let norm = (analyzed_n.len() - 1) as f64;

    for (&page_id, layers) in &by_page {
        if layers.len() < 2 {
            continue;
        }
        pages_compared += 1;

        // Known identities in increasing-N order; unknowns skipped, so a
        // change across an unknown gap still counts as one transition.
        let known: Vec<&str> = analyzed_n
            .iter()
            .filter_map(|n| layers.get(n).copied())
            .collect();
        let distinct: BTreeSet<&str> = known.iter().copied().collect();
        if distinct.len() < 2 {
            continue;
        }

        let n_transitions = known.windows(2).filter(|w| w[0] != w[1]).count();
        let tunnel_type = classify(&known);
        let basin_list: Vec<&str> = analyzed_n
            .iter()
            .map(|n| layers.get(n).copied().unwrap_or("?"))
            .collect();

        tunnels.push(TunnelRow {
            page_id,
            n_basins_bridged: distinct.len(),
            n_transitions,
            tunnel_type,
            tunnel_score: n_transitions as f64 / norm,
            basin_list: basin_list.join(";"),
        });
    }

    Ok(MultiplexTable {
        analyzed_n,
        pages_compared,
        tunnels,
    })
}

/// Progressive means reading left to right, every distinct identity forms
/// one contiguous run; returning to an identity after leaving it makes the
/// page alternating.
fn classify(known: &[&str]) -> TunnelType {
    let mut left: BTreeSet<&str> = BTreeSet::new();
    let mut prev = known[0];
    for &id in &known[1..] {
        if id != prev {
            left.insert(prev);
            if left.contains(id) {
                return TunnelType::Alternating;
            }
            prev = id;
        }
    }
    TunnelType::Progressive
}
