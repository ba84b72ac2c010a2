//! Flat-record I/O: tab-separated tables for successor pairs in, basin and
//! multiplex tables out.
//!
//! Malformed successor records (non-integer fields, the reserved sentinel
//! id) are rejected row by row with a surfaced count — reading never fails
//! on bad data, only on I/O. Our own tables are read back strictly.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::basin::Basin;
use crate::index::{NO_SUCCESSOR, PageId, RawPair};
use crate::multiplex::{BasinRecord, TunnelRow};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of a per-N basin assignment table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinRow {
    pub page_id: PageId,
    pub cycle_identity: String,
    pub depth: usize,
    pub truncated: bool,
}

/// Per-basin summary row, written alongside the assignment table so the
/// true reachable size survives membership truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinSummaryRow {
    pub cycle_identity: String,
    pub n: u32,
    pub true_size: usize,
    pub reported_rows: usize,
    pub truncated: bool,
    pub mean_depth: f64,
    pub median_depth: f64,
    pub max_depth: usize,
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, TableError> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)?)
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, TableError> {
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?)
}

/// Read a per-N successor relation: `page_id \t next_id`, header row
/// expected, empty `next_id` meaning no Nth link. Returns the parsed pairs
/// and the count of rejected records.
pub fn read_successor_pairs(path: &Path) -> Result<(Vec<RawPair>, usize), TableError> {
    let mut reader = tsv_reader(path)?;
    let mut pairs: Vec<RawPair> = Vec::new();
    let mut rejected = 0usize;
    for record in reader.records() {
        let record = record?;
        match parse_pair(&record) {
            Some(pair) => pairs.push(pair),
            None => {
                rejected += 1;
                warn!("rejecting malformed successor record {:?} in {}", record, path.display());
            }
        }
    }
    Ok((pairs, rejected))
}

fn parse_pair(record: &csv::StringRecord) -> Option<RawPair> {
    let page_id: PageId = record.get(0)?.trim().parse().ok()?;
    if page_id == NO_SUCCESSOR {
        return None;
    }
    let next_id = match record.get(1) {
        None => None,
        Some(s) if s.trim().is_empty() => None,
        Some(s) => {
            let id: PageId = s.trim().parse().ok()?;
            if id == NO_SUCCESSOR {
                return None;
            }
            Some(id)
        }
    };
    Some(RawPair { page_id, next_id })
}

/// Write the basin assignment table for one N.
pub fn write_basin_table(path: &Path, basins: &[Basin]) -> Result<(), TableError> {
    let mut writer = tsv_writer(path)?;
    for basin in basins {
        let identity = basin.cycle.to_string();
        for member in &basin.members {
            writer.serialize(BasinRow {
                page_id: member.page_id,
                cycle_identity: identity.clone(),
                depth: member.depth,
                truncated: basin.truncated,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-basin summary table for one N.
pub fn write_basin_summary(path: &Path, n: u32, basins: &[Basin]) -> Result<(), TableError> {
    let mut writer = tsv_writer(path)?;
    for basin in basins {
        let stats = basin.depth_stats();
        writer.serialize(BasinSummaryRow {
            cycle_identity: basin.cycle.to_string(),
            n,
            true_size: basin.true_size,
            reported_rows: basin.members.len(),
            truncated: basin.truncated,
            mean_depth: stats.mean,
            median_depth: stats.median,
            max_depth: stats.max,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a basin assignment table back for multiplex assembly or coverage.
pub fn read_basin_table(path: &Path) -> Result<Vec<BasinRecord>, TableError> {
    let mut reader = tsv_reader(path)?;
    let mut records: Vec<BasinRecord> = Vec::new();
    for row in reader.deserialize::<BasinRow>() {
        let row = row?;
        records.push(BasinRecord {
            page_id: row.page_id,
            cycle_identity: row.cycle_identity,
            depth: row.depth,
        });
    }
    Ok(records)
}

/// Write the tunnel classification table.
pub fn write_multiplex_table(path: &Path, rows: &[TunnelRow]) -> Result<(), TableError> {
    let mut writer = tsv_writer(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::{BasinConstraints, ReverseIndex, map_basin};
    use crate::index::SuccessorIndex;
    use crate::trace::CycleKey;
    use std::fs;

    #[test]
    fn test_read_successor_pairs_tolerates_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.tsv");
        fs::write(
            &path,
            "page_id\tnext_id\n1\t2\n2\t\nnot_a_number\t3\n4\tbogus\n5\t1\n",
        )
        .unwrap();

        let (pairs, rejected) = read_successor_pairs(&path).unwrap();
        assert_eq!(rejected, 2);
        assert_eq!(
            pairs,
            vec![
                RawPair { page_id: 1, next_id: Some(2) },
                RawPair { page_id: 2, next_id: None },
                RawPair { page_id: 5, next_id: Some(1) },
            ]
        );
    }

    #[test]
    fn test_sentinel_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.tsv");
        fs::write(
            &path,
            format!("page_id\tnext_id\n{}\t1\n1\t2\n", u64::MAX),
        )
        .unwrap();
        let (pairs, rejected) = read_successor_pairs(&path).unwrap();
        assert_eq!(rejected, 1);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_basin_table_roundtrip() {
        let idx = SuccessorIndex::build(
            3,
            [(1u64, Some(2u64)), (2, Some(3)), (3, Some(2))]
                .into_iter()
                .map(|(page_id, next_id)| RawPair { page_id, next_id }),
        );
        let rev = ReverseIndex::build(&idx);
        let basin = map_basin(
            &idx,
            &rev,
            &CycleKey::new(vec![2, 3]),
            &BasinConstraints::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basins_n3.tsv");
        write_basin_table(&path, std::slice::from_ref(&basin)).unwrap();

        let records = read_basin_table(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.cycle_identity == "2-3"));
        let depths: Vec<usize> = records.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 0, 1]);
    }

    #[test]
    fn test_summary_reports_true_size() {
        let idx = SuccessorIndex::build(
            5,
            [(1u64, Some(1u64)), (2, Some(1)), (3, Some(1))]
                .into_iter()
                .map(|(page_id, next_id)| RawPair { page_id, next_id }),
        );
        let rev = ReverseIndex::build(&idx);
        let constraints = BasinConstraints {
            max_depth: None,
            max_members: Some(1),
        };
        let basin = map_basin(&idx, &rev, &CycleKey::new(vec![1]), &constraints).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.tsv");
        write_basin_summary(&path, 5, std::slice::from_ref(&basin)).unwrap();

        let mut reader = tsv_reader(&path).unwrap();
        let rows: Vec<BasinSummaryRow> = reader
            .deserialize::<BasinSummaryRow>()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].true_size, 3);
        assert_eq!(rows[0].reported_rows, 1);
        assert!(rows[0].truncated);
    }
}
