pub mod basins;
pub mod coverage;
pub mod multiplex;
pub mod trace;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nlink::SuccessorIndex;

/// Parse a `N=PATH` layer argument.
pub fn parse_layer(raw: &str) -> Result<(u32, PathBuf)> {
    let Some((n, path)) = raw.split_once('=') else {
        bail!("expected N=PATH, got '{raw}'");
    };
    let n: u32 = n
        .trim()
        .parse()
        .with_context(|| format!("bad N value in layer '{raw}'"))?;
    Ok((n, PathBuf::from(path)))
}

/// Load and build the successor index for one layer, surfacing the
/// rejected-record count.
pub fn load_index(n: u32, path: &Path) -> Result<SuccessorIndex> {
    let (pairs, rejected) = nlink::io::read_successor_pairs(path)
        .with_context(|| format!("reading successor pairs from {}", path.display()))?;
    if rejected > 0 {
        eprintln!(
            "warning: rejected {rejected} malformed records in {}",
            path.display()
        );
    }
    Ok(SuccessorIndex::build(n, pairs))
}
