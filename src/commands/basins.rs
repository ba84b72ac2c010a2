use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use nlink::{
    BasinConstraints, CycleKey, PageId, ReverseIndex, discover_cycles, map_basins,
};
use serde_json::json;

/// Discover terminal cycles from sampled start pages, map every basin, and
/// write the per-N assignment and summary tables.
#[derive(Args, Debug)]
pub struct BasinsArgs {
    /// Successor-pair layer as N=PATH
    #[arg(long = "layer", value_name = "N=PATH")]
    pub layer: String,
    /// Explicit start page ids for cycle discovery (repeatable)
    #[arg(long = "start-id")]
    pub start_ids: Vec<u64>,
    /// Number of tracked pages to sample evenly for cycle discovery when
    /// no start ids are given
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,
    /// Step budget per trace
    #[arg(long, default_value_t = 500)]
    pub max_steps: usize,
    /// Stop reverse BFS past this depth
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Record at most this many membership rows per basin
    #[arg(long)]
    pub top_k: Option<usize>,
    /// Directory for the output tables
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
    /// Emit a JSON summary instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &BasinsArgs) -> Result<()> {
    let (n, path) = super::parse_layer(&args.layer)?;
    let index = super::load_index(n, &path)?;
    if index.is_empty() {
        bail!("no tracked pages in {}", path.display());
    }

    let starts: Vec<PageId> = if args.start_ids.is_empty() {
        sample_starts(&index, args.samples)
    } else {
        args.start_ids.clone()
    };

    let cycles = discover_cycles(&index, &starts, args.max_steps);
    if cycles.is_empty() {
        bail!(
            "no terminal cycles found from {} start pages at N={n}; consider raising --max-steps",
            starts.len()
        );
    }

    let reverse = ReverseIndex::build(&index);
    let keys: Vec<CycleKey> = cycles.keys().cloned().collect();
    let constraints = BasinConstraints {
        max_depth: args.max_depth,
        max_members: args.top_k,
    };
    let basins = map_basins(&index, &reverse, &keys, &constraints)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let table_path = args.out_dir.join(format!("basins_n{n}.tsv"));
    let summary_path = args.out_dir.join(format!("basins_n{n}_summary.tsv"));
    nlink::io::write_basin_table(&table_path, &basins)?;
    nlink::io::write_basin_summary(&summary_path, n, &basins)?;

    if args.json {
        let out = json!({
            "n": n,
            "tracked_pages": index.len(),
            "starts_traced": starts.len(),
            "cycles": basins.iter().map(|b| json!({
                "cycle": b.cycle.to_string(),
                "cycle_len": b.cycle.len(),
                "true_size": b.true_size,
                "reported_rows": b.members.len(),
                "truncated": b.truncated,
                "max_depth": b.max_depth_reached,
            })).collect::<Vec<_>>(),
            "table": table_path,
            "summary": summary_path,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("N={n}: {} cycles from {} sampled starts", basins.len(), starts.len());
        println!(
            "{:>9} | {:>10} | {:>9} | {:<9} | cycle",
            "cycle len", "basin size", "max depth", "truncated"
        );
        println!("{}", "-".repeat(70));
        for b in &basins {
            println!(
                "{:>9} | {:>10} | {:>9} | {:<9} | {}",
                b.cycle.len(),
                b.true_size,
                b.max_depth_reached,
                b.truncated,
                b.cycle
            );
        }
        println!("\nTables written to {}", args.out_dir.display());
    }
    Ok(())
}

/// Evenly strided sample of tracked page ids; deterministic for a given
/// index and sample count.
fn sample_starts(index: &nlink::SuccessorIndex, samples: usize) -> Vec<PageId> {
    let len = index.len();
    let samples = samples.max(1).min(len);
    let stride = (len / samples).max(1);
    index.pages().step_by(stride).take(samples).collect()
}
