use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nlink::{BasinRecord, TunnelType, assemble};
use serde_json::json;

/// Assemble per-N basin tables into the cross-N tunnel classification.
#[derive(Args, Debug)]
pub struct MultiplexArgs {
    /// Basin assignment table as N=PATH (repeatable, at least two)
    #[arg(long = "input", value_name = "N=PATH", required = true)]
    pub inputs: Vec<String>,
    /// Output path for the tunnel table
    #[arg(long, default_value = "multiplex_tunnels.tsv")]
    pub out: PathBuf,
    /// How many top-scoring tunnels to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// Emit a JSON summary instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &MultiplexArgs) -> Result<()> {
    let mut per_n: BTreeMap<u32, Vec<BasinRecord>> = BTreeMap::new();
    for raw in &args.inputs {
        let (n, path) = super::parse_layer(raw)?;
        let records = nlink::io::read_basin_table(&path)
            .with_context(|| format!("reading basin table {}", path.display()))?;
        per_n.entry(n).or_default().extend(records);
    }

    let table = assemble(&per_n)?;
    nlink::io::write_multiplex_table(&args.out, &table.tunnels)?;

    let progressive = table
        .tunnels
        .iter()
        .filter(|t| t.tunnel_type == TunnelType::Progressive)
        .count();
    let alternating = table.tunnels.len() - progressive;

    if args.json {
        let out = json!({
            "analyzed_n": table.analyzed_n,
            "pages_compared": table.pages_compared,
            "tunnel_count": table.tunnels.len(),
            "progressive": progressive,
            "alternating": alternating,
            "out": args.out,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Analyzed N={:?}: {} pages compared, {} tunnel nodes ({} progressive, {} alternating)",
            table.analyzed_n,
            table.pages_compared,
            table.tunnels.len(),
            progressive,
            alternating
        );
        let mut ranked: Vec<_> = table.tunnels.iter().collect();
        ranked.sort_by(|a, b| {
            b.tunnel_score
                .partial_cmp(&a.tunnel_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.page_id.cmp(&b.page_id))
        });
        println!(
            "\n{:>12} | {:>6} | {:>11} | {:<11} | basins",
            "page", "score", "transitions", "type"
        );
        println!("{}", "-".repeat(70));
        for row in ranked.iter().take(args.top) {
            println!(
                "{:>12} | {:>6.2} | {:>11} | {:<11} | {}",
                row.page_id, row.tunnel_score, row.n_transitions, row.tunnel_type, row.basin_list
            );
        }
        println!("\nTunnel table written to {}", args.out.display());
    }
    Ok(())
}
