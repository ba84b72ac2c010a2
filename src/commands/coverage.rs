use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use clap::Args;
use nlink::PageId;
use serde_json::json;

/// Union coverage of the basin structure across N values: how much of the
/// page universe lands in some basin at some N.
#[derive(Args, Debug)]
pub struct CoverageArgs {
    /// Basin assignment table as N=PATH (repeatable)
    #[arg(long = "input", value_name = "N=PATH", required = true)]
    pub inputs: Vec<String>,
    /// Total page count of the universe, for coverage percentages
    #[arg(long)]
    pub total_pages: Option<u64>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &CoverageArgs) -> Result<()> {
    let mut pages_by_n: BTreeMap<u32, BTreeSet<PageId>> = BTreeMap::new();
    for raw in &args.inputs {
        let (n, path) = super::parse_layer(raw)?;
        let records = nlink::io::read_basin_table(&path)
            .with_context(|| format!("reading basin table {}", path.display()))?;
        pages_by_n
            .entry(n)
            .or_default()
            .extend(records.iter().map(|r| r.page_id));
    }

    let mut union: BTreeSet<PageId> = BTreeSet::new();
    let mut per_n_rows = Vec::new();
    for (&n, pages) in &pages_by_n {
        let new_pages = pages.difference(&union).count();
        union.extend(pages.iter().copied());
        per_n_rows.push((n, pages.len(), new_pages));
    }

    let pct = |count: usize| {
        args.total_pages
            .filter(|&t| t > 0)
            .map(|t| count as f64 / t as f64 * 100.0)
    };

    if args.json {
        let out = json!({
            "per_n": per_n_rows.iter().map(|&(n, pages, new_pages)| json!({
                "n": n,
                "pages": pages,
                "new_pages": new_pages,
                "coverage_pct": pct(pages),
            })).collect::<Vec<_>>(),
            "union_pages": union.len(),
            "union_coverage_pct": pct(union.len()),
            "total_pages": args.total_pages,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{:>3} | {:>12} | {:>10} | {:>12}", "N", "pages", "coverage", "new pages");
        println!("{}", "-".repeat(50));
        for &(n, pages, new_pages) in &per_n_rows {
            let cov = pct(pages)
                .map(|p| format!("{p:>9.2}%"))
                .unwrap_or_else(|| "       n/a".to_string());
            println!("{n:>3} | {pages:>12} | {cov} | {new_pages:>12}");
        }
        println!("\nUnion across all N: {} pages", union.len());
        if let Some(p) = pct(union.len()) {
            println!("Coverage: {p:.2}%");
        }
    }
    Ok(())
}
