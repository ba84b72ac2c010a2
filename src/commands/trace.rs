use anyhow::Result;
use clap::Args;
use nlink::{CycleKey, TerminalKind, trace};
use serde_json::json;

/// Trace start pages to their terminal cycles across one or more N values.
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Successor-pair layer as N=PATH (repeatable)
    #[arg(long = "layer", value_name = "N=PATH", required = true)]
    pub layers: Vec<String>,
    /// Start page ids to trace (repeatable)
    #[arg(long = "page-id", required = true)]
    pub page_ids: Vec<u64>,
    /// Step budget per trace
    #[arg(long, default_value_t = 500)]
    pub max_steps: usize,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &TraceArgs) -> Result<()> {
    let mut layers: Vec<(u32, std::path::PathBuf)> = args
        .layers
        .iter()
        .map(|raw| super::parse_layer(raw))
        .collect::<Result<_>>()?;
    layers.sort_by_key(|&(n, _)| n);

    let mut rows = Vec::new();
    for (n, path) in &layers {
        let index = super::load_index(*n, path)?;
        for &start in &args.page_ids {
            let t = trace(&index, start, args.max_steps);
            let cycle_key = if t.kind == TerminalKind::Cycle {
                CycleKey::new(t.cycle.iter().copied()).to_string()
            } else {
                "-".to_string()
            };
            rows.push((*n, start, t.kind, t.steps, t.cycle.len(), cycle_key));
        }
    }

    if args.json {
        let out: Vec<_> = rows
            .iter()
            .map(|(n, start, kind, steps, cycle_len, cycle_key)| {
                json!({
                    "n": n,
                    "start": start,
                    "terminal": kind.to_string(),
                    "steps": steps,
                    "cycle_len": cycle_len,
                    "cycle": cycle_key,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{:>3} | {:>12} | {:<10} | {:>5} | {:>9} | cycle",
            "N", "start", "terminal", "steps", "cycle len"
        );
        println!("{}", "-".repeat(70));
        for (n, start, kind, steps, cycle_len, cycle_key) in &rows {
            println!(
                "{n:>3} | {start:>12} | {:<10} | {steps:>5} | {cycle_len:>9} | {cycle_key}",
                kind.to_string()
            );
        }
    }
    Ok(())
}
