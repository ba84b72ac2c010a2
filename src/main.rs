use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "nla",
    about = "N-link functional graph analysis: traces, basins, tunnel nodes",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trace start pages to their terminal cycles across N values
    Trace(commands::trace::TraceArgs),
    /// Discover cycles and map their basins for one N
    Basins(commands::basins::BasinsArgs),
    /// Assemble per-N basin tables into the tunnel classification
    Multiplex(commands::multiplex::MultiplexArgs),
    /// Union coverage of basin structure across N values
    Coverage(commands::coverage::CoverageArgs),
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match &cli.command {
        Command::Trace(args) => commands::trace::run(args),
        Command::Basins(args) => commands::basins::run(args),
        Command::Multiplex(args) => commands::multiplex::run(args),
        Command::Coverage(args) => commands::coverage::run(args),
    }
}
