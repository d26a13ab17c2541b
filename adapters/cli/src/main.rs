#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs an epiwalk simulation in the terminal.

mod args;
mod report;
mod terminal;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use epiwalk_simulation::Simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    args::Args,
    terminal::{Console, TerminalBackend},
};

/// Entry point for the epiwalk command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.resolve()?;

    let simulation = Simulation::new(config).context("failed to initialise simulation")?;
    let backend = TerminalBackend::new(
        io::stdout(),
        usize::from(args.frame_columns),
        usize::from(args.frame_rows),
    )
    .with_color(args.color);
    let mut console = Console::new(backend, io::stdout(), args.render_every, args.progress_every);
    let summary = simulation
        .run_with(&mut console)
        .context("simulation aborted")?;

    report::write_table(&mut io::stdout().lock(), &summary)?;
    if let Some(path) = &args.metrics_json {
        report::write_json(path, &summary)?;
        info!(path = %path.display(), "metrics exported");
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
