// SPDX-License-Identifier: MIT OR Apache-2.0
//! `scrollstage` - scenario replay for the scroll stage engine
//!
//! Loads a RON scenario (engine config, layout, sections and a timed script
//! of host events), replays it frame by frame and logs every section update.
//! With `--json` the updates and media writes are printed to stdout as JSON
//! lines for diffing against a known-good run.

mod replay;
mod scenario;

use clap::Parser;
use scenario::{Scenario, ScenarioError};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "scrollstage")]
#[command(version, about = "Replay a scroll stage scenario and report section updates")]
struct Args {
    /// RON scenario file
    scenario: PathBuf,

    /// Print updates and media writes to stdout as JSON lines
    #[arg(long)]
    json: bool,
}

fn run(args: &Args) -> Result<(), ScenarioError> {
    let scenario = Scenario::load(&args.scenario)?;
    let events = replay::run(&scenario)?;
    if args.json {
        let stdout = std::io::stdout();
        replay::write_json_lines(&events, &mut stdout.lock())?;
    }
    Ok(())
}

fn main() {
    // Logs go to stderr so JSON output stays clean
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    tracing::info!("scrollstage v{} replaying {:?}", env!("CARGO_PKG_VERSION"), args.scenario);

    if let Err(e) = run(&args) {
        tracing::error!("Replay failed: {e}");
        std::process::exit(1);
    }
}
