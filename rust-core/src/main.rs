//! StepX replay tool
//!
//! Feeds a recorded sample stream through the step engine and prints the
//! final snapshot as JSON.
//!
//! Usage:
//!   stepx-replay <samples.jsonl> [config.json]
//!
//! Each input line is one `RawSample`, e.g.
//! `{"timestamp_ms":1000,"kind":"step_counter","cumulative":5004}`.
//! Blank lines and lines starting with `#` are skipped.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stepx_sensing::{EngineConfig, InMemoryStore, RawSample, SharedSettings, StepEngine};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(samples_path) = args.next().map(PathBuf::from) else {
        bail!("usage: stepx-replay <samples.jsonl> [config.json]");
    };

    let config = match args.next() {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            EngineConfig::from_json_str(&text).with_context(|| format!("loading config {path}"))?
        }
        None => EngineConfig::default(),
    };

    let file = fs::File::open(&samples_path)
        .with_context(|| format!("opening {}", samples_path.display()))?;

    let store = InMemoryStore::new(0);
    let mut engine = StepEngine::new(config, store.clone(), SharedSettings::with_defaults())?;

    let mut events = 0usize;
    let mut skipped = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<RawSample>(line) {
            Ok(sample) => {
                if engine.process_sample(&sample).is_some() {
                    events += 1;
                }
            }
            Err(err) => {
                warn!(line = index + 1, %err, "skipping unparseable sample");
                skipped += 1;
            }
        }
    }

    info!(
        samples = engine.samples_processed(),
        events,
        skipped,
        persisted = store.total(),
        "replay finished"
    );

    println!("{}", serde_json::to_string_pretty(&engine.outputs())?);
    Ok(())
}
