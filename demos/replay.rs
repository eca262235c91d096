//! Replays recorded detections through the pipeline.
//!
//! Input is one JSON `Frame` per line, as dumped by the detection stage:
//! `{"timestamp": 12.04, "vehicles": [{"id": 3, "bbox": [l, t, r, b]}], "plates": [...]}`

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use qspeed::{AlertDispatcher, Config, Frame, LogTransport, Pipeline};
use tracing::warn;

#[derive(Parser)]
#[command(name = "replay", about = "Replay recorded detections and print alerts")]
struct Cli {
    /// JSON lines file with one frame per line
    input: PathBuf,
    /// JSON configuration; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Drop tracks not seen for this many seconds
    #[arg(long, default_value_t = 10.0)]
    max_age: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {:?}", path))?,
        None => Config::default(),
    };

    let dispatcher = AlertDispatcher::spawn(LogTransport, &config.dispatch);
    let mut pipeline = Pipeline::new(config)?;

    let file = std::fs::File::open(&cli.input)
        .with_context(|| format!("opening {:?}", cli.input))?;

    let mut last_ts = 0.0;
    for (lineno, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(line = lineno + 1, "wrong frame format: {}", err);
                continue;
            }
        };

        last_ts = frame.timestamp;

        for alert in pipeline.process_frame(&frame) {
            if let Err(err) = dispatcher.submit(alert) {
                warn!("alert not queued: {}", err);
            }
        }

        for (id, state) in pipeline.prune_stale(frame.timestamp, cli.max_age) {
            println!(
                "{}\t{:.1} km/h\t{}",
                id,
                state.max_speed,
                state.plate_text.as_deref().unwrap_or("N/A")
            );
        }
    }

    dispatcher.submit_all(pipeline.sweep(last_ts + cli.max_age));

    let mut remaining: Vec<_> = pipeline.states().collect();
    remaining.sort_by_key(|(id, _)| **id);
    for (id, state) in remaining {
        println!(
            "{}\t{:.1} km/h\t{}",
            id,
            state.max_speed,
            state.plate_text.as_deref().unwrap_or("N/A")
        );
    }

    let stats = dispatcher.shutdown();
    println!(
        "alerts: {} delivered, {} failed, {} retries",
        stats.delivered, stats.failed, stats.retries
    );

    Ok(())
}
