//! hostpulse - periodic host telemetry collection.
//!
//! Samples CPU, memory, storage, network and power state on a fixed
//! interval, prints a report per cycle and keeps a run log.

use anyhow::{Context, Result};
use clap::Parser;
use hostpulse::display::render_report;
use hostpulse::{logging, CollectorConfig, TelemetryCollector};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Periodic host telemetry: CPU, memory, storage, network and power
#[derive(Parser, Debug)]
#[command(name = "hostpulse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Collection interval in seconds
    #[arg(short = 'i', long, default_value = "10")]
    interval: u64,

    /// CPU sampling window in seconds
    #[arg(long, default_value = "1.0")]
    sample_window: f64,

    /// Directory for run logs
    #[arg(long, default_value = "telemetry_logs")]
    log_dir: PathBuf,

    /// Do not write a run log
    #[arg(long)]
    no_log: bool,

    /// Stop after this many cycles (default: run until interrupted)
    #[arg(short, long)]
    count: Option<u64>,

    /// Print each snapshot as JSON instead of the report
    #[arg(long)]
    json: bool,
}

/// Sleep for `duration` in short slices, returning early once `running` clears
fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let sample_window = Duration::try_from_secs_f64(args.sample_window)
        .context("--sample-window must be a non-negative number of seconds")?;

    if !args.no_log {
        let path = logging::init(&args.log_dir)?;
        eprintln!("Logging to: {}", path.display());
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Failed to install interrupt handler")?;
    }

    let mut collector = TelemetryCollector::new(CollectorConfig { sample_window });
    let interval = Duration::from_secs(args.interval);

    println!("Collecting telemetry every {} seconds...", args.interval);

    let mut cycle: u64 = 0;
    while running.load(Ordering::SeqCst) {
        let snapshot = collector.collect_all();
        cycle += 1;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            print!("{}", render_report(cycle, &snapshot));
        }

        if args.count.is_some_and(|count| cycle >= count) {
            break;
        }
        sleep_while_running(interval, &running);
    }

    println!("\nTelemetry collection stopped.");
    log::logger().flush();
    Ok(())
}
