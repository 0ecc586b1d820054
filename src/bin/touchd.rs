//! touchd - touch tracking daemon
//!
//! This daemon:
//! 1. Builds a source -> blob tracker pipeline from `TOUCHD_CONFIG` and env
//! 2. Ticks the pipeline with a fixed delay until Ctrl-C (or `--frames`)
//! 3. Follows the touch stream from a separate thread and prints each frame's
//!    records as one JSON line on stdout

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use touch_pipeline::config::{TouchdConfig, TRACKER_ID};
use touch_pipeline::{DataStream, ModuleFactory};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many pipeline ticks.
    #[arg(long)]
    frames: Option<u64>,
    /// Exit with an error on the first pipeline error.
    #[arg(long)]
    test: bool,
    /// Print the description of a module type as JSON and exit.
    #[arg(long, value_name = "MODULE")]
    describe: Option<String>,
    /// List available module types and exit.
    #[arg(long)]
    list: bool,
}

struct ConsumerReport {
    frames: u64,
    skipped: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let factory = ModuleFactory::with_builtin();

    if args.list {
        for name in factory.list() {
            println!("{}", name);
        }
        return Ok(());
    }
    if let Some(name) = &args.describe {
        let description = factory.describe(name)?;
        println!("{}", serde_json::to_string_pretty(&description)?);
        return Ok(());
    }

    let cfg = TouchdConfig::load()?;
    let mut pipeline = cfg.build_pipeline(&factory)?;
    let touches = pipeline
        .module(TRACKER_ID)
        .and_then(|tracker| tracker.output(1))
        .ok_or_else(|| anyhow!("tracker module has no touch output"))?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let done = Arc::new(AtomicBool::new(false));
    let consumer = {
        let done = done.clone();
        let poll_every = (cfg.delay / 2).max(Duration::from_millis(1));
        thread::spawn(move || follow_touches(&touches, &done, poll_every))
    };

    log::info!(
        "touchd running: source={} {}x{}, min_size={} max_size={} min_age={} max_age={}, delay={}ms",
        cfg.source.kind,
        cfg.source.synthetic.width,
        cfg.source.synthetic.height,
        cfg.tracker.min_size,
        cfg.tracker.max_size,
        cfg.tracker.min_age,
        cfg.tracker.max_age,
        cfg.delay.as_millis()
    );
    pipeline.start();

    let mut ticks = 0u64;
    let mut last_health_log = Instant::now();
    let mut failure = None;
    loop {
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received, stopping pipeline...");
            break;
        }
        if args.frames.is_some_and(|limit| ticks >= limit) {
            break;
        }
        thread::sleep(cfg.delay);

        if pipeline.is_started() {
            pipeline.poll();
            ticks += 1;
            if let Some((id, error)) = pipeline.last_error() {
                log::error!("pipeline error in {}: {}", id, error);
                if args.test {
                    failure = Some(anyhow!("pipeline error in {}: {}", id, error));
                    break;
                }
                if let Some(module) = pipeline.module_mut(&id) {
                    module.take_error();
                }
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            if let Some(tracker) = pipeline.module(TRACKER_ID) {
                let stats = tracker.core().stats();
                log::info!(
                    "tracker running={} frames={} avg_ms={:.3} fps={:.1}",
                    tracker.is_started(),
                    stats.frames,
                    stats.average_process_ms,
                    stats.average_fps
                );
            }
            last_health_log = Instant::now();
        }
    }

    pipeline.stop();
    done.store(true, Ordering::Release);
    let report = consumer
        .join()
        .map_err(|_| anyhow!("touch consumer thread panicked"))?;
    log::info!(
        "touchd stopped after {} ticks: {} touch frames delivered, {} skipped",
        ticks,
        report.frames,
        report.skipped
    );
    log::debug!("{}", serde_json::to_string(&pipeline.status())?);

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Print every touch payload we get to see; count the ones we missed.
fn follow_touches(stream: &DataStream, done: &AtomicBool, poll_every: Duration) -> ConsumerReport {
    let mut report = ConsumerReport {
        frames: 0,
        skipped: 0,
    };
    let mut seen = stream.sequence();
    while !done.load(Ordering::Acquire) {
        if let Some(line) = next_touch_line(stream, &mut seen, &mut report) {
            println!("{}", line);
        }
        thread::sleep(poll_every);
    }
    report
}

/// Encode the newest touch payload if it is new to us. Only the encoding runs
/// under the stream guard; printing happens after it is released.
fn next_touch_line(
    stream: &DataStream,
    seen: &mut u64,
    report: &mut ConsumerReport,
) -> Option<String> {
    let guard = stream.lock();
    let sequence = guard.sequence();
    if sequence <= *seen {
        return None;
    }
    report.skipped += sequence - *seen - 1;
    *seen = sequence;
    let touches = guard.data().and_then(|p| p.as_touches())?;
    report.frames += 1;
    match serde_json::to_string(touches) {
        Ok(line) => Some(line),
        Err(e) => {
            log::warn!("failed to encode touches: {}", e);
            None
        }
    }
}
