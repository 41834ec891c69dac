use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::{info, warn};
use voxfield_core::events::{self, EventReceiver};
use voxfield_world::{ChannelSink, GeometryEvent, WorldIndex, WorldSettings};

const TICK_RATE: u32 = 20;
const TICK_DURATION: Duration = Duration::from_millis(1000 / TICK_RATE as u64);
const OBSERVER_HEIGHT: f32 = 80.0;
const SUMMARY_INTERVAL_TICKS: u64 = TICK_RATE as u64 * 5;

struct Options {
    settings_path: Option<PathBuf>,
    ticks: Option<u64>,
    speed: f32,
}

#[derive(Debug, Default)]
struct ConsumerStats {
    upserts: u64,
    removes: u64,
    triangles: u64,
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut options = Options {
        settings_path: None,
        ticks: None,
        speed: 4.0,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(value) = args.next() else {
                    eprintln!("--settings expects a path argument");
                    std::process::exit(2);
                };
                options.settings_path = Some(PathBuf::from(value));
            }
            "--ticks" => {
                let Some(value) = args.next() else {
                    eprintln!("--ticks expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u64>() {
                    Ok(parsed) => options.ticks = Some(parsed),
                    Err(err) => {
                        eprintln!("invalid tick count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--speed" => {
                let Some(value) = args.next() else {
                    eprintln!("--speed expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<f32>() {
                    Ok(parsed) if parsed.is_finite() => options.speed = parsed,
                    Ok(_) => {
                        eprintln!("invalid speed '{value}': must be finite");
                        std::process::exit(2);
                    }
                    Err(err) => {
                        eprintln!("invalid speed '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--help" | "-h" => {
                println!(
                    "Usage: voxfield_headless [--settings <path>] [--ticks <n>] [--speed <blocks/tick>]"
                );
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, stopping...");
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(options, running) {
        eprintln!("voxfield_headless failed: {err}");
        std::process::exit(1);
    }
}

fn run(options: Options, running: Arc<AtomicBool>) -> Result<(), String> {
    let settings = match options.settings_path.as_deref() {
        Some(path) => load_settings(path)?,
        None => WorldSettings::default(),
    };

    let (tx, rx) = events::channel();
    let consumer = thread::Builder::new()
        .name("geometry-consumer".to_string())
        .spawn(move || consume_geometry(rx))
        .map_err(|err| format!("failed to spawn geometry consumer: {err}"))?;

    let mut world = WorldIndex::new(settings, ChannelSink::new(tx)).map_err(|err| err.to_string())?;
    info!(
        "Streaming world (seed {:#x}, render distance {}) at {} blocks/tick",
        world.settings().seed,
        world.settings().render_distance,
        options.speed
    );

    let mut observer = Vec3::new(0.0, OBSERVER_HEIGHT, 0.0);
    let mut generated_total = 0usize;
    let mut evicted_total = 0usize;
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        if options.ticks.is_some_and(|limit| world.tick() >= limit) {
            break;
        }
        let tick_start = Instant::now();

        let report = world.load_around(observer);
        generated_total += report.generated;
        evicted_total += report.evicted;
        observer.x += options.speed;

        if world.tick() % SUMMARY_INTERVAL_TICKS == 0 {
            info!(
                "Tick {}: observer chunk ({}, {}), {} resident, {} pending",
                world.tick(),
                report.observer_chunk.x,
                report.observer_chunk.z,
                world.resident_count(),
                report.pending
            );
        }

        let elapsed = tick_start.elapsed();
        if elapsed < TICK_DURATION {
            thread::sleep(TICK_DURATION - elapsed);
        }
    }

    let ticks = world.tick();
    let resident = world.resident_count();
    let dropped = world.sink().dropped();
    // Dropping the world closes the channel and lets the consumer finish.
    drop(world);
    let stats = consumer
        .join()
        .map_err(|_| "geometry consumer panicked".to_string())?;

    if dropped > 0 {
        warn!("{dropped} geometry events were not delivered");
    }
    info!(
        "Ran {ticks} ticks in {:.1}s: generated {generated_total}, evicted {evicted_total}, {resident} resident",
        started.elapsed().as_secs_f32()
    );
    info!(
        "Consumer saw {} uploads, {} removals, {} triangles uploaded",
        stats.upserts, stats.removes, stats.triangles
    );
    Ok(())
}

fn load_settings(path: &Path) -> Result<WorldSettings, String> {
    match WorldSettings::load(path) {
        Ok(settings) => Ok(settings),
        Err(err) if err.is_not_found() => {
            warn!(
                "Settings file {} not found, using defaults",
                path.display()
            );
            Ok(WorldSettings::default())
        }
        Err(err) => Err(err.to_string()),
    }
}

fn consume_geometry(rx: EventReceiver<GeometryEvent>) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    while let Ok(event) = rx.recv() {
        match event {
            GeometryEvent::Upsert { geometry, .. } => {
                stats.upserts += 1;
                stats.triangles += geometry.triangle_count() as u64;
            }
            GeometryEvent::Remove { .. } => stats.removes += 1,
        }
    }
    stats
}
