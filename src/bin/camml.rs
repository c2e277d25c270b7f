//! camml - live detection overlay
//!
//! This daemon:
//! 1. Captures frames from the configured source at the nominal frame rate
//! 2. Drops stale frames, and frames arriving while inference is busy, in the
//!    capture callback
//! 3. Runs the active model on admitted frames, one at a time
//! 4. Keeps the newest overlay from the active model
//! 5. Accepts model names on stdin to switch models while running

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camml::{
    default_factory, frame_interval_for_fps, render, ApplyOutcome, CaptureSource, CapturedFrame,
    CammlConfig, FrameGate, GateStats, InferenceWorker, LivePipeline, ModelCatalog, ModelSlot,
    OverlayState, PipelineUpdate, ProviderFactory, RenderOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live object-detection overlay")]
struct Args {
    /// Capture source: stub://<name> or a directory of images.
    #[arg(long, env = "CAMML_SOURCE")]
    source: Option<String>,
    /// Nominal capture rate.
    #[arg(long, env = "CAMML_FPS")]
    fps: Option<u32>,
    /// Model display name to start with.
    #[arg(long, env = "CAMML_MODEL")]
    model: Option<String>,
    /// Directory holding model files.
    #[arg(long, env = "CAMML_MODELS_DIR")]
    models_dir: Option<PathBuf>,
    /// Stop after this many captured frames (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    frames: u64,
    /// Write each new overlay layer as a PNG into this directory.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = CammlConfig::load()?;
    if let Some(source) = args.source {
        cfg.capture.source = source;
    }
    if let Some(fps) = args.fps {
        cfg.capture.fps = fps;
    }
    if let Some(dir) = args.models_dir {
        cfg.models.dir = dir;
    }
    if args.model.is_some() {
        cfg.models.preferred = args.model;
    }
    cfg.validate()?;
    if let Some(dir) = &args.dump_dir {
        std::fs::create_dir_all(dir)?;
    }

    let catalog = ModelCatalog::scan(&cfg.models.dir, &cfg.models.extensions)?;
    let factory = default_factory(
        cfg.models.input_width,
        cfg.models.input_height,
        cfg.models.confidence_threshold,
    );
    // No model at startup is fatal.
    let slot = Arc::new(ModelSlot::start(
        &catalog,
        factory.as_ref(),
        cfg.models.preferred.as_deref(),
    )?);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to set Ctrl-C handler: {}", e))?;
    }

    let (worker, updates) = InferenceWorker::spawn(Arc::clone(&slot), cfg.capture.queue_depth)?;
    let live = LivePipeline::new(FrameGate::for_fps(cfg.capture.fps), worker);

    let (camera_tx, camera_rx) = mpsc::channel();
    let camera = spawn_camera(
        CaptureSource::new(cfg.capture_config())?,
        cfg.capture.fps,
        args.frames,
        Arc::clone(&running),
        camera_tx,
    )?;
    let callback = spawn_callback(live, camera_rx, cfg.health_interval)?;
    let picks = spawn_model_picker();

    log::info!(
        "camml running: source={} fps={} model={} (type a model name + Enter to switch; {})",
        cfg.capture.source,
        cfg.capture.fps,
        slot.current().name,
        catalog.names().join(", ")
    );

    run_overlay(
        &slot,
        &catalog,
        factory.as_ref(),
        &updates,
        &picks,
        &cfg.render,
        args.dump_dir.as_ref(),
        cfg.health_interval,
    )?;

    running.store(false, Ordering::SeqCst);
    let captured = camera
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))??;
    let gate = callback
        .join()
        .map_err(|_| anyhow!("capture callback panicked"))??;
    log::info!(
        "camml stopped: captured={} admitted={} dropped={} busy={}",
        captured,
        gate.admitted,
        gate.dropped,
        gate.busy
    );
    Ok(())
}

/// Camera: captures at the nominal rate and hands frames to the callback.
fn spawn_camera(
    mut source: CaptureSource,
    fps: u32,
    limit: u64,
    running: Arc<AtomicBool>,
    frames: Sender<CapturedFrame>,
) -> Result<JoinHandle<Result<u64>>> {
    let interval = frame_interval_for_fps(fps);
    std::thread::Builder::new()
        .name("camml-camera".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                let started = Instant::now();
                let frame = source.next_frame()?;
                let sequence = frame.sequence;
                if frames.send(frame).is_err() {
                    break;
                }
                if limit > 0 && sequence >= limit {
                    break;
                }
                if let Some(rest) = interval.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
            Ok(source.stats().frames_captured)
        })
        .map_err(|e| anyhow!("failed to spawn capture thread: {}", e))
}

/// Capture callback: gate each frame inline, enqueue the admitted ones.
/// Never waits on inference; a busy worker means the frame is dropped.
fn spawn_callback(
    mut live: LivePipeline,
    frames: Receiver<CapturedFrame>,
    health_interval: Duration,
) -> Result<JoinHandle<Result<GateStats>>> {
    std::thread::Builder::new()
        .name("camml-callback".to_string())
        .spawn(move || {
            let mut last_health_log = Instant::now();
            for frame in frames {
                live.offer(frame)?;
                if last_health_log.elapsed() >= health_interval {
                    let stats = live.gate_stats();
                    log::info!(
                        "gate admitted={} dropped={} busy={}",
                        stats.admitted,
                        stats.dropped,
                        stats.busy
                    );
                    last_health_log = Instant::now();
                }
            }
            let stats = live.gate_stats();
            live.shutdown()?;
            Ok(stats)
        })
        .map_err(|e| anyhow!("failed to spawn capture callback: {}", e))
}

/// Model picker: each non-empty stdin line is a model name.
fn spawn_model_picker() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("camml-picker".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let name = line.trim();
                if !name.is_empty() && tx.send(name.to_string()).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("model picker unavailable: {}", e);
    }
    rx
}

#[allow(clippy::too_many_arguments)]
fn run_overlay(
    slot: &ModelSlot,
    catalog: &ModelCatalog,
    factory: &ProviderFactory,
    updates: &Receiver<PipelineUpdate>,
    picks: &Receiver<String>,
    render_options: &RenderOptions,
    dump_dir: Option<&PathBuf>,
    health_interval: Duration,
) -> Result<()> {
    let mut overlay = OverlayState::new();
    let mut last_health_log = Instant::now();

    loop {
        match updates.recv_timeout(Duration::from_millis(100)) {
            Ok(update) => {
                if overlay.apply(update, slot.generation()) == ApplyOutcome::Updated {
                    if let (Some(dir), Some(shown)) = (dump_dir, overlay.current()) {
                        let mut layer = image::RgbImage::new(shown.set.width, shown.set.height);
                        render(&mut layer, &shown.set, render_options);
                        let path = dir.join(format!("overlay_{:06}.png", shown.sequence));
                        if let Err(e) = layer.save(&path) {
                            log::warn!("failed to write {}: {}", path.display(), e);
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        loop {
            match picks.try_recv() {
                Ok(name) => match slot.select(catalog, factory, &name) {
                    Ok(model) => log::info!("switched to model {}", model.name),
                    Err(e) => log::error!("model switch failed: {}", e),
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if last_health_log.elapsed() >= health_interval {
            let stats = overlay.stats();
            log::info!(
                "{} frames processed (stale={} inactive={} failed={}) model={}",
                stats.processed,
                stats.stale,
                stats.inactive,
                stats.failed,
                slot.current().name
            );
            last_health_log = Instant::now();
        }
    }
    Ok(())
}
