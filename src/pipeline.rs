//! Capture → inference → overlay plumbing.
//!
//! The live path has one producer and one consumer:
//! - The capture callback runs the [`FrameGate`] inline and hands admitted
//!   frames to a single inference worker through a bounded FIFO queue. A full
//!   queue drops the frame instead of stalling the callback.
//! - The worker runs one inference at a time against the current model and
//!   posts a [`PipelineUpdate`] to the UI channel.
//! - The UI side folds updates into an [`OverlayState`], discarding results
//!   that are out of order or belong to a model that is no longer active.
//!
//! No state is shared between the stages except the [`ModelSlot`] and the two
//! channels.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::annotate::{self, DetectionSet};
use crate::capture::CapturedFrame;
use crate::error::PipelineError;
use crate::gate::{FrameGate, GateStats};
use crate::model::ModelSlot;

/// Result of one inference job, posted to the UI channel.
#[derive(Debug)]
pub enum PipelineUpdate {
    Detections {
        sequence: u64,
        generation: u64,
        model: String,
        set: DetectionSet,
    },
    Failed {
        sequence: u64,
        generation: u64,
        error: PipelineError,
    },
}

impl PipelineUpdate {
    pub fn sequence(&self) -> u64 {
        match self {
            PipelineUpdate::Detections { sequence, .. } | PipelineUpdate::Failed { sequence, .. } => {
                *sequence
            }
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            PipelineUpdate::Detections { generation, .. }
            | PipelineUpdate::Failed { generation, .. } => *generation,
        }
    }
}

/// Run the active model on a still image.
///
/// Unlike the live path, failures are returned so they can be shown to the
/// user.
pub fn detect_still(slot: &ModelSlot, image: &RgbImage) -> Result<DetectionSet, PipelineError> {
    let model = slot.current();
    let start = Instant::now();
    let output = model.infer(image)?;
    let raw = output.into_raw_detections();
    let set = annotate::build(&raw, image.width(), image.height());
    log::info!(
        "{}: {} detection(s) in {} ms",
        model.name,
        set.len(),
        start.elapsed().as_millis()
    );
    Ok(set)
}

fn run_job(slot: &ModelSlot, frame: CapturedFrame) -> PipelineUpdate {
    let model = slot.current();
    let start = Instant::now();
    let (width, height) = frame.image.dimensions();

    match model.infer(&frame.image) {
        Ok(output) => {
            let raw = output.into_raw_detections();
            let set = annotate::build(&raw, width, height);
            log::debug!(
                "frame {}: {} detection(s) from {} in {} ms",
                frame.sequence,
                set.len(),
                model.name,
                start.elapsed().as_millis()
            );
            PipelineUpdate::Detections {
                sequence: frame.sequence,
                generation: model.generation,
                model: model.name.clone(),
                set,
            }
        }
        Err(error) => {
            log::warn!("frame {}: {}", frame.sequence, error);
            PipelineUpdate::Failed {
                sequence: frame.sequence,
                generation: model.generation,
                error,
            }
        }
    }
}

/// Single-threaded inference queue.
pub struct InferenceWorker {
    jobs: Option<SyncSender<CapturedFrame>>,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Start the worker thread.
    ///
    /// `queue_depth` bounds how many admitted frames may wait behind the one
    /// being processed. [`submit`](Self::submit) waits for room;
    /// [`try_submit`](Self::try_submit) does not.
    pub fn spawn(slot: Arc<ModelSlot>, queue_depth: usize) -> Result<(Self, Receiver<PipelineUpdate>)> {
        let (jobs_tx, jobs_rx) = mpsc::sync_channel::<CapturedFrame>(queue_depth);
        let (updates_tx, updates_rx): (Sender<PipelineUpdate>, Receiver<PipelineUpdate>) =
            mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("camml-inference".to_string())
            .spawn(move || {
                for frame in jobs_rx {
                    let update = run_job(&slot, frame);
                    if updates_tx.send(update).is_err() {
                        log::debug!("overlay receiver gone; stopping inference worker");
                        break;
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn inference worker: {}", e))?;

        Ok((
            Self {
                jobs: Some(jobs_tx),
                handle: Some(handle),
            },
            updates_rx,
        ))
    }

    /// Queue a frame for inference, waiting for room if the queue is full.
    pub fn submit(&self, frame: CapturedFrame) -> Result<()> {
        self.jobs()?
            .send(frame)
            .map_err(|_| anyhow!("inference worker stopped"))
    }

    /// Queue a frame without waiting. Returns `false` if the queue is full;
    /// the frame is discarded.
    pub fn try_submit(&self, frame: CapturedFrame) -> Result<bool> {
        match self.jobs()?.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(frame)) => {
                log::debug!("inference queue full; dropping frame {}", frame.sequence);
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("inference worker stopped")),
        }
    }

    fn jobs(&self) -> Result<&SyncSender<CapturedFrame>> {
        self.jobs
            .as_ref()
            .ok_or_else(|| anyhow!("inference worker already shut down"))
    }

    /// Close the queue, let queued frames finish, and join the thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("inference worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("{}", e);
        }
    }
}

/// Producer side of the live pipeline: gate, then enqueue.
pub struct LivePipeline {
    gate: FrameGate,
    worker: InferenceWorker,
}

impl LivePipeline {
    pub fn new(gate: FrameGate, worker: InferenceWorker) -> Self {
        Self { gate, worker }
    }

    /// Offer a captured frame. Returns `false` when the frame was dropped,
    /// either stale or because inference is still busy. Never blocks.
    pub fn offer(&mut self, frame: CapturedFrame) -> Result<bool> {
        self.offer_at(frame, Instant::now())
    }

    /// Offer with an explicit `now` for the staleness check.
    pub fn offer_at(&mut self, frame: CapturedFrame, now: Instant) -> Result<bool> {
        if !self.gate.admit_at(frame.captured_at, now) {
            return Ok(false);
        }
        if !self.worker.try_submit(frame)? {
            self.gate.record_busy();
            return Ok(false);
        }
        Ok(true)
    }

    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    pub fn shutdown(self) -> Result<()> {
        self.worker.shutdown()
    }
}

/// What [`OverlayState::apply`] did with an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The overlay now shows this update.
    Updated,
    /// An equal or newer frame is already displayed.
    Stale,
    /// Produced by a model that has since been replaced.
    InactiveModel,
    /// Inference failed; the previous overlay stays.
    Failed,
}

/// What is currently drawn over the live view.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub sequence: u64,
    pub model: String,
    pub set: DetectionSet,
}

/// Counters kept by the overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub processed: u64,
    pub stale: u64,
    pub inactive: u64,
    pub failed: u64,
}

/// UI-side overlay state.
#[derive(Debug, Default)]
pub struct OverlayState {
    current: Option<Overlay>,
    stats: OverlayStats,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one update into the overlay.
    pub fn apply(&mut self, update: PipelineUpdate, active_generation: u64) -> ApplyOutcome {
        if update.generation() != active_generation {
            self.stats.inactive += 1;
            log::debug!(
                "discarding frame {} from model generation {} (active {})",
                update.sequence(),
                update.generation(),
                active_generation
            );
            return ApplyOutcome::InactiveModel;
        }

        match update {
            PipelineUpdate::Failed { sequence, error, .. } => {
                self.stats.failed += 1;
                log::warn!("frame {} not updated: {}", sequence, error);
                ApplyOutcome::Failed
            }
            PipelineUpdate::Detections {
                sequence,
                model,
                set,
                ..
            } => {
                if self
                    .current
                    .as_ref()
                    .is_some_and(|shown| shown.sequence >= sequence)
                {
                    self.stats.stale += 1;
                    return ApplyOutcome::Stale;
                }
                self.stats.processed += 1;
                self.current = Some(Overlay {
                    sequence,
                    model,
                    set,
                });
                ApplyOutcome::Updated
            }
        }
    }

    pub fn current(&self) -> Option<&Overlay> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> OverlayStats {
        self.stats
    }
}
