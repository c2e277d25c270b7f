//! camml - camera object-detection overlay
//!
//! This crate turns raw detection-model output into colour-coded, screen-space
//! annotations and drives the live capture loop that feeds the model.
//!
//! # Architecture
//!
//! A frame flows through the pipeline in one direction:
//!
//! 1. **Capture**: a source stamps each frame with its capture time.
//! 2. **Frame-Rate Gate**: stale frames are dropped before any work is queued.
//! 3. **Inference**: one worker thread runs the active model, one frame at a time.
//! 4. **Annotation**: boxes are flipped to top-left origin, scaled to pixels,
//!    and coloured by label.
//! 5. **Overlay**: the UI side keeps the newest result from the active model.
//!
//! # Module Structure
//!
//! - `geometry`, `color`, `annotate`, `gate`: the pure detection-set pipeline
//! - `detect`: inference providers and the model catalog
//! - `model`: the active model handle shared by picker and worker
//! - `capture`, `pipeline`: live frame plumbing
//! - `photo`: decoding still photos upright
//! - `render`: drawing captioned overlays onto images
//! - `config`: file + environment configuration

pub mod annotate;
pub mod capture;
pub mod color;
pub mod config;
pub mod detect;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod model;
pub mod photo;
pub mod pipeline;
pub mod render;

pub use annotate::{build, AnnotatedDetection, DetectionSet};
pub use capture::{CaptureConfig, CaptureSource, CapturedFrame};
pub use color::{colorize, DEFAULT_COLOR};
pub use config::CammlConfig;
pub use detect::{
    default_factory, display_name, InferenceOutput, InferenceProvider, ModelCatalog, ModelEntry,
    ProviderFactory, RawDetection, StubProvider,
};
pub use error::PipelineError;
pub use gate::{frame_interval_for_fps, should_process, FrameGate, GateStats};
pub use geometry::{normalize, NormalizedRect, PixelRect};
pub use model::{ActiveModel, ModelSlot};
pub use photo::{open_upright, Orientation};
pub use pipeline::{
    detect_still, ApplyOutcome, InferenceWorker, LivePipeline, Overlay, OverlayState,
    PipelineUpdate,
};
pub use render::{caption, render, RenderMode, RenderOptions};
