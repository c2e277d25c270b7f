use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::render::{RenderMode, RenderOptions};

const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_MODEL_EXTENSIONS: &[&str] = &["onnx", "stub"];
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_FPS: u32 = 2;
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_QUEUE_DEPTH: usize = 1;
const DEFAULT_THICKNESS: u32 = 3;
const DEFAULT_BLUR_SIGMA: f32 = 12.0;
const DEFAULT_FONT_SIZE: f32 = 16.0;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_HEALTH_SECS: u64 = 5;
const MAX_FPS: u32 = 240;

#[derive(Debug, Deserialize, Default)]
struct CammlConfigFile {
    models: Option<ModelsConfigFile>,
    capture: Option<CaptureConfigFile>,
    render: Option<RenderConfigFile>,
    health_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelsConfigFile {
    dir: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    preferred: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    source: Option<String>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    queue_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    mode: Option<RenderMode>,
    thickness: Option<u32>,
    blur_sigma: Option<f32>,
    show_labels: Option<bool>,
    font_size: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct CammlConfig {
    pub models: ModelSettings,
    pub capture: CaptureSettings,
    pub render: RenderOptions,
    pub health_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub dir: PathBuf,
    pub extensions: Vec<String>,
    pub preferred: Option<String>,
    pub input_width: u32,
    pub input_height: u32,
    /// Detections scored below this are discarded by the ONNX backend.
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub source: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub queue_depth: usize,
}

impl CammlConfig {
    /// Defaults, then the file named by `CAMML_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAMML_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CammlConfigFile) -> Self {
        let models = file.models.unwrap_or_default();
        let capture = file.capture.unwrap_or_default();
        let render = file.render.unwrap_or_default();

        Self {
            models: ModelSettings {
                dir: models
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR)),
                extensions: models.extensions.unwrap_or_else(|| {
                    DEFAULT_MODEL_EXTENSIONS
                        .iter()
                        .map(|ext| ext.to_string())
                        .collect()
                }),
                preferred: models.preferred,
                input_width: models.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
                input_height: models.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
                confidence_threshold: models
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            },
            capture: CaptureSettings {
                source: capture
                    .source
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                fps: capture.fps.unwrap_or(DEFAULT_FPS),
                width: capture.width.unwrap_or(DEFAULT_WIDTH),
                height: capture.height.unwrap_or(DEFAULT_HEIGHT),
                queue_depth: capture.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
            },
            render: RenderOptions {
                mode: render.mode.unwrap_or_default(),
                thickness: render.thickness.unwrap_or(DEFAULT_THICKNESS),
                blur_sigma: render.blur_sigma.unwrap_or(DEFAULT_BLUR_SIGMA),
                show_labels: render.show_labels.unwrap_or(true),
                font_size: render.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            },
            health_interval: Duration::from_secs(
                file.health_interval_secs.unwrap_or(DEFAULT_HEALTH_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CAMML_MODELS_DIR") {
            if !dir.trim().is_empty() {
                self.models.dir = PathBuf::from(dir);
            }
        }
        if let Ok(model) = std::env::var("CAMML_MODEL") {
            if !model.trim().is_empty() {
                self.models.preferred = Some(model.trim().to_string());
            }
        }
        if let Ok(source) = std::env::var("CAMML_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.source = source;
            }
        }
        if let Ok(fps) = std::env::var("CAMML_FPS") {
            self.capture.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAMML_FPS must be a whole number of frames per second"))?;
        }
        if let Ok(mode) = std::env::var("CAMML_RENDER_MODE") {
            if !mode.trim().is_empty() {
                self.render.mode = mode.parse()?;
            }
        }
        Ok(())
    }

    /// Check ranges and normalize extensions. Call again after applying
    /// command-line overrides.
    pub fn validate(&mut self) -> Result<()> {
        if self.capture.fps == 0 || self.capture.fps > MAX_FPS {
            return Err(anyhow!(
                "capture fps must be between 1 and {}, got {}",
                MAX_FPS,
                self.capture.fps
            ));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        if self.models.input_width == 0 || self.models.input_height == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if self.capture.queue_depth == 0 {
            return Err(anyhow!("capture queue_depth must be at least 1"));
        }
        if self.render.thickness == 0 {
            return Err(anyhow!("render thickness must be at least 1"));
        }
        if !self.render.font_size.is_finite() || self.render.font_size <= 0.0 {
            return Err(anyhow!("render font_size must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.models.confidence_threshold) {
            return Err(anyhow!(
                "models confidence_threshold must be within 0..=1, got {}",
                self.models.confidence_threshold
            ));
        }

        self.models.extensions = self
            .models
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if self.models.extensions.is_empty() {
            return Err(anyhow!("at least one model file extension is required"));
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            source: self.capture.source.clone(),
            fps: self.capture.fps,
            width: self.capture.width,
            height: self.capture.height,
        }
    }
}

fn read_config_file(path: &Path) -> Result<CammlConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
