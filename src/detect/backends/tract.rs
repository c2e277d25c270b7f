#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceProvider;
use crate::detect::decode::decode_rows;
use crate::detect::result::InferenceOutput;

/// Tract-based provider for ONNX detectors.
///
/// The model takes a `1x3xHxW` float tensor in [0,1] and returns rows of
/// `(cx, cy, w, h, score, class)` normalized to the input, top-left origin.
/// Class names come from an optional `<model stem>.labels` file next to the
/// model, one name per line.
pub struct TractProvider {
    name: String,
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    labels: Vec<String>,
    confidence_threshold: f32,
}

impl TractProvider {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(
        name: impl Into<String>,
        model_path: P,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels = load_labels(&labels_path(model_path))?;
        log::info!(
            "tract: loaded {} ({}x{}, {} labels)",
            model_path.display(),
            width,
            height,
            labels.len()
        );

        Ok(Self {
            name: name.into(),
            model,
            width,
            height,
            labels,
            confidence_threshold: 0.25,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized;
        let image = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            resized = image::imageops::resize(image, self.width, self.height, FilterType::Triangle);
            &resized
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<InferenceOutput> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let values: Vec<f32> = view.iter().copied().collect();
        decode_rows(output.shape(), &values, self.confidence_threshold, &self.labels)
    }
}

impl InferenceProvider for TractProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, image: &RgbImage) -> Result<InferenceOutput> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }
}

fn labels_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("labels")
}

fn load_labels(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
