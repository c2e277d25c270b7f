use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::detect::backend::InferenceProvider;
use crate::detect::result::{
    ClassLabel, InferenceOutput, ObjectObservation, RecognizedObservation,
};
use crate::geometry::NormalizedRect;

/// Stub provider for testing and demos.
///
/// Emits one box per configured label, laid out left to right across the
/// image and drifting slightly on every call. With no labels it reports a
/// single unlabelled box in the centre.
pub struct StubProvider {
    name: String,
    labels: Vec<String>,
    calls: u64,
}

impl StubProvider {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
            calls: 0,
        }
    }

    /// Load a `.stub` model file: one label per line, blank lines and `#`
    /// comments ignored.
    pub fn from_file<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stub model {}", path.display()))?;
        let labels = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Ok(Self::new(name, labels))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn drift(&self) -> f32 {
        (self.calls % 10) as f32 * 0.005
    }
}

impl InferenceProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, _image: &RgbImage) -> Result<InferenceOutput> {
        let drift = self.drift();
        self.calls += 1;

        if self.labels.is_empty() {
            return Ok(InferenceOutput::DetectedUnlabelled(vec![ObjectObservation {
                bbox: NormalizedRect::new(0.25 + drift, 0.25, 0.5, 0.5),
                confidence: 0.5,
            }]));
        }

        let slot = 1.0 / self.labels.len() as f32;
        let observations = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let confidence = 0.9 - 0.1 * (i % 5) as f32;
                RecognizedObservation {
                    bbox: NormalizedRect::new(
                        i as f32 * slot + slot * 0.1 + drift * slot,
                        0.2,
                        slot * 0.7,
                        0.5,
                    ),
                    confidence,
                    labels: vec![ClassLabel {
                        identifier: label.clone(),
                        confidence,
                    }],
                }
            })
            .collect();
        Ok(InferenceOutput::Detected(observations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn image() -> RgbImage {
        RgbImage::new(64, 48)
    }

    #[test]
    fn stub_reports_one_box_per_label_in_order() {
        let mut provider = StubProvider::new("stub", vec!["cat".into(), "dog".into()]);
        let raw = provider.infer(&image()).unwrap().into_raw_detections();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].label.as_deref(), Some("cat"));
        assert_eq!(raw[1].label.as_deref(), Some("dog"));
        for det in &raw {
            assert!(det.bbox.min_x >= 0.0 && det.bbox.min_x + det.bbox.width <= 1.0);
        }
    }

    #[test]
    fn stub_without_labels_is_unlabelled() {
        let mut provider = StubProvider::new("plain", vec![]);
        let output = provider.infer(&image()).unwrap();
        assert!(matches!(output, InferenceOutput::DetectedUnlabelled(ref obs) if obs.len() == 1));
    }

    #[test]
    fn stub_loads_labels_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# coco subset\nperson\n\n car \n").unwrap();
        let provider = StubProvider::from_file("coco", file.path()).unwrap();
        assert_eq!(provider.labels(), ["person".to_string(), "car".to_string()]);
        assert_eq!(provider.name(), "coco");
    }
}
