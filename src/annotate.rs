//! Detection set builder.
//!
//! Turns the raw detections of one frame into a [`DetectionSet`] ready for
//! drawing: pixel-space boxes plus a colour per label. This is a pure format
//! conversion. It does not sort, threshold, or deduplicate.

use image::Rgb;

use crate::color::colorize;
use crate::detect::RawDetection;
use crate::geometry::{normalize, PixelRect};

/// One detection, post-processed for rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedDetection {
    pub bbox: PixelRect,
    pub confidence: f32,
    pub label: Option<String>,
    pub color: Rgb<u8>,
}

/// All detections for exactly one frame or image, in model order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<AnnotatedDetection>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotatedDetection> {
        self.detections.iter()
    }

    /// Labels in display order (`None` for unlabelled detections).
    pub fn labels(&self) -> Vec<Option<&str>> {
        self.detections.iter().map(|d| d.label.as_deref()).collect()
    }
}

/// Build the detection set for one frame.
///
/// Detections with malformed geometry are logged and skipped; the rest keep
/// their input order.
pub fn build(raw: &[RawDetection], image_width: u32, image_height: u32) -> DetectionSet {
    let mut detections = Vec::with_capacity(raw.len());

    for (index, detection) in raw.iter().enumerate() {
        let bbox = match normalize(&detection.bbox, image_width, image_height) {
            Ok(bbox) => bbox,
            Err(e) => {
                log::warn!("skipping detection #{}: {}", index, e);
                continue;
            }
        };
        let label = detection.label.clone().filter(|l| !l.is_empty());
        detections.push(AnnotatedDetection {
            bbox,
            confidence: detection.confidence,
            color: colorize(label.as_deref()),
            label,
        });
    }

    DetectionSet {
        width: image_width,
        height: image_height,
        detections,
    }
}
