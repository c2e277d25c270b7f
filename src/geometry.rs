//! Bounding-box geometry.
//!
//! Models report boxes normalized to [0,1] with the origin at the bottom-left
//! corner of the image. Everything downstream (overlay, renderer) works in
//! pixels with the origin at the top-left corner. `normalize` is the single
//! place where that conversion happens.

use crate::error::PipelineError;

/// Box in normalized model space: [0,1] on both axes, bottom-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRect {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(min_x: f32, min_y: f32, width: f32, height: f32) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    pub fn max_y(&self) -> f32 {
        self.min_y + self.height
    }

    fn is_well_formed(&self) -> bool {
        let finite = [self.min_x, self.min_y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        finite && self.width >= 0.0 && self.height >= 0.0
    }
}

/// Box in image pixels, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Inverse of [`normalize`]: back to bottom-left origin, [0,1] space.
    pub fn to_normalized(&self, image_width: u32, image_height: u32) -> NormalizedRect {
        let w = image_width as f32;
        let h = image_height as f32;
        let width = self.width / w;
        let height = self.height / h;
        let top = self.y / h;
        NormalizedRect {
            min_x: self.x / w,
            min_y: 1.0 - top - height,
            width,
            height,
        }
    }

    /// Integer pixel bounds `(x1, y1, x2, y2)` clipped to the image, inclusive
    /// on the near edge and exclusive on the far edge. `None` when the box
    /// does not overlap the image at all.
    pub fn clamped_bounds(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let max_w = image_width as f32;
        let max_h = image_height as f32;
        let x1 = self.x.clamp(0.0, max_w).floor();
        let y1 = self.y.clamp(0.0, max_h).floor();
        let x2 = self.max_x().clamp(0.0, max_w).ceil();
        let y2 = self.max_y().clamp(0.0, max_h).ceil();
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1 as u32, y1 as u32, x2 as u32, y2 as u32))
    }
}

/// Convert a model-reported box into top-left-origin pixel coordinates.
///
/// Malformed boxes (non-finite values, negative extents) and degenerate image
/// sizes fail with [`PipelineError::InvalidGeometry`].
pub fn normalize(
    rect: &NormalizedRect,
    image_width: u32,
    image_height: u32,
) -> Result<PixelRect, PipelineError> {
    if image_width == 0 || image_height == 0 {
        return Err(PipelineError::InvalidGeometry(format!(
            "image size {}x{} has no area",
            image_width, image_height
        )));
    }
    if !rect.is_well_formed() {
        return Err(PipelineError::InvalidGeometry(format!("{:?}", rect)));
    }

    let flipped_min_y = 1.0 - rect.max_y();
    let w = image_width as f32;
    let h = image_height as f32;

    Ok(PixelRect {
        x: rect.min_x * w,
        y: flipped_min_y * h,
        width: rect.width * w,
        height: rect.height * h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn centered_box_maps_to_pixels() {
        let rect = NormalizedRect::new(0.25, 0.25, 0.5, 0.5);
        let px = normalize(&rect, 1280, 720).unwrap();
        assert_eq!(
            px,
            PixelRect {
                x: 320.0,
                y: 180.0,
                width: 640.0,
                height: 360.0
            }
        );
    }

    #[test]
    fn flip_moves_bottom_box_to_top_of_image() {
        // Box hugging the bottom edge in model space ends at the bottom in pixels.
        let rect = NormalizedRect::new(0.0, 0.0, 0.5, 0.25);
        let px = normalize(&rect, 100, 200).unwrap();
        assert!(approx(px.y, 150.0));
        assert!(approx(px.max_y(), 200.0));
        assert!(approx(px.max_x(), 50.0));
    }

    #[test]
    fn round_trip_recovers_normalized_box() {
        let samples = [
            NormalizedRect::new(0.0, 0.0, 1.0, 1.0),
            NormalizedRect::new(0.1, 0.7, 0.3, 0.2),
            NormalizedRect::new(0.9, 0.05, 0.1, 0.95),
            NormalizedRect::new(0.33, 0.41, 0.0, 0.0),
        ];
        for rect in samples {
            let back = normalize(&rect, 1920, 1080)
                .unwrap()
                .to_normalized(1920, 1080);
            assert!(approx(back.min_x, rect.min_x), "{rect:?} -> {back:?}");
            assert!(approx(back.min_y, rect.min_y), "{rect:?} -> {back:?}");
            assert!(approx(back.width, rect.width), "{rect:?} -> {back:?}");
            assert!(approx(back.height, rect.height), "{rect:?} -> {back:?}");
        }
    }

    #[test]
    fn well_formed_boxes_stay_inside_image() {
        let rect = NormalizedRect::new(0.6, 0.0, 0.4, 1.0);
        let px = normalize(&rect, 640, 480).unwrap();
        assert!(px.x >= 0.0 && px.y >= 0.0);
        assert!(px.max_x() <= 640.0 + EPS);
        assert!(px.max_y() <= 480.0 + EPS);
    }

    #[test]
    fn malformed_boxes_are_rejected() {
        let bad = [
            NormalizedRect::new(f32::NAN, 0.1, 0.2, 0.2),
            NormalizedRect::new(0.1, 0.1, -0.2, 0.2),
            NormalizedRect::new(0.1, 0.1, 0.2, -0.01),
            NormalizedRect::new(0.1, f32::INFINITY, 0.2, 0.2),
        ];
        for rect in bad {
            assert!(matches!(
                normalize(&rect, 640, 480),
                Err(PipelineError::InvalidGeometry(_))
            ));
        }
    }

    #[test]
    fn empty_image_is_rejected() {
        let rect = NormalizedRect::new(0.1, 0.1, 0.2, 0.2);
        assert!(normalize(&rect, 0, 480).is_err());
    }

    #[test]
    fn clamped_bounds_clip_to_image() {
        let px = PixelRect {
            x: -10.0,
            y: 5.5,
            width: 50.0,
            height: 200.0,
        };
        assert_eq!(px.clamped_bounds(30, 100), Some((0, 5, 30, 100)));

        let outside = PixelRect {
            x: 40.0,
            y: 0.0,
            width: 5.0,
            height: 5.0,
        };
        assert_eq!(outside.clamped_bounds(30, 100), None);
    }
}
