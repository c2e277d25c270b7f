//! Overlay rendering.
//!
//! Draws a [`DetectionSet`] onto an RGB image, either as coloured outlines
//! captioned with label and confidence, or by blurring each detected region.

use std::sync::OnceLock;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::imageops;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use serde::Deserialize;

use crate::annotate::{AnnotatedDetection, DetectionSet};
use crate::geometry::PixelRect;

static LABEL_FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
const CAPTION_GAP: i32 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Coloured box around each detection.
    #[default]
    Outline,
    /// Blur the inside of each detection.
    Blur,
}

impl std::str::FromStr for RenderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outline" => Ok(RenderMode::Outline),
            "blur" => Ok(RenderMode::Blur),
            other => Err(anyhow::anyhow!("unknown render mode '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub mode: RenderMode,
    /// Outline thickness in pixels.
    pub thickness: u32,
    /// Gaussian sigma for blur mode.
    pub blur_sigma: f32,
    /// Caption outlines with `"<label> <confidence>%"`.
    pub show_labels: bool,
    /// Caption height in pixels.
    pub font_size: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Outline,
            thickness: 3,
            blur_sigma: 12.0,
            show_labels: true,
            font_size: 16.0,
        }
    }
}

/// Draw `set` onto `image`.
///
/// If the set was built for a different image size, boxes are scaled to the
/// target first. Boxes are clipped to the image.
pub fn render(image: &mut RgbImage, set: &DetectionSet, options: &RenderOptions) {
    let (width, height) = image.dimensions();
    let sx = if set.width == 0 { 1.0 } else { width as f32 / set.width as f32 };
    let sy = if set.height == 0 { 1.0 } else { height as f32 / set.height as f32 };

    for detection in set.iter() {
        let scaled = PixelRect {
            x: detection.bbox.x * sx,
            y: detection.bbox.y * sy,
            width: detection.bbox.width * sx,
            height: detection.bbox.height * sy,
        };
        let Some((x1, y1, x2, y2)) = scaled.clamped_bounds(width, height) else {
            continue;
        };
        match options.mode {
            RenderMode::Outline => {
                draw_outline(image, (x1, y1, x2, y2), options.thickness, detection.color);
                if options.show_labels {
                    draw_caption(image, detection, (x1, y1), options);
                }
            }
            RenderMode::Blur => blur_region(image, (x1, y1, x2, y2), options.blur_sigma),
        }
    }
}

fn draw_outline(
    image: &mut RgbImage,
    (x1, y1, x2, y2): (u32, u32, u32, u32),
    thickness: u32,
    color: Rgb<u8>,
) {
    let (w, h) = (x2 - x1, y2 - y1);
    for inset in 0..thickness.max(1) {
        if w <= 2 * inset || h <= 2 * inset {
            break;
        }
        let rect = Rect::at((x1 + inset) as i32, (y1 + inset) as i32)
            .of_size(w - 2 * inset, h - 2 * inset);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Caption text for one detection, e.g. `"cat 87%"`.
pub fn caption(detection: &AnnotatedDetection) -> String {
    let percent = (detection.confidence * 100.0).round();
    match detection.label.as_deref() {
        Some(label) => format!("{} {:.0}%", label, percent),
        None => format!("{:.0}%", percent),
    }
}

fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(LABEL_FONT_BYTES) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("label font unusable, captions disabled: {}", e);
            None
        }
    })
    .as_ref()
}

/// Above the box when there is room, otherwise just inside its top edge.
fn draw_caption(
    image: &mut RgbImage,
    detection: &AnnotatedDetection,
    (x1, y1): (u32, u32),
    options: &RenderOptions,
) {
    let Some(font) = label_font() else {
        return;
    };
    let text = caption(detection);
    let scale = PxScale::from(options.font_size);
    let line_height = font.as_scaled(scale).height().ceil() as i32;

    let above = y1 as i32 - line_height - CAPTION_GAP;
    let y = if above >= 0 {
        above
    } else {
        (y1 + options.thickness) as i32 + CAPTION_GAP
    };
    draw_text_mut(image, detection.color, x1 as i32, y, scale, font, &text);
}

fn blur_region(image: &mut RgbImage, (x1, y1, x2, y2): (u32, u32, u32, u32), sigma: f32) {
    if sigma <= 0.0 {
        return;
    }
    let region = imageops::crop_imm(&*image, x1, y1, x2 - x1, y2 - y1).to_image();
    let blurred = gaussian_blur_f32(&region, sigma);
    imageops::replace(image, &blurred, i64::from(x1), i64::from(y1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::build;
    use crate::detect::RawDetection;
    use crate::geometry::NormalizedRect;

    fn no_captions() -> RenderOptions {
        RenderOptions {
            show_labels: false,
            ..RenderOptions::default()
        }
    }

    fn one_box(label: &str, w: u32, h: u32) -> DetectionSet {
        build(
            &[RawDetection {
                bbox: NormalizedRect::new(0.25, 0.25, 0.5, 0.5),
                confidence: 0.9,
                label: Some(label.to_string()),
            }],
            w,
            h,
        )
    }

    #[test]
    fn outline_uses_detection_colour() {
        let set = one_box("cat", 40, 40);
        let colour = set.detections[0].color;
        let mut image = RgbImage::new(40, 40);
        render(&mut image, &set, &no_captions());

        // Box spans 10..30 on both axes.
        assert_eq!(*image.get_pixel(10, 10), colour);
        assert_eq!(*image.get_pixel(12, 20), colour);
        assert_eq!(*image.get_pixel(29, 29), colour);
        assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_scale_to_target_image() {
        let set = one_box("dog", 20, 20);
        let colour = set.detections[0].color;
        let mut image = RgbImage::new(80, 80);
        render(
            &mut image,
            &set,
            &RenderOptions {
                thickness: 1,
                ..no_captions()
            },
        );
        assert_eq!(*image.get_pixel(20, 20), colour);
        assert_eq!(*image.get_pixel(59, 59), colour);
        assert_eq!(*image.get_pixel(21, 21), Rgb([0, 0, 0]));
    }

    #[test]
    fn blur_only_touches_detected_region() {
        let mut image = RgbImage::from_fn(40, 40, |x, _| {
            if x % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let set = one_box("person", 40, 40);
        render(
            &mut image,
            &set,
            &RenderOptions {
                mode: RenderMode::Blur,
                blur_sigma: 3.0,
                ..RenderOptions::default()
            },
        );
        let inside = image.get_pixel(20, 20)[0];
        assert!(inside > 40 && inside < 215, "inside pixel {inside}");
        assert_eq!(*image.get_pixel(2, 2), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(3, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn render_mode_parses() {
        assert_eq!("Blur".parse::<RenderMode>().unwrap(), RenderMode::Blur);
        assert_eq!("outline".parse::<RenderMode>().unwrap(), RenderMode::Outline);
        assert!("sparkle".parse::<RenderMode>().is_err());
    }

    fn lit_pixels(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> usize {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) != Rgb([0, 0, 0]))
            .count()
    }

    #[test]
    fn caption_is_drawn_above_the_box() {
        // Box spans 50..150 on both axes.
        let set = one_box("cat", 200, 200);
        let mut image = RgbImage::new(200, 200);
        render(&mut image, &set, &RenderOptions::default());

        assert!(lit_pixels(&image, 50..150, 20..48) > 0, "no caption above box");
        assert_eq!(lit_pixels(&image, 0..200, 0..10), 0);
        assert_eq!(lit_pixels(&image, 0..45, 0..200), 0);

        let mut plain = RgbImage::new(200, 200);
        render(&mut plain, &set, &no_captions());
        assert_eq!(lit_pixels(&plain, 50..150, 20..48), 0);
    }

    #[test]
    fn caption_moves_inside_when_box_touches_top() {
        let set = build(
            &[RawDetection {
                bbox: NormalizedRect::new(0.1, 0.5, 0.8, 0.5),
                confidence: 0.5,
                label: Some("bird".to_string()),
            }],
            200,
            200,
        );
        let mut image = RgbImage::new(200, 200);
        render(&mut image, &set, &RenderOptions::default());
        // Box spans y 0..100 and its outline is 3 px thick.
        assert!(lit_pixels(&image, 25..175, 5..30) > 0);
    }

    #[test]
    fn caption_text_has_label_and_percent() {
        let set = one_box("cat", 10, 10);
        let mut detection = set.detections[0].clone();
        detection.confidence = 0.874;
        assert_eq!(caption(&detection), "cat 87%");
        detection.label = None;
        assert_eq!(caption(&detection), "87%");
    }
}
