//! Label colours.
//!
//! The same label always renders in the same colour without a precomputed
//! palette: the label is hashed and the hash picks a hue from the upper half
//! of the colour wheel. Unlabelled detections use [`DEFAULT_COLOR`], which the
//! hashed range can never produce.

use image::Rgb;
use sha2::{Digest, Sha256};

/// Colour for detections without a label.
pub const DEFAULT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Pick a display colour for a label.
pub fn colorize(label: Option<&str>) -> Rgb<u8> {
    match label {
        Some(label) if !label.is_empty() => hsv_to_rgb(hue_for_hash(label_hash(label)), 1.0, 1.0),
        _ => DEFAULT_COLOR,
    }
}

/// SHA-256 of the label, truncated to its first 8 bytes.
///
/// Stable across calls and across process restarts.
pub fn label_hash(label: &str) -> u64 {
    let digest = Sha256::digest(label.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Hue in [0.5, 1.0).
pub fn hue_for_hash(hash: u64) -> f32 {
    (hash % 256) as f32 / 512.0 + 0.5
}

/// HSV (all components in [0,1]) to 8-bit RGB.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb<u8> {
    let h = hue.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - f * saturation);
    let t = value * (1.0 - (1.0 - f) * saturation);

    let (r, g, b) = match sector as u32 % 6 {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

fn to_u8(channel: f32) -> u8 {
    (channel * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_empty_label_uses_default() {
        assert_eq!(colorize(None), DEFAULT_COLOR);
        assert_eq!(colorize(Some("")), DEFAULT_COLOR);
    }

    #[test]
    fn colour_is_deterministic() {
        for label in ["cat", "dog", "person", "traffic light"] {
            assert_eq!(colorize(Some(label)), colorize(Some(label)));
        }
        assert_eq!(label_hash("cat"), label_hash("cat"));
    }

    #[test]
    fn hashed_hues_stay_in_upper_half() {
        for hash in [0u64, 1, 127, 255, 256, u64::MAX] {
            let hue = hue_for_hash(hash);
            assert!((0.5..1.0).contains(&hue), "hue {hue} for {hash}");
        }
    }

    #[test]
    fn hashed_colours_never_collide_with_default() {
        for low in 0u64..256 {
            assert_ne!(hsv_to_rgb(hue_for_hash(low), 1.0, 1.0), DEFAULT_COLOR);
        }
        for label in ["cat", "dog", "bird", "car", "bus", "x"] {
            assert_ne!(colorize(Some(label)), DEFAULT_COLOR);
        }
    }

    #[test]
    fn hsv_conversion_matches_known_points() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(0.5, 1.0, 1.0), Rgb([0, 255, 255]));
        assert_eq!(hsv_to_rgb(0.75, 1.0, 1.0), Rgb([128, 0, 255]));
        assert_eq!(hsv_to_rgb(0.3, 0.0, 1.0), Rgb([255, 255, 255]));
    }
}
