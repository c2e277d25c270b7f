//! Still photos.
//!
//! Photos are decoded and turned upright using the orientation recorded in
//! the file before any detection runs, so boxes line up with what the user
//! sees.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};

pub use image::metadata::Orientation;

/// Decode `path` and apply its stored orientation, or `orientation` when
/// given.
pub fn open_upright(path: &Path, orientation: Option<Orientation>) -> Result<RgbImage> {
    let mut decoder = ImageReader::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read image {}", path.display()))?
        .into_decoder()
        .with_context(|| format!("unsupported image {}", path.display()))?;

    let stored = match decoder.orientation() {
        Ok(stored) => stored,
        Err(e) => {
            log::warn!("ignoring unreadable orientation in {}: {}", path.display(), e);
            Orientation::NoTransforms
        }
    };
    let mut image = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    image.apply_orientation(orientation.unwrap_or(stored));
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sideways_photo(dir: &Path) -> std::path::PathBuf {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        let path = dir.join("photo.png");
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn untagged_photo_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let photo = open_upright(&sideways_photo(dir.path()), None).unwrap();
        assert_eq!(photo.dimensions(), (4, 2));
        assert_eq!(*photo.get_pixel(0, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn explicit_orientation_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = sideways_photo(dir.path());

        let right = open_upright(&path, Orientation::from_exif(6)).unwrap();
        assert_eq!(right.dimensions(), (2, 4));
        assert_eq!(*right.get_pixel(1, 0), Rgb([255, 0, 0]));

        let down = open_upright(&path, Orientation::from_exif(3)).unwrap();
        assert_eq!(down.dimensions(), (4, 2));
        assert_eq!(*down.get_pixel(3, 1), Rgb([255, 0, 0]));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_upright(&dir.path().join("nope.png"), None).is_err());
    }
}
