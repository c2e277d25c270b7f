//! Frame capture sources.
//!
//! This module provides the producer side of the live pipeline:
//! - Synthetic frames (`stub://` sources) for tests and demos
//! - A local directory of still images replayed as a looping stream
//!
//! Every frame is stamped with its capture `Instant` and a monotonically
//! increasing sequence number at capture time. The frame-rate gate uses the
//! timestamp; the overlay uses the sequence to discard out-of-order results.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One captured frame.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub sequence: u64,
    pub captured_at: Instant,
    pub image: RgbImage,
}

/// Configuration for a capture source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// `stub://<name>` or a local directory of images.
    pub source: String,
    /// Nominal frame rate (frames per second).
    pub fps: u32,
    /// Frame width for synthetic frames.
    pub width: u32,
    /// Frame height for synthetic frames.
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: "stub://camera".to_string(),
            fps: 2,
            width: 1280,
            height: 720,
        }
    }
}

/// Statistics for a capture source.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Capture source.
pub struct CaptureSource {
    backend: CaptureBackend,
    frames_captured: u64,
    source: String,
}

enum CaptureBackend {
    Synthetic(SyntheticSource),
    ImageDir(ImageDirSource),
}

impl CaptureSource {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "capture size {}x{} has no area",
                config.width,
                config.height
            ));
        }
        let backend = if config.source.starts_with("stub://") {
            CaptureBackend::Synthetic(SyntheticSource::new(config.width, config.height))
        } else if config.source.contains("://") {
            return Err(anyhow!(
                "capture only supports stub:// sources and local image directories"
            ));
        } else {
            CaptureBackend::ImageDir(ImageDirSource::open(Path::new(&config.source))?)
        };
        log::info!("capture: opened {}", config.source);
        Ok(Self {
            backend,
            frames_captured: 0,
            source: config.source,
        })
    }

    /// Capture the next frame, stamped with the current time.
    pub fn next_frame(&mut self) -> Result<CapturedFrame> {
        let image = match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.next_image(),
            CaptureBackend::ImageDir(source) => source.next_image()?,
        };
        self.frames_captured += 1;
        Ok(CapturedFrame {
            sequence: self.frames_captured,
            captured_at: Instant::now(),
            image,
        })
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured,
            source: self.source.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl SyntheticSource {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }

    fn next_image(&mut self) -> RgbImage {
        self.tick = self.tick.wrapping_add(1);
        let shift = self.tick.wrapping_mul(7);
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                (x.wrapping_add(shift) % 256) as u8,
                (y % 256) as u8,
                (x.wrapping_add(y).wrapping_add(shift) / 4 % 256) as u8,
            ])
        })
    }
}

// ----------------------------------------------------------------------------
// Image directory source
// ----------------------------------------------------------------------------

struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    fn open(dir: &Path) -> Result<Self> {
        let read = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read capture directory {}", dir.display()))?;
        let mut paths = Vec::new();
        for entry in read {
            let path = entry
                .with_context(|| format!("failed to list {}", dir.display()))?
                .path();
            if path.is_file() && is_image_path(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        paths.sort();
        Ok(Self { paths, next: 0 })
    }

    fn next_image(&mut self) -> Result<RgbImage> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();
        crate::photo::open_upright(path, None)
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_frames_are_sequenced_and_sized() {
        let mut source = CaptureSource::new(CaptureConfig {
            source: "stub://test".into(),
            fps: 2,
            width: 32,
            height: 16,
        })
        .unwrap();

        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        assert_eq!((a.sequence, b.sequence), (1, 2));
        assert_eq!(a.image.dimensions(), (32, 16));
        assert!(b.captured_at >= a.captured_at);
        assert_ne!(a.image, b.image);
        assert_eq!(source.stats().frames_captured, 2);
    }

    #[test]
    fn image_directory_loops_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 4).save(dir.path().join("b.png")).unwrap();
        RgbImage::new(2, 2).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("readme.txt"), "skip").unwrap();

        let mut source = CaptureSource::new(CaptureConfig {
            source: dir.path().display().to_string(),
            ..CaptureConfig::default()
        })
        .unwrap();

        let dims: Vec<_> = (0..3)
            .map(|_| source.next_frame().unwrap().image.dimensions())
            .collect();
        assert_eq!(dims, vec![(2, 2), (4, 4), (2, 2)]);
    }

    #[test]
    fn rejects_remote_and_empty_sources() {
        assert!(CaptureSource::new(CaptureConfig {
            source: "rtsp://camera".into(),
            ..CaptureConfig::default()
        })
        .is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(CaptureSource::new(CaptureConfig {
            source: dir.path().display().to_string(),
            ..CaptureConfig::default()
        })
        .is_err());
    }
}
