use anyhow::Result;
use image::RgbImage;

use crate::detect::result::InferenceOutput;

/// Inference provider trait.
///
/// A provider wraps one loaded detection model. It receives an upright RGB
/// image and reports object observations in normalized model space
/// (bottom-left origin). Providers are driven from a single inference thread,
/// so `infer` takes `&mut self`; shared handles wrap them in a `Mutex`.
pub trait InferenceProvider: Send {
    /// Provider identifier.
    fn name(&self) -> &str;

    /// Run the model on one image.
    fn infer(&mut self, image: &RgbImage) -> Result<InferenceOutput>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
