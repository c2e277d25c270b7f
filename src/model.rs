//! The active detection model.
//!
//! `ModelSlot` is the single point of truth for which model runs inference.
//! The model picker writes it, the inference worker reads it. Readers take an
//! `Arc` snapshot of the current [`ActiveModel`], so a switch never disturbs an
//! inference that is already running; its result is tagged with the old
//! generation and the consumer throws it away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use image::RgbImage;

use crate::detect::{InferenceOutput, InferenceProvider, ModelCatalog, ModelEntry, ProviderFactory};
use crate::error::PipelineError;

/// A loaded model plus the generation it was selected in.
pub struct ActiveModel {
    pub generation: u64,
    pub name: String,
    provider: Mutex<Box<dyn InferenceProvider>>,
}

impl ActiveModel {
    pub fn new(generation: u64, name: impl Into<String>, provider: Box<dyn InferenceProvider>) -> Self {
        Self {
            generation,
            name: name.into(),
            provider: Mutex::new(provider),
        }
    }

    /// Run the provider on one image.
    pub fn infer(&self, image: &RgbImage) -> Result<InferenceOutput, PipelineError> {
        let mut provider = self.provider.lock().map_err(|_| {
            PipelineError::InferenceFailure(format!("model {} lock poisoned", self.name))
        })?;
        provider.infer(image).map_err(PipelineError::inference)
    }
}

impl std::fmt::Debug for ActiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveModel")
            .field("generation", &self.generation)
            .field("name", &self.name)
            .finish()
    }
}

/// Holder of the currently selected model.
#[derive(Debug)]
pub struct ModelSlot {
    current: RwLock<Arc<ActiveModel>>,
    next_generation: AtomicU64,
}

impl ModelSlot {
    /// Wrap an already loaded provider.
    pub fn with_provider(name: impl Into<String>, provider: Box<dyn InferenceProvider>) -> Self {
        Self {
            current: RwLock::new(Arc::new(ActiveModel::new(1, name, provider))),
            next_generation: AtomicU64::new(2),
        }
    }

    /// Load the startup model.
    ///
    /// Tries `preferred` first, then the catalog default, then every other
    /// entry in order. Fails only when no model at all can be loaded.
    pub fn start(
        catalog: &ModelCatalog,
        factory: &ProviderFactory,
        preferred: Option<&str>,
    ) -> Result<Self, PipelineError> {
        let mut candidates: Vec<&ModelEntry> = Vec::new();
        if let Some(name) = preferred {
            match catalog.get(name) {
                Some(entry) => candidates.push(entry),
                None => log::warn!("preferred model '{}' is not in the catalog", name),
            }
        }
        candidates.extend(catalog.default_entry());
        candidates.extend(catalog.entries());

        let mut tried: Vec<&ModelEntry> = Vec::new();
        for entry in candidates {
            if tried.contains(&entry) {
                continue;
            }
            tried.push(entry);
            match factory(entry) {
                Ok(provider) => {
                    log::info!("model {} loaded from {}", entry.name, entry.path.display());
                    return Ok(Self::with_provider(&entry.name, provider));
                }
                Err(e) => log::warn!("model {} failed to load: {:#}", entry.name, e),
            }
        }

        Err(PipelineError::ModelUnavailable(format!(
            "none of {} catalogued model(s) could be loaded",
            catalog.len()
        )))
    }

    /// Load exactly the named catalog entry, with no fallback.
    ///
    /// Used when the user asked for a specific model and a substitute would
    /// be wrong.
    pub fn load(
        catalog: &ModelCatalog,
        factory: &ProviderFactory,
        name: &str,
    ) -> Result<Self, PipelineError> {
        let entry = catalog.get(name).ok_or_else(|| {
            PipelineError::ModelUnavailable(format!(
                "model '{}' is not in the catalog; available: {}",
                name,
                catalog.names().join(", ")
            ))
        })?;
        let provider = factory(entry).map_err(|e| PipelineError::model(&entry.name, e))?;
        log::info!("model {} loaded from {}", entry.name, entry.path.display());
        Ok(Self::with_provider(&entry.name, provider))
    }

    /// Snapshot of the active model.
    pub fn current(&self) -> Arc<ActiveModel> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn generation(&self) -> u64 {
        self.current().generation
    }

    /// Switch to a catalogued model.
    ///
    /// If the model is missing or fails to load, the previous model stays
    /// active and the error is returned for the user to see.
    pub fn select(
        &self,
        catalog: &ModelCatalog,
        factory: &ProviderFactory,
        name: &str,
    ) -> Result<Arc<ActiveModel>, PipelineError> {
        let entry = catalog.get(name).ok_or_else(|| {
            PipelineError::ModelUnavailable(format!("model '{}' is not in the catalog", name))
        })?;
        let provider = factory(entry).map_err(|e| {
            log::warn!(
                "keeping model {} after failed switch to {}: {:#}",
                self.current().name,
                entry.name,
                e
            );
            PipelineError::model(&entry.name, e)
        })?;
        Ok(self.replace(&entry.name, provider))
    }

    /// Install a loaded provider as the active model.
    pub fn replace(&self, name: &str, provider: Box<dyn InferenceProvider>) -> Arc<ActiveModel> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let model = Arc::new(ActiveModel::new(generation, name, provider));
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&model);
        log::info!("active model is now {} (generation {})", name, generation);
        model
    }
}
