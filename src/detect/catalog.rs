use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::backend::InferenceProvider;
use super::backends::StubProvider;

/// Display name for a model file: the file name without its extension,
/// truncated at the first `_`. Empty segments are skipped.
///
/// `"yolov5s_640.onnx"` is shown as `"yolov5s"`, `"_hidden.onnx"` as `"hidden"`.
pub fn display_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_')
        .find(|segment| !segment.is_empty())
        .unwrap_or(&stem)
        .to_string()
}

/// One model the user can pick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
}

impl ModelEntry {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
        }
    }

    /// Lowercased file extension, empty when there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    fn file_stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }
}

/// Ordered catalog of available models.
///
/// Entries keep registration order, which is also the order shown to the
/// user. The first registered entry is the default.
#[derive(Clone, Debug, Default)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover model files in `dir` whose extension is in `extensions`,
    /// registered in file-name order.
    pub fn scan<P: AsRef<Path>>(dir: P, extensions: &[String]) -> Result<Self> {
        let dir = dir.as_ref();
        let read = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read models directory {}", dir.display()))?;

        let mut paths = Vec::new();
        for entry in read {
            let path = entry
                .with_context(|| format!("failed to list {}", dir.display()))?
                .path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(&ext)));
            if matches {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            catalog.register(ModelEntry::from_path(path));
        }
        log::info!(
            "found {} model(s) in {}: {}",
            catalog.len(),
            dir.display(),
            catalog.names().join(", ")
        );
        Ok(catalog)
    }

    /// Register an entry. The first registered entry becomes the default.
    pub fn register(&mut self, entry: ModelEntry) {
        if self.entries.iter().any(|e| e.name == entry.name) {
            log::warn!(
                "model {} shares display name {:?} with an earlier model",
                entry.path.display(),
                entry.name
            );
        }
        self.entries.push(entry);
    }

    /// Look up by display name, then by full file stem.
    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.file_stem().as_deref() == Some(name))
            })
    }

    pub fn default_entry(&self) -> Option<&ModelEntry> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    /// Display names in picker order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Model loader: turns a catalog entry into a ready provider.
pub type ProviderFactory =
    dyn Fn(&ModelEntry) -> Result<Box<dyn InferenceProvider>> + Send + Sync;

/// Loader that picks a provider by file extension: `.stub` label lists load
/// a [`StubProvider`]; `.onnx` loads a tract provider when the
/// `backend-tract` feature is enabled.
#[cfg_attr(not(feature = "backend-tract"), allow(unused_variables))]
pub fn default_factory(
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
) -> Box<ProviderFactory> {
    Box::new(move |entry: &ModelEntry| -> Result<Box<dyn InferenceProvider>> {
        match entry.extension().as_str() {
            "stub" => Ok(Box::new(StubProvider::from_file(&entry.name, &entry.path)?)),
            #[cfg(feature = "backend-tract")]
            "onnx" => {
                let mut provider = super::backends::TractProvider::load(
                    &entry.name,
                    &entry.path,
                    input_width,
                    input_height,
                )?
                .with_threshold(confidence_threshold);
                provider.warm_up()?;
                Ok(Box::new(provider))
            }
            other => Err(anyhow!(
                "no provider for model {} (extension {:?})",
                entry.path.display(),
                other
            )),
        }
    })
}
