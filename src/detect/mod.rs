mod backend;
mod backends;
mod catalog;
mod decode;
mod result;

pub use backend::InferenceProvider;
pub use backends::StubProvider;
#[cfg(feature = "backend-tract")]
pub use backends::TractProvider;
pub use catalog::{default_factory, display_name, ModelCatalog, ModelEntry, ProviderFactory};
pub use result::{
    ClassLabel, InferenceOutput, ObjectObservation, RawDetection, RecognizedObservation,
};
