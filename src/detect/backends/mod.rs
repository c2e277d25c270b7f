pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubProvider;

#[cfg(feature = "backend-tract")]
pub use tract::TractProvider;
