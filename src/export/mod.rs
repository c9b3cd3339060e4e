//! Model export and serialization module
//!
//! The trained pipeline is persisted as a single binary artifact that bundles
//! the fitted feature encoder with the selected model.

mod artifact;

pub use artifact::{ArtifactHeader, ArtifactMetadata, ModelArtifact, ARTIFACT_FORMAT_VERSION};
