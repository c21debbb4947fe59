//! Model export
//!
//! Packages a selected model with its preprocessing state into a portable
//! JSON artifact.

mod artifact;

pub use artifact::{
    FeatureImportance, ModelArtifact, ARTIFACT_FORMAT_VERSION, IMPORTANCE_ARTIFACT, MODEL_ARTIFACT,
};
