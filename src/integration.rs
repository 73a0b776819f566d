//! Integration module for connecting appearance embedding backends with the
//! identity resolution engine.
//!
//! This module provides traits and utilities for integrating various inference
//! backends (Burn, ONNX Runtime, etc.) and tracker outputs with a session.

mod builder;
mod embedder;
mod pipeline;

pub use builder::TrackedDetectionBuilder;
pub use embedder::{FeatureEmbedder, Frame, ImageCrop};
pub use pipeline::ReidPipeline;

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnEmbedder, BurnEmbedderError, BurnEmbeddingModel};
