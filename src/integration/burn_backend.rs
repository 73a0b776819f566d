//! Burn inference backend for appearance embeddings.
//!
//! This module provides a `BurnEmbedder` that implements `FeatureEmbedder`
//! for running re-identification models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use tracklet_reid::integration::{BurnEmbedder, BurnEmbeddingModel};
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! // Implement BurnEmbeddingModel for your ReID network
//! struct MyOsNet { /* ... */ }
//!
//! impl BurnEmbeddingModel<NdArray> for MyOsNet {
//!     fn forward(&self, input: Tensor<NdArray, 4>) -> Tensor<NdArray, 2> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MyOsNet::load("osnet.bin");
//! let embedder = BurnEmbedder::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use thiserror::Error;

use super::{FeatureEmbedder, ImageCrop};
use crate::reid::Embedding;

/// Error type for Burn embedding failures.
#[derive(Debug, Clone, Error)]
pub enum BurnEmbedderError {
    /// Crop has no pixels.
    #[error("empty crop")]
    EmptyCrop,
    /// Crop channel count does not match the model.
    #[error("invalid channel count: expected {expected}, got {got}")]
    InvalidChannels { expected: u32, got: u32 },
    /// Model output could not be read back.
    #[error("postprocessing error: {0}")]
    PostprocessingError(String),
}

/// Trait for Burn-based embedding models.
///
/// Implement this trait for your specific model architecture.
pub trait BurnEmbeddingModel<B: Backend>: Send + Sync {
    /// Run forward pass on the input tensor.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, channels, height, width]
    ///
    /// # Returns
    /// Feature tensor of shape [batch, dim].
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Get the expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 256, 128) // Common person ReID input size
    }
}

/// Burn-based embedder implementing `FeatureEmbedder`.
pub struct BurnEmbedder<B: Backend, M: BurnEmbeddingModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnEmbeddingModel<B>> BurnEmbedder<B, M> {
    /// Create a new Burn embedder with the given model and device.
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Resize the crop to the model input and convert it to a `[1, C, H, W]` tensor.
    ///
    /// Uses nearest-neighbour sampling and scales intensities to [0, 1].
    pub fn preprocess(&self, crop: &ImageCrop<'_>) -> Result<Tensor<B, 4>, BurnEmbedderError> {
        if crop.is_empty() {
            return Err(BurnEmbedderError::EmptyCrop);
        }
        let (channels, target_h, target_w) = self.model.input_size();
        if crop.channels != channels {
            return Err(BurnEmbedderError::InvalidChannels {
                expected: channels,
                got: crop.channels,
            });
        }

        let mut data = Vec::with_capacity((channels * target_h * target_w) as usize);
        for c in 0..channels {
            for ty in 0..target_h {
                let sy = (ty * crop.height / target_h).min(crop.height - 1);
                for tx in 0..target_w {
                    let sx = (tx * crop.width / target_w).min(crop.width - 1);
                    data.push(crop.pixel(sx, sy, c) as f32 / 255.0);
                }
            }
        }

        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            channels as usize,
            target_h as usize,
            target_w as usize,
        ]);
        Ok(tensor)
    }

    fn postprocess(&self, output: Tensor<B, 2>) -> Result<Embedding, BurnEmbedderError> {
        let [_, dim] = output.dims();
        let values = output
            .slice([0..1, 0..dim])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| BurnEmbedderError::PostprocessingError(format!("{e:?}")))?;
        Ok(Embedding::from(values))
    }
}

impl<B: Backend, M: BurnEmbeddingModel<B>> FeatureEmbedder for BurnEmbedder<B, M> {
    type Error = BurnEmbedderError;

    fn embed(&mut self, crop: &ImageCrop<'_>) -> Result<Embedding, Self::Error> {
        let tensor = self.preprocess(crop)?;
        let output = self.model.forward(tensor);
        self.postprocess(output)
    }
}
