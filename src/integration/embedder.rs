//! Trait for appearance embedding backends, plus the image types they consume.

use std::borrow::Cow;

use crate::reid::{BoundingBox, Embedding};

/// Trait for appearance embedding backends.
///
/// Implement this trait to connect any re-identification model to a session.
/// The embedder is treated as a pure function of the crop.
///
/// # Example
///
/// ```ignore
/// use tracklet_reid::{Embedding, FeatureEmbedder, ImageCrop};
///
/// struct MyEmbedder {
///     // Your model here
/// }
///
/// impl FeatureEmbedder for MyEmbedder {
///     type Error = std::io::Error;
///
///     fn embed(&mut self, crop: &ImageCrop<'_>) -> Result<Embedding, Self::Error> {
///         // Run inference and return the feature vector
///         Ok(Embedding::from(vec![0.0; 512]))
///     }
/// }
/// ```
pub trait FeatureEmbedder {
    /// Error type for embedding failures.
    type Error;

    /// Compute the embedding of one image crop.
    fn embed(&mut self, crop: &ImageCrop<'_>) -> Result<Embedding, Self::Error>;
}

/// Interleaved 8-bit image region (HWC layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCrop<'a> {
    pub data: Cow<'a, [u8]>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl<'a> ImageCrop<'a> {
    pub fn new(data: impl Into<Cow<'a, [u8]>>, width: u32, height: u32, channels: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            channels,
        }
    }

    /// A crop with no pixels.
    pub fn empty(channels: u32) -> Self {
        Self::new(Vec::new(), 0, 0, channels)
    }

    /// Number of bytes `width * height * channels` calls for.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// True when there are no pixels, or when `data` is too short to cover
    /// the stated dimensions.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.len() < self.expected_len()
    }

    /// Pixel value at (x, y, channel).
    ///
    /// Panics if the position lies outside the crop; check `is_empty` first.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32, channel: u32) -> u8 {
        let idx = ((y * self.width + x) * self.channels + channel) as usize;
        self.data[idx]
    }
}

/// Full decoded video frame (HWC layout).
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u32,
}

impl Frame {
    /// Returns `None` if `data` does not hold `width * height * channels` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u32) -> Option<Self> {
        let expected = width as usize * height as usize * channels as usize;
        (data.len() == expected).then_some(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Copy out the region under `bbox`, clamped to the frame.
    ///
    /// Degenerate or fully out-of-frame boxes give an empty crop.
    pub fn crop(&self, bbox: &BoundingBox) -> ImageCrop<'static> {
        let Some((x, y, w, h)) = bbox.pixel_window(self.width, self.height) else {
            return ImageCrop::empty(self.channels);
        };

        let row_stride = (self.width * self.channels) as usize;
        let row_len = (w * self.channels) as usize;
        let mut data = Vec::with_capacity(row_len * h as usize);
        for row in y..y + h {
            let start = row as usize * row_stride + (x * self.channels) as usize;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        ImageCrop::new(data, w, h, self.channels)
    }
}
