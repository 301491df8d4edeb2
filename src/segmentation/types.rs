use anyhow::Result;
use image::RgbImage;
use std::path::Path;

/// Mask values above this are foreground
pub const FOREGROUND_THRESHOLD: f32 = 0.5;

/// Per-pixel foreground probability: 0.0 = background, 1.0 = foreground.
/// Dimensions match the frame it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    /// Wrap a row-major buffer, clamping every value into [0, 1].
    /// Returns `None` if the buffer length does not match the dimensions.
    pub fn new(width: u32, height: u32, mut data: Vec<f32>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        for value in &mut data {
            *value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        }
        Some(Self { width, height, data })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Hard threshold into an 8-bit alpha value
    pub fn alpha_at(&self, index: usize) -> u8 {
        if self.data[index] > FOREGROUND_THRESHOLD {
            255
        } else {
            0
        }
    }
}

/// Trait for segmentation models
/// Allows swapping between different backends (ONNX selfie segmentation, test doubles, ...)
pub trait SegmentationModel {
    /// Process a frame and return its foreground mask.
    ///
    /// `Ok(None)` means the model had nothing to say about this input
    /// (degenerate output); the caller keeps whatever it showed before.
    fn segment(&mut self, frame: &RgbImage) -> Result<Option<Mask>>;

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}

/// Builds a model from resolved assets
pub trait ModelLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn SegmentationModel>>;
}
