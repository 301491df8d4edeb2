use super::preprocess::{Preprocessor, TensorLayout};
use super::types::{Mask, ModelLoader, SegmentationModel};
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Selfie segmentation network exported to ONNX
///
/// Stateless: every frame is segmented on its own. The network takes a
/// square RGB tensor in [0, 1] and returns a single-channel foreground
/// probability map at the same resolution.
pub struct SelfieSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    layout: TensorLayout,
    size: u32,
}

impl SelfieSegmenter {
    /// Create a new segmenter from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `size` - Side of the square input the network was exported with
    /// * `layout` - Input tensor layout the network expects
    pub fn new<P: AsRef<Path>>(model_path: P, size: u32, layout: TensorLayout) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading segmentation model from {}", path.display());

        let session = Session::builder()
            .map_err(|e| anyhow!("Failed to create session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Failed to set optimization level: {e}"))?
            .with_intra_threads(2)
            .map_err(|e| anyhow!("Failed to set thread count: {e}"))?
            .commit_from_file(path)
            .map_err(|e| anyhow!("Failed to load model from {}: {e}", path.display()))?;

        tracing::info!("Segmentation model loaded successfully");

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(size, size, layout),
            layout,
            size,
        })
    }
}

impl SegmentationModel for SelfieSegmenter {
    fn segment(&mut self, frame: &RgbImage) -> Result<Option<Mask>> {
        let _span = tracing::debug_span!("selfie_segment").entered();
        let layout = self.layout;

        let input = self.preprocessor.preprocess(frame)?;
        let (n, a, b, c) = input.dim();
        let (data, _offset) = input.into_raw_vec_and_offset();
        let tensor = Tensor::from_array(([n, a, b, c], data))
            .map_err(|e| anyhow!("Failed to build input tensor: {e}"))?;

        let infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| anyhow!("Failed to run inference: {e}"))?;
        drop(infer_span);

        let (out_shape, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to read matte tensor: {e}"))?;
        let out_shape: Vec<i64> = out_shape.iter().copied().collect();

        let Some((matte_height, matte_width)) = matte_dimensions(&out_shape, layout) else {
            tracing::debug!("Unexpected matte shape {:?}", out_shape);
            return Ok(None);
        };
        if values.len() != matte_width as usize * matte_height as usize {
            tracing::debug!("Matte has {} values for shape {:?}", values.len(), out_shape);
            return Ok(None);
        }

        let (frame_width, frame_height) = frame.dimensions();
        let matte = Preprocessor::postprocess_matte(
            values,
            matte_width,
            matte_height,
            frame_width,
            frame_height,
        )
        .context("Failed to rescale matte")?;

        Ok(Mask::new(frame_width, frame_height, matte))
    }

    fn input_size(&self) -> (u32, u32) {
        (self.size, self.size)
    }
}

/// Height and width of the matte inside the output shape: [1, 1, H, W] for
/// NCHW networks, [1, H, W, 1] for NHWC ones, or plain [1, H, W] / [H, W].
fn matte_dimensions(shape: &[i64], layout: TensorLayout) -> Option<(u32, u32)> {
    let (height, width) = match (shape, layout) {
        ([1, 1, h, w], TensorLayout::Nchw) => (*h, *w),
        ([1, h, w, 1], TensorLayout::Nhwc) => (*h, *w),
        ([1, h, w], _) | ([h, w], _) => (*h, *w),
        _ => return None,
    };
    if height <= 0 || width <= 0 {
        return None;
    }
    Some((height as u32, width as u32))
}

/// Loads `SelfieSegmenter` instances from resolved model files
pub struct SelfieLoader {
    pub size: u32,
    pub layout: TensorLayout,
}

impl ModelLoader for SelfieLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn SegmentationModel>> {
        let model = SelfieSegmenter::new(model_path, self.size, self.layout)?;
        Ok(Box::new(model))
    }
}
