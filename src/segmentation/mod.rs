pub mod assets;
mod engine;
mod preprocess;
mod selfie;
pub mod types;

pub use assets::{AssetResolver, InstallLayout};
pub use engine::{ModelState, SegmentationEngine};
pub use preprocess::TensorLayout;
pub use selfie::SelfieLoader;
pub use types::{Mask, ModelLoader, SegmentationModel};

use std::path::PathBuf;

/// Engine backed by the ONNX selfie segmenter, with assets looked up next to
/// the executable unless `model_path` points somewhere explicit
pub fn create_default_engine(model_path: Option<PathBuf>, input_size: u32, layout: TensorLayout) -> SegmentationEngine {
    SegmentationEngine::new(
        Box::new(InstallLayout::for_current_exe(model_path)),
        Box::new(SelfieLoader {
            size: input_size,
            layout,
        }),
    )
}
