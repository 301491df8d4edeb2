use super::assets::AssetResolver;
use super::types::{Mask, ModelLoader, SegmentationModel};
use crate::error::{InitError, RuntimeError};
use image::RgbImage;

#[derive(Debug, Clone)]
pub enum ModelState {
    NotInitialized,
    Ready,
    InitFailed(InitError),
}

/// Lazily builds the background-removal model and keeps it for the rest of
/// the process.
///
/// A failed initialization is remembered and not retried until the caller
/// asks again through `ensure_ready`.
pub struct SegmentationEngine {
    resolver: Box<dyn AssetResolver>,
    loader: Box<dyn ModelLoader>,
    model: Option<Box<dyn SegmentationModel>>,
    state: ModelState,
}

impl SegmentationEngine {
    pub fn new(resolver: Box<dyn AssetResolver>, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            resolver,
            loader,
            model: None,
            state: ModelState::NotInitialized,
        }
    }

    pub fn ensure_ready(&mut self) -> Result<(), InitError> {
        if self.model.is_some() {
            return Ok(());
        }

        match self.initialize() {
            Ok(model) => {
                let (width, height) = model.input_size();
                tracing::info!("Background removal ready ({}x{} input)", width, height);
                self.model = Some(model);
                self.state = ModelState::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Background removal unavailable: {}", err);
                self.state = ModelState::InitFailed(err.clone());
                Err(err)
            }
        }
    }

    fn initialize(&self) -> Result<Box<dyn SegmentationModel>, InitError> {
        let path = self.resolver.resolve_model_assets()?;
        self.loader
            .load(&path)
            .map_err(|err| InitError::ModelConstructionFailed(format!("{:#}", err)))
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Segment a frame. Only valid once `ensure_ready` has succeeded.
    pub fn segment(&mut self, frame: &RgbImage) -> Result<Option<Mask>, RuntimeError> {
        let model = self.model.as_mut().ok_or(RuntimeError::ModelNotReady)?;
        let mask = model.segment(frame).map_err(RuntimeError::Inference)?;
        if let Some(mask) = &mask {
            if mask.dimensions() != frame.dimensions() {
                return Err(RuntimeError::UnexpectedCompositeFailure(format!(
                    "mask is {:?}, frame is {:?}",
                    mask.dimensions(),
                    frame.dimensions()
                )));
            }
        }
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLoader, FakeResolver};

    #[test]
    fn missing_assets_fail_without_loading() {
        let resolver = FakeResolver::missing();
        let loader = FakeLoader::constant(0.9);
        let mut engine = SegmentationEngine::new(Box::new(resolver), Box::new(loader.clone()));

        let err = engine.ensure_ready().unwrap_err();

        assert!(matches!(err, InitError::ModelAssetsMissing { .. }));
        assert!(matches!(engine.state(), ModelState::InitFailed(_)));
        assert_eq!(loader.load_count(), 0);
    }

    #[test]
    fn construction_failure_is_reported() {
        let mut engine = SegmentationEngine::new(
            Box::new(FakeResolver::present()),
            Box::new(FakeLoader::failing("bad graph")),
        );

        let err = engine.ensure_ready().unwrap_err();

        match err {
            InitError::ModelConstructionFailed(message) => assert!(message.contains("bad graph")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ready_is_idempotent() {
        let loader = FakeLoader::constant(0.9);
        let mut engine = SegmentationEngine::new(Box::new(FakeResolver::present()), Box::new(loader.clone()));

        engine.ensure_ready().unwrap();
        engine.ensure_ready().unwrap();

        assert!(matches!(engine.state(), ModelState::Ready));
        assert_eq!(loader.load_count(), 1);
    }

    #[test]
    fn explicit_retry_after_failure() {
        let resolver = FakeResolver::missing();
        let mut engine = SegmentationEngine::new(Box::new(resolver.clone()), Box::new(FakeLoader::constant(0.9)));

        assert!(engine.ensure_ready().is_err());
        resolver.install();
        assert!(engine.ensure_ready().is_ok());
        assert!(engine.is_ready());
    }

    #[test]
    fn segment_before_ready_is_rejected() {
        let mut engine = SegmentationEngine::new(Box::new(FakeResolver::present()), Box::new(FakeLoader::constant(0.9)));
        let frame = RgbImage::new(4, 4);

        assert!(matches!(engine.segment(&frame), Err(RuntimeError::ModelNotReady)));
    }

    #[test]
    fn segment_returns_frame_sized_mask() {
        let mut engine = SegmentationEngine::new(Box::new(FakeResolver::present()), Box::new(FakeLoader::constant(0.9)));
        engine.ensure_ready().unwrap();

        let mask = engine.segment(&RgbImage::new(6, 3)).unwrap().unwrap();

        assert_eq!(mask.dimensions(), (6, 3));
    }

    #[test]
    fn degenerate_output_is_none() {
        let mut engine = SegmentationEngine::new(Box::new(FakeResolver::present()), Box::new(FakeLoader::empty()));
        engine.ensure_ready().unwrap();

        assert!(engine.segment(&RgbImage::new(6, 3)).unwrap().is_none());
    }
}
