//! Scripted stand-ins for the camera, the model and the platform hooks.

use crate::capture::permission::AccessCallback;
use crate::capture::{AuthState, AuthorizationProvider, CaptureBackend, CaptureSource};
use crate::error::InitError;
use crate::segmentation::{AssetResolver, Mask, ModelLoader, SegmentationModel};
use anyhow::{anyhow, bail, Result};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

struct BackendScript {
    available: bool,
    opens_closed: bool,
    frames_left: usize,
    width: u32,
    height: u32,
    open_attempts: usize,
    close_calls: usize,
}

/// Capture backend whose behavior is set up front and inspected after
#[derive(Clone)]
pub struct ScriptedBackend {
    name: String,
    script: Arc<Mutex<BackendScript>>,
}

impl ScriptedBackend {
    fn scripted(name: &str, available: bool, opens_closed: bool, width: u32, height: u32, frames: usize) -> Self {
        Self {
            name: name.to_string(),
            script: Arc::new(Mutex::new(BackendScript {
                available,
                opens_closed,
                frames_left: frames,
                width,
                height,
                open_attempts: 0,
                close_calls: 0,
            })),
        }
    }

    /// Fails to open until `set_available(true)`, then streams forever
    pub fn unavailable(name: &str) -> Self {
        Self::scripted(name, false, false, 32, 24, usize::MAX)
    }

    /// Opens, but hands back a stream that is already closed
    pub fn opens_closed(name: &str) -> Self {
        Self::scripted(name, true, true, 32, 24, usize::MAX)
    }

    /// Delivers `frames` frames, then every read fails
    pub fn with_frames(name: &str, width: u32, height: u32, frames: usize) -> Self {
        Self::scripted(name, true, false, width, height, frames)
    }

    pub fn streaming(name: &str, width: u32, height: u32) -> Self {
        Self::with_frames(name, width, height, usize::MAX)
    }

    pub fn set_available(&self, available: bool) {
        self.script.lock().unwrap().available = available;
    }

    pub fn open_attempts(&self) -> usize {
        self.script.lock().unwrap().open_attempts
    }

    pub fn close_calls(&self) -> usize {
        self.script.lock().unwrap().close_calls
    }
}

impl CaptureBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn CaptureSource>> {
        let mut script = self.script.lock().unwrap();
        script.open_attempts += 1;
        if !script.available {
            bail!("{} is not connected", self.name);
        }
        Ok(Box::new(ScriptedSource {
            open: !script.opens_closed,
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedSource {
    open: bool,
    script: Arc<Mutex<BackendScript>>,
}

impl CaptureSource for ScriptedSource {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let mut script = self.script.lock().unwrap();
        if script.frames_left == 0 {
            bail!("decode miss");
        }
        if script.frames_left != usize::MAX {
            script.frames_left -= 1;
        }
        Ok(RgbImage::from_fn(script.width, script.height, |x, y| {
            Rgb([x as u8, y as u8, 128])
        }))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn resolution(&self) -> (u32, u32) {
        let script = self.script.lock().unwrap();
        (script.width, script.height)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.script.lock().unwrap().close_calls += 1;
        }
        Ok(())
    }
}

struct AuthorizationScript {
    state: AuthState,
    callbacks: Vec<AccessCallback>,
    requests: usize,
}

#[derive(Clone)]
pub struct FakeAuthorization {
    script: Arc<Mutex<AuthorizationScript>>,
}

impl FakeAuthorization {
    pub fn new(state: AuthState) -> Self {
        Self {
            script: Arc::new(Mutex::new(AuthorizationScript {
                state,
                callbacks: Vec::new(),
                requests: 0,
            })),
        }
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().unwrap().requests
    }

    /// Grant access and run pending callbacks on a separate thread, the way
    /// a platform prompt completes
    pub fn grant_from_other_thread(&self) {
        let callbacks = {
            let mut script = self.script.lock().unwrap();
            script.state = AuthState::Authorized;
            std::mem::take(&mut script.callbacks)
        };
        std::thread::spawn(move || {
            for callback in callbacks {
                callback(true);
            }
        })
        .join()
        .unwrap();
    }
}

impl AuthorizationProvider for FakeAuthorization {
    fn query(&self) -> AuthState {
        self.script.lock().unwrap().state
    }

    fn request(&self, on_complete: AccessCallback) {
        let mut script = self.script.lock().unwrap();
        script.requests += 1;
        script.callbacks.push(on_complete);
    }
}

struct ResolverScript {
    installed: bool,
    resolves: usize,
}

#[derive(Clone)]
pub struct FakeResolver {
    script: Arc<Mutex<ResolverScript>>,
}

impl FakeResolver {
    fn with(installed: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(ResolverScript { installed, resolves: 0 })),
        }
    }

    pub fn present() -> Self {
        Self::with(true)
    }

    pub fn missing() -> Self {
        Self::with(false)
    }

    pub fn install(&self) {
        self.script.lock().unwrap().installed = true;
    }

    pub fn resolve_count(&self) -> usize {
        self.script.lock().unwrap().resolves
    }
}

impl AssetResolver for FakeResolver {
    fn resolve_model_assets(&self) -> Result<PathBuf, InitError> {
        let mut script = self.script.lock().unwrap();
        script.resolves += 1;
        if script.installed {
            Ok(PathBuf::from("/opt/overlay/models/selfie_segmentation.onnx"))
        } else {
            Err(InitError::ModelAssetsMissing {
                searched: vec![PathBuf::from("/opt/overlay/Resources")],
            })
        }
    }
}

#[derive(Clone)]
enum ModelBehavior {
    Constant(f32),
    Empty,
    FailingLoad(String),
    FailingInference,
}

#[derive(Clone)]
pub struct FakeLoader {
    behavior: ModelBehavior,
    loads: Arc<Mutex<usize>>,
}

impl FakeLoader {
    fn with(behavior: ModelBehavior) -> Self {
        Self {
            behavior,
            loads: Arc::new(Mutex::new(0)),
        }
    }

    /// Every pixel gets the same foreground probability
    pub fn constant(value: f32) -> Self {
        Self::with(ModelBehavior::Constant(value))
    }

    /// Loads fine, never produces a mask
    pub fn empty() -> Self {
        Self::with(ModelBehavior::Empty)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with(ModelBehavior::FailingLoad(reason.to_string()))
    }

    pub fn failing_inference() -> Self {
        Self::with(ModelBehavior::FailingInference)
    }

    pub fn load_count(&self) -> usize {
        *self.loads.lock().unwrap()
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, _model_path: &Path) -> Result<Box<dyn SegmentationModel>> {
        *self.loads.lock().unwrap() += 1;
        if let ModelBehavior::FailingLoad(reason) = &self.behavior {
            return Err(anyhow!("{}", reason.clone()));
        }
        Ok(Box::new(FakeModel {
            behavior: self.behavior.clone(),
        }))
    }
}

struct FakeModel {
    behavior: ModelBehavior,
}

impl SegmentationModel for FakeModel {
    fn segment(&mut self, frame: &RgbImage) -> Result<Option<Mask>> {
        let (width, height) = frame.dimensions();
        match &self.behavior {
            ModelBehavior::Constant(value) => {
                Ok(Mask::new(width, height, vec![*value; (width * height) as usize]))
            }
            ModelBehavior::Empty => Ok(None),
            ModelBehavior::FailingInference => Err(anyhow!("execution provider crashed")),
            ModelBehavior::FailingLoad(_) => unreachable!("load fails first"),
        }
    }

    fn input_size(&self) -> (u32, u32) {
        (16, 16)
    }
}
