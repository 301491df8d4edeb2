mod nokhwa_capture;
pub mod permission;

pub use nokhwa_capture::platform_backends;
pub use permission::{AuthState, AuthorizationProvider, PermissionGate};

use crate::error::{OpenError, RuntimeError};
use anyhow::Result;
use image::RgbImage;

const OPEN_FAILED_MESSAGE: &str = "check the camera permission.";

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture a single frame
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Whether the underlying stream is still delivering frames
    fn is_open(&self) -> bool;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);

    /// Stop the stream. Must tolerate being called more than once.
    fn close(&mut self) -> Result<()>;
}

/// One way of reaching the camera (a platform API, a generic fallback, ...)
pub trait CaptureBackend {
    fn name(&self) -> &str;

    fn open(&self) -> Result<Box<dyn CaptureSource>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unopened,
    Open,
    PermissionDenied,
    OpenFailed,
}

/// Owns the capture device for the lifetime of the pipeline.
///
/// Backends are tried in order on every `open`; the first one that hands
/// back an open stream is kept. Failure messages are kept for the
/// placeholder and replaced on every new failure.
pub struct DeviceHandle {
    backends: Vec<Box<dyn CaptureBackend>>,
    source: Option<Box<dyn CaptureSource>>,
    state: DeviceState,
    last_error: Option<String>,
}

impl DeviceHandle {
    pub fn new(backends: Vec<Box<dyn CaptureBackend>>) -> Self {
        Self {
            backends,
            source: None,
            state: DeviceState::Unopened,
            last_error: None,
        }
    }

    pub fn open(&mut self, gate: &mut PermissionGate) -> Result<(), OpenError> {
        self.close_source();

        if let Err(err) = gate.ensure_access() {
            tracing::warn!("Camera access refused: {}", err);
            self.state = DeviceState::PermissionDenied;
            self.last_error = Some(err.to_string());
            return Err(err.into());
        }

        for backend in &self.backends {
            tracing::debug!("Trying capture backend {}", backend.name());
            match backend.open() {
                Ok(source) if source.is_open() => {
                    let (width, height) = source.resolution();
                    tracing::info!(
                        "Camera opened via {} at {}x{}",
                        backend.name(),
                        width,
                        height
                    );
                    self.source = Some(source);
                    self.state = DeviceState::Open;
                    self.last_error = None;
                    return Ok(());
                }
                Ok(mut source) => {
                    tracing::debug!("Backend {} returned a closed stream", backend.name());
                    if let Err(err) = source.close() {
                        tracing::debug!("Closing rejected source failed: {:#}", err);
                    }
                }
                Err(err) => {
                    tracing::warn!("Backend {} failed to open: {:#}", backend.name(), err);
                }
            }
        }

        self.state = DeviceState::OpenFailed;
        self.last_error = Some(OPEN_FAILED_MESSAGE.to_string());
        Err(OpenError::Unavailable(format!(
            "no capture backend opened ({} tried)",
            self.backends.len()
        )))
    }

    /// Read one frame. A failed read is transient: it is logged and `None`
    /// is returned without touching the device state.
    pub fn read(&mut self) -> Option<RgbImage> {
        let source = self.source.as_mut()?;
        match source.capture_frame() {
            Ok(frame) => Some(frame),
            Err(err) => {
                let err = RuntimeError::TransientReadFailure(format!("{:#}", err));
                tracing::debug!("{}", err);
                None
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.source.as_ref().is_some_and(|source| source.is_open())
    }

    pub fn release(&mut self) {
        if self.source.is_some() {
            tracing::info!("Releasing camera");
        }
        self.close_source();
        self.state = DeviceState::Unopened;
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn close_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            if let Err(err) = source.close() {
                tracing::warn!("Failed to close camera stream: {:#}", err);
            }
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.release();
    }
}
