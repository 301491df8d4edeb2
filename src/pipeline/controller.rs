use super::{PipelineConfig, PipelineParameters};
use crate::capture::{DeviceHandle, PermissionGate};
use crate::compose::{Bitmap, Compositor, Shape};
use crate::diagnostics::DiagnosticsSink;
use crate::error::{InitError, RuntimeError};
use crate::segmentation::{ModelState, SegmentationEngine};
use crate::transform;
use std::time::{Duration, Instant};

const CAMERA_UNAVAILABLE: &str = "camera unavailable.";
const UNEXPECTED_FAILURE: &str = "an error occurred. check the log.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing shown yet
    Idle,
    Streaming,
    /// A placeholder is on screen, carrying this message
    Degraded(String),
}

/// Time spent in each stage during the last tick
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub capture: Duration,
    pub transform: Duration,
    pub segment: Duration,
    pub compose: Duration,
}

/// Per-tick state machine over device, model and compositor.
///
/// Everything here is touched from the tick thread only. The one thing
/// crossing threads is the permission gate's refresh flag, consumed at the
/// top of `tick`.
pub struct PipelineController {
    config: PipelineConfig,
    device: DeviceHandle,
    permission: PermissionGate,
    engine: SegmentationEngine,
    compositor: Compositor,
    diagnostics: DiagnosticsSink,
    params: PipelineParameters,
    state: PipelineState,
    retry_counter: u64,
    reopen_attempts: u64,
    displayed: Option<Bitmap>,
    /// Message of the placeholder in `displayed`, if that is what it holds
    placeholder_message: Option<String>,
    timings: StageTimings,
}

impl PipelineController {
    pub fn new(
        config: PipelineConfig,
        device: DeviceHandle,
        permission: PermissionGate,
        engine: SegmentationEngine,
        diagnostics: DiagnosticsSink,
        params: PipelineParameters,
    ) -> Self {
        let compositor = Compositor::new(config.channel_order);
        Self {
            config,
            device,
            permission,
            engine,
            compositor,
            diagnostics,
            params,
            state: PipelineState::Idle,
            retry_counter: 0,
            reopen_attempts: 0,
            displayed: None,
            placeholder_message: None,
            timings: StageTimings::default(),
        }
    }

    /// Open the camera once. Failure is not fatal: ticks keep retrying.
    pub fn start(&mut self) {
        if let Err(err) = self.device.open(&mut self.permission) {
            tracing::warn!("Camera not available at startup: {}", err);
        }
    }

    /// Run one tick and return the bitmap that should be on screen now
    pub fn tick(&mut self) -> Option<&Bitmap> {
        self.timings = StageTimings::default();

        if self.permission.take_pending_refresh() {
            self.refresh_permission();
        }

        if let Err(err) = self.step() {
            tracing::error!("Tick failed: {}", err);
            self.show_placeholder(UNEXPECTED_FAILURE);
        }

        self.displayed.as_ref()
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        if !self.device.is_live() {
            self.retry_counter += 1;
            if self.retry_counter % self.config.retry_interval.max(1) == 0 {
                self.reopen_device();
                if self.device.is_live() {
                    return Ok(());
                }
            }
            let message = self
                .device
                .last_error()
                .unwrap_or(CAMERA_UNAVAILABLE)
                .to_string();
            self.show_placeholder(&message);
            return Ok(());
        }

        let started = Instant::now();
        let Some(raw) = self.device.read() else {
            return Ok(());
        };
        self.timings.capture = started.elapsed();

        if self.params.cutout_enabled() && !self.model_available() {
            return Ok(());
        }

        let started = Instant::now();
        let frame = transform::prepare(&raw, self.params.zoom(), self.config.mirror, self.config.canvas);
        self.timings.transform = started.elapsed();

        let mask = if self.params.cutout_enabled() {
            let started = Instant::now();
            let mask = self.engine.segment(&frame)?;
            self.timings.segment = started.elapsed();
            match mask {
                Some(mask) => Some(mask),
                None => {
                    tracing::debug!("Model produced no mask; keeping previous frame");
                    return Ok(());
                }
            }
        } else {
            None
        };

        let started = Instant::now();
        let bitmap = self.compositor.compose(&frame, mask.as_ref(), self.params.shape())?;
        self.timings.compose = started.elapsed();

        self.show_frame(bitmap);
        Ok(())
    }

    /// Make sure the model can be used this tick, building it on first use.
    /// A cached failure is shown, not retried.
    fn model_available(&mut self) -> bool {
        if matches!(self.engine.state(), ModelState::NotInitialized) {
            // the failure lands in the engine state and is shown below
            let _ = self.engine.ensure_ready();
        }
        if let ModelState::InitFailed(err) = self.engine.state() {
            let message = err.to_string();
            self.show_placeholder(&message);
            return false;
        }
        true
    }

    fn reopen_device(&mut self) {
        self.reopen_attempts += 1;
        tracing::info!("Reopening camera (attempt {})", self.reopen_attempts);
        if let Err(err) = self.device.open(&mut self.permission) {
            tracing::debug!("Camera still unavailable: {}", err);
        }
    }

    /// Re-query authorization after the prompt completed. Reopening stays
    /// on the retry cadence.
    fn refresh_permission(&mut self) {
        let state = self.permission.is_authorized();
        tracing::info!("Camera authorization refreshed: {:?}", state);
    }

    fn show_frame(&mut self, bitmap: Bitmap) {
        if self.state != PipelineState::Streaming {
            tracing::info!("Streaming");
        }
        self.displayed = Some(bitmap);
        self.placeholder_message = None;
        self.state = PipelineState::Streaming;
    }

    fn show_placeholder(&mut self, message: &str) {
        let shape = self.params.shape();
        let cached = self.placeholder_message.as_deref() == Some(message);

        if cached {
            if let Some(bitmap) = self.displayed.as_mut() {
                bitmap.clip = shape;
            }
        } else {
            self.diagnostics.record(message);
            let (width, height) = self.config.canvas;
            let bitmap = self.compositor.placeholder(message, width, height).with_clip(shape);
            self.displayed = Some(bitmap);
            self.placeholder_message = Some(message.to_string());
        }

        if !matches!(&self.state, PipelineState::Degraded(current) if current == message) {
            tracing::info!("Showing placeholder: {}", message.replace('\n', " | "));
        }
        self.state = PipelineState::Degraded(message.to_string());
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let zoom = self.params.set_zoom(zoom);
        tracing::debug!("Zoom {:.1}x", zoom);
        zoom
    }

    pub fn set_shape(&mut self, shape: Shape) {
        tracing::debug!("Shape {:?}", shape);
        self.params.set_shape(shape);
    }

    /// Turn background removal on or off. Turning it on builds the model
    /// right away; if that fails the toggle is rejected and the reason is
    /// put on screen.
    pub fn set_cutout_enabled(&mut self, enabled: bool) -> Result<(), InitError> {
        if !enabled {
            if self.params.cutout_enabled() {
                tracing::info!("Background removal off");
            }
            self.params.set_cutout_enabled(false);
            return Ok(());
        }

        if self.params.cutout_enabled() && self.engine.is_ready() {
            return Ok(());
        }

        match self.engine.ensure_ready() {
            Ok(()) => {
                tracing::info!("Background removal on");
                self.params.set_cutout_enabled(true);
                Ok(())
            }
            Err(err) => {
                self.params.set_cutout_enabled(false);
                self.show_placeholder(&err.to_string());
                Err(err)
            }
        }
    }

    pub fn params(&self) -> &PipelineParameters {
        &self.params
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    #[cfg(test)]
    pub fn displayed(&self) -> Option<&Bitmap> {
        self.displayed.as_ref()
    }

    pub fn reopen_attempts(&self) -> u64 {
        self.reopen_attempts
    }

    pub fn timings(&self) -> StageTimings {
        self.timings
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Release the camera. The model is left to process teardown.
    pub fn shutdown(&mut self) {
        self.device.release();
    }
}
