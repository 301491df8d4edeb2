use super::{CaptureBackend, CaptureSource};
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32, api: ApiBackend, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} via {:?} at {}x{}",
            device_index,
            api,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(width, height),
        ));

        let mut camera = Camera::with_backend(index, requested, api)
            .with_context(|| format!("Failed to open camera via {:?}", api))?;

        camera.open_stream()
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        tracing::info!(
            "Webcam initialized successfully ({}x{})",
            resolution.width(),
            resolution.height()
        );

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .context("Failed to capture frame")?;

        let decoded = frame.decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(decoded)
    }

    fn is_open(&self) -> bool {
        self.camera.is_stream_open()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn close(&mut self) -> Result<()> {
        if self.camera.is_stream_open() {
            self.camera
                .stop_stream()
                .context("Failed to stop camera stream")?;
        }
        Ok(())
    }
}

/// Opens a `WebcamCapture` through one specific nokhwa API backend
pub struct NokhwaBackend {
    name: String,
    api: ApiBackend,
    device_index: u32,
    width: u32,
    height: u32,
}

impl NokhwaBackend {
    pub fn new(api: ApiBackend, device_index: u32, width: u32, height: u32) -> Self {
        Self {
            name: format!("{:?}", api),
            api,
            device_index,
            width,
            height,
        }
    }
}

impl CaptureBackend for NokhwaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn CaptureSource>> {
        let capture = WebcamCapture::new(self.device_index, self.api, self.width, self.height)?;
        Ok(Box::new(capture))
    }
}

/// Video4Linux (the backend compiled in through `input-v4l`) first, then
/// nokhwa's auto selection
pub fn platform_backends(device_index: u32, width: u32, height: u32) -> Vec<Box<dyn CaptureBackend>> {
    [ApiBackend::Video4Linux, ApiBackend::Auto]
        .into_iter()
        .map(|api| Box::new(NokhwaBackend::new(api, device_index, width, height)) as Box<dyn CaptureBackend>)
        .collect()
}
