//! Frame geometry: mirroring, center-crop zoom and canvas scaling.

use image::{imageops, RgbImage};
use std::borrow::Cow;

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 3.0;

/// Region of the source frame kept by a zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Center crop for `zoom`. Sizes are rounded down and never below one
/// pixel; odd remainders leave the extra pixel on the right/bottom.
pub fn crop_rect(width: u32, height: u32, zoom: f32) -> CropRect {
    if !zoom.is_finite() || zoom <= 1.0 {
        return CropRect { x: 0, y: 0, width, height };
    }
    let crop_w = ((width as f32 / zoom) as u32).max(1).min(width.max(1));
    let crop_h = ((height as f32 / zoom) as u32).max(1).min(height.max(1));
    CropRect {
        x: width.saturating_sub(crop_w) / 2,
        y: height.saturating_sub(crop_h) / 2,
        width: crop_w,
        height: crop_h,
    }
}

/// Apply a zoom factor. Factors at or below 1.0 hand the input back as is.
pub fn zoom(frame: &RgbImage, zoom: f32) -> Cow<'_, RgbImage> {
    if !zoom.is_finite() || zoom <= 1.0 || frame.width() == 0 || frame.height() == 0 {
        return Cow::Borrowed(frame);
    }
    let rect = crop_rect(frame.width(), frame.height(), zoom);
    let cropped = imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image();
    Cow::Owned(cropped)
}

/// Mirror, zoom and scale a raw camera frame onto the output canvas
pub fn prepare(frame: &RgbImage, zoom_factor: f32, mirror: bool, canvas: (u32, u32)) -> RgbImage {
    let _span = tracing::debug_span!("transform").entered();

    let mirrored;
    let source = if mirror {
        mirrored = imageops::flip_horizontal(frame);
        &mirrored
    } else {
        frame
    };

    let zoomed = zoom(source, zoom_factor);
    if zoomed.dimensions() == canvas {
        return zoomed.into_owned();
    }
    imageops::resize(
        &*zoomed,
        canvas.0,
        canvas.1,
        imageops::FilterType::Triangle,
    )
}
