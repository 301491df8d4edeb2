//! Turning prepared frames (and optional masks) into presentation bitmaps.

mod text;

use crate::error::RuntimeError;
use crate::segmentation::Mask;
use image::{Rgb, RgbImage};

/// Display clip applied by the presentation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Shape {
    #[default]
    Square,
    /// Ellipse inscribed in the bitmap bounds
    Circle,
}

impl Shape {
    pub fn toggled(self) -> Self {
        match self {
            Shape::Square => Shape::Circle,
            Shape::Circle => Shape::Square,
        }
    }

    /// Whether pixel (x, y) of a `width` x `height` bitmap survives the clip
    pub fn contains(self, x: u32, y: u32, width: u32, height: u32) -> bool {
        match self {
            Shape::Square => x < width && y < height,
            Shape::Circle => {
                if width == 0 || height == 0 {
                    return false;
                }
                let rx = width as f32 / 2.0;
                let ry = height as f32 / 2.0;
                let dx = (x as f32 + 0.5 - rx) / rx;
                let dy = (y as f32 + 0.5 - ry) / ry;
                dx * dx + dy * dy <= 1.0
            }
        }
    }
}

/// Channel order expected by the presentation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    fn for_order(order: ChannelOrder, alpha: bool) -> Self {
        match (order, alpha) {
            (ChannelOrder::Rgb, false) => PixelFormat::Rgb8,
            (ChannelOrder::Bgr, false) => PixelFormat::Bgr8,
            (ChannelOrder::Rgb, true) => PixelFormat::Rgba8,
            (ChannelOrder::Bgr, true) => PixelFormat::Bgra8,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        self.channels() == 4
    }

    fn is_bgr(self) -> bool {
        matches!(self, PixelFormat::Bgr8 | PixelFormat::Bgra8)
    }
}

/// Packed, row-major pixels ready for a presentation surface
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub row_bytes: usize,
    pub pixels: Vec<u8>,
    pub clip: Shape,
}

impl Bitmap {
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn with_clip(mut self, clip: Shape) -> Self {
        self.clip = clip;
        self
    }

    /// Pixel at (x, y) as RGBA, whatever the stored format
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.row_bytes + x as usize * self.channels();
        let px = &self.pixels[offset..offset + self.channels()];
        let (r, b) = if self.format.is_bgr() { (px[2], px[0]) } else { (px[0], px[2]) };
        let a = if self.format.has_alpha() { px[3] } else { 255 };
        [r, px[1], b, a]
    }
}

/// Builds presentation bitmaps. Pure pixel work: no resampling happens
/// here, frames arrive already scaled to the canvas.
pub struct Compositor {
    order: ChannelOrder,
    background: Rgb<u8>,
    text_color: Rgb<u8>,
}

impl Compositor {
    pub fn new(order: ChannelOrder) -> Self {
        Self {
            order,
            background: Rgb([0, 0, 0]),
            text_color: Rgb([255, 255, 255]),
        }
    }

    /// Reorder the frame's channels for presentation and, with a mask, add
    /// a hard-thresholded alpha channel. Hidden pixels keep their color.
    pub fn compose(&self, frame: &RgbImage, mask: Option<&Mask>, shape: Shape) -> Result<Bitmap, RuntimeError> {
        let _span = tracing::debug_span!("compose").entered();

        if let Some(mask) = mask {
            if mask.dimensions() != frame.dimensions() {
                return Err(RuntimeError::UnexpectedCompositeFailure(format!(
                    "mask {:?} does not match frame {:?}",
                    mask.dimensions(),
                    frame.dimensions()
                )));
            }
        }

        let format = PixelFormat::for_order(self.order, mask.is_some());
        let channels = format.channels();
        let (width, height) = frame.dimensions();
        let mut pixels = Vec::with_capacity(width as usize * height as usize * channels);

        for (index, pixel) in frame.pixels().enumerate() {
            let [r, g, b] = pixel.0;
            match self.order {
                ChannelOrder::Rgb => pixels.extend_from_slice(&[r, g, b]),
                ChannelOrder::Bgr => pixels.extend_from_slice(&[b, g, r]),
            }
            if let Some(mask) = mask {
                pixels.push(mask.alpha_at(index));
            }
        }

        Ok(Bitmap {
            width,
            height,
            format,
            row_bytes: width as usize * channels,
            pixels,
            clip: shape,
        })
    }

    /// Opaque bitmap carrying `message` as text. An empty message reads
    /// "error".
    pub fn placeholder(&self, message: &str, width: u32, height: u32) -> Bitmap {
        let mut canvas = RgbImage::from_pixel(width, height, self.background);
        text::draw_message(&mut canvas, message, self.text_color);

        let format = PixelFormat::for_order(self.order, false);
        let pixels = match self.order {
            ChannelOrder::Rgb => canvas.into_raw(),
            ChannelOrder::Bgr => canvas
                .pixels()
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect(),
        };

        Bitmap {
            width,
            height,
            format,
            row_bytes: width as usize * format.channels(),
            pixels,
            clip: Shape::Square,
        }
    }
}
