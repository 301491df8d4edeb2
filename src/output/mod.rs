mod loopback;

pub use loopback::V4L2Output;

use crate::compose::Bitmap;
use anyhow::Result;
use image::{Rgb, RgbImage};

/// Trait for presentation surfaces
pub trait PresentationSurface {
    /// Show a bitmap. Called once per tick with whatever is on screen.
    fn present(&mut self, bitmap: &Bitmap) -> Result<()>;
}

/// Bake alpha and the clip shape into an opaque RGB image, with
/// `background` showing through transparent and clipped pixels
pub fn flatten(bitmap: &Bitmap, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(bitmap.width, bitmap.height, |x, y| {
        if !bitmap.clip.contains(x, y, bitmap.width, bitmap.height) {
            return background;
        }
        let [r, g, b, a] = bitmap.rgba_at(x, y);
        let blend = |fg: u8, bg: u8| ((fg as u16 * a as u16 + bg as u16 * (255 - a as u16)) / 255) as u8;
        Rgb([
            blend(r, background[0]),
            blend(g, background[1]),
            blend(b, background[2]),
        ])
    })
}
