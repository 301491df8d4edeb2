use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

pub const MAX_LINES: usize = 6;
pub const MAX_LINE_CHARS: usize = 64;
pub const LINE_HEIGHT: u32 = 26;
pub const LEFT_MARGIN: u32 = 10;
pub const TOP_MARGIN: u32 = 8;
/// Each 8x8 glyph cell is drawn at this many pixels per font pixel
pub const GLYPH_SCALE: u32 = 2;

const FALLBACK_TEXT: &str = "error";

/// Lines that actually get drawn for a message
pub fn layout_lines(message: &str) -> Vec<String> {
    if message.is_empty() {
        return vec![FALLBACK_TEXT.to_string()];
    }
    message
        .lines()
        .take(MAX_LINES)
        .map(|line| line.chars().take(MAX_LINE_CHARS).collect())
        .collect()
}

/// Draw `message` top-left aligned. Glyphs running off the canvas are
/// clipped.
pub fn draw_message(image: &mut RgbImage, message: &str, color: Rgb<u8>) {
    for (row, line) in layout_lines(message).iter().enumerate() {
        let y = TOP_MARGIN + row as u32 * LINE_HEIGHT;
        draw_line(image, LEFT_MARGIN, y, line, color);
    }
}

fn draw_line(image: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    let advance = 8 * GLYPH_SCALE;
    for (index, ch) in text.chars().enumerate() {
        let origin_x = x + index as u32 * advance;
        if origin_x >= image.width() {
            break;
        }
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        draw_glyph(image, origin_x, y, &glyph, color);
    }
}

fn draw_glyph(image: &mut RgbImage, x: u32, y: u32, glyph: &[u8; 8], color: Rgb<u8>) {
    for (gy, bits) in glyph.iter().enumerate() {
        for gx in 0..8u32 {
            if bits & (1 << gx) == 0 {
                continue;
            }
            for sy in 0..GLYPH_SCALE {
                for sx in 0..GLYPH_SCALE {
                    let px = x + gx * GLYPH_SCALE + sx;
                    let py = y + gy as u32 * GLYPH_SCALE + sy;
                    if px < image.width() && py < image.height() {
                        image.put_pixel(px, py, color);
                    }
                }
            }
        }
    }
}
