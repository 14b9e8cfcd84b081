//! Color space conversion and image export.
//!
//! All shading happens in linear RGB; conversion to sRGB happens only at the
//! output boundary. Uses the official sRGB transfer function (breakpoint at
//! 0.04045), not the gamma 2.2 approximation.

use image::{Rgba, RgbaImage};

use crate::core::buffer::FieldBuffer;

/// Convert sRGB u8 (0-255) to linear f32 (0.0-1.0).
pub fn srgb_u8_to_linear_f32(u: u8) -> f32 {
    let cs = (u as f32) / 255.0;
    if cs <= 0.04045 {
        cs / 12.92
    } else {
        ((cs + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert linear f32 (0.0-1.0) to sRGB u8 (0-255).
pub fn linear_f32_to_srgb_u8(x: f32) -> u8 {
    let x = x.clamp(0.0, 1.0);
    let cs = if x <= 0.0031308 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    };
    (cs * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Export a shaded RGBA buffer (linear color + alpha) as an sRGB image.
/// Alpha is passed through linearly.
pub fn buffer_to_rgba8(buf: &FieldBuffer) -> RgbaImage {
    assert_eq!(buf.channels(), 4, "expected a 4-channel shaded buffer");
    let mut img = RgbaImage::new(buf.width() as u32, buf.height() as u32);
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            let p = buf.pixel(x, y);
            img.put_pixel(
                x as u32,
                y as u32,
                Rgba([
                    linear_f32_to_srgb_u8(p[0]),
                    linear_f32_to_srgb_u8(p[1]),
                    linear_f32_to_srgb_u8(p[2]),
                    (p[3].clamp(0.0, 1.0) * 255.0).round() as u8,
                ]),
            );
        }
    }
    img
}
