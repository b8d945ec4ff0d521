// convert.rs — Bridges between the `image` crate and `Image<T>`.
//
// Frames arrive as `DynamicImage` from the decoder; everything downstream
// works on `Image<u8>` luma. Overlays go the other way, into an `RgbImage`.
//
// Luma uses ITU-R BT.601 weights: Y = 0.299 R + 0.587 G + 0.114 B.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::image::{Image, Pixel};

/// Copy an 8-bit luma buffer into an `Image<u8>`.
pub fn from_gray_image(src: &GrayImage) -> Image<u8> {
    let (w, h) = src.dimensions();
    Image::from_vec(w as usize, h as usize, src.as_raw().clone())
}

/// BT.601 luma of an RGB buffer.
pub fn rgb_to_gray(src: &RgbImage) -> Image<u8> {
    let (w, h) = src.dimensions();
    let data = src
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            u8::from_f32(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        })
        .collect();
    Image::from_vec(w as usize, h as usize, data)
}

/// Grayscale and color variants of a decoded frame.
///
/// Already-gray sources skip the color copy unless `keep_color` asks for it.
pub fn split_dynamic(src: DynamicImage, keep_color: bool) -> (Image<u8>, Option<RgbImage>) {
    match src {
        DynamicImage::ImageLuma8(g) => {
            let gray = from_gray_image(&g);
            let color = keep_color.then(|| DynamicImage::ImageLuma8(g).to_rgb8());
            (gray, color)
        }
        other => {
            let rgb = other.to_rgb8();
            let gray = rgb_to_gray(&rgb);
            (gray, keep_color.then_some(rgb))
        }
    }
}

/// Expand `Image<u8>` luma to a gray-looking RGB buffer for drawing.
pub fn gray_to_rgb(src: &Image<u8>) -> RgbImage {
    let mut out = RgbImage::new(src.width() as u32, src.height() as u32);
    for (x, y, v) in src.pixels() {
        out.put_pixel(x as u32, y as u32, image::Rgb([v, v, v]));
    }
    out
}

/// Saturating f32 → u8 conversion, rounding to nearest.
pub fn f32_to_u8(src: &Image<f32>) -> Image<u8> {
    src.map(u8::from_f32)
}
