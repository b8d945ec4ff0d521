// threshold.rs — Inverted adaptive threshold.
//
// Bubbles read as dark pockets against the lighter starter, so the mask
// marks pixels that are darker than their surroundings:
//
//   foreground(x, y)  ⇔  src(x, y) <= mean_block(x, y) - c
//
// The local mean is taken over an odd `block_size` window with replicated
// borders, either flat (box) or Gaussian weighted. As with any 8-bit
// filter chain the mean is rounded to an integer and `c` is rounded up
// before comparison, so results are stable across platforms.

use serde::{Deserialize, Serialize};

use crate::convolution::{box_kernel, convolve_separable, gaussian_kernel_for_size};
use crate::image::Image;

/// Mask value for foreground pixels.
pub const FOREGROUND: u8 = 255;

/// Neighborhood weighting for the local mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptiveMethod {
    Mean,
    Gaussian,
}

/// Binary mask (0 / 255) of pixels at least `c` darker than their
/// neighborhood.
///
/// # Panics
/// Panics if `block_size` is even or smaller than 3.
pub fn adaptive_threshold_inv(
    src: &Image<u8>,
    method: AdaptiveMethod,
    block_size: usize,
    c: f32,
) -> Image<u8> {
    assert!(
        block_size >= 3 && block_size % 2 == 1,
        "block size must be odd and >= 3 (got {block_size})"
    );
    if src.is_empty() {
        return Image::new(src.width(), src.height());
    }

    let kernel = match method {
        AdaptiveMethod::Mean => box_kernel(block_size),
        AdaptiveMethod::Gaussian => gaussian_kernel_for_size(block_size),
    };
    let mean = convolve_separable(src, &kernel, &kernel);
    let delta = c.ceil() as i32;

    let data = src
        .as_slice()
        .iter()
        .zip(mean.as_slice())
        .map(|(&v, &m)| {
            if v as i32 - m.round() as i32 <= -delta {
                FOREGROUND
            } else {
                0
            }
        })
        .collect();
    Image::from_vec(src.width(), src.height(), data)
}
