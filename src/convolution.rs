// convolution.rs — Separable convolution and the smoothing kernels built on it.
//
// Used in two places:
//   - pyramid construction for the tracker (Gaussian with explicit sigma)
//   - bubble segmentation: the pre-threshold blur and the local mean of the
//     adaptive threshold (Gaussian or box, sized by an odd kernel length)
//
// A separable kernel K = k_col * k_row^T is applied as a horizontal pass
// followed by a vertical pass. Borders replicate the edge pixel.

use crate::image::{Image, Pixel};

/// Horizontal pass: convolve each row with a centered, odd-length kernel.
pub fn convolve_rows<T: Pixel>(src: &Image<T>, kernel: &[f32]) -> Image<f32> {
    check_kernel(kernel);
    let (w, h) = (src.width(), src.height());
    let mut dst = Image::<f32>::new(w, h);
    if src.is_empty() {
        return dst;
    }
    let half = kernel.len() / 2;

    for y in 0..h {
        let row = src.row(y);
        for x in 0..w {
            let acc = if x >= half && x + half < w {
                // Fully inside: plain dot product over the row slice.
                row[x - half..=x + half]
                    .iter()
                    .zip(kernel)
                    .map(|(&p, &k)| p.to_f32() * k)
                    .sum()
            } else {
                kernel
                    .iter()
                    .enumerate()
                    .map(|(ki, &k)| row[replicate(x, ki, half, w)].to_f32() * k)
                    .sum()
            };
            // SAFETY: x < w, y < h.
            unsafe { dst.set_unchecked(x, y, acc) };
        }
    }
    dst
}

/// Vertical pass: convolve each column with a centered, odd-length kernel.
pub fn convolve_cols(src: &Image<f32>, kernel: &[f32]) -> Image<f32> {
    check_kernel(kernel);
    let (w, h) = (src.width(), src.height());
    let mut dst = Image::<f32>::new(w, h);
    if src.is_empty() {
        return dst;
    }
    let half = kernel.len() / 2;

    for y in 0..h {
        // Resolve the source rows once per output row, then sweep columns.
        let rows: Vec<&[f32]> = (0..kernel.len())
            .map(|ki| src.row(replicate(y, ki, half, h)))
            .collect();
        for x in 0..w {
            let acc: f32 = rows.iter().zip(kernel).map(|(r, &k)| r[x] * k).sum();
            // SAFETY: x < w, y < h.
            unsafe { dst.set_unchecked(x, y, acc) };
        }
    }
    dst
}

/// Horizontal then vertical pass. Output is always f32.
///
/// # Panics
/// Panics if either kernel is empty or has even length.
pub fn convolve_separable<T: Pixel>(
    src: &Image<T>,
    kernel_row: &[f32],
    kernel_col: &[f32],
) -> Image<f32> {
    let intermediate = convolve_rows(src, kernel_row);
    convolve_cols(&intermediate, kernel_col)
}

/// Normalized 1D Gaussian of length `2 * half_size + 1`.
///
/// ```
/// let k = rise_track::convolution::gaussian_kernel_1d(2, 1.0);
/// assert_eq!(k.len(), 5);
/// assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
/// ```
pub fn gaussian_kernel_1d(half_size: usize, sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "sigma must be positive");
    let two_sigma_sq = 2.0 * sigma * sigma;
    let raw: Vec<f32> = (0..2 * half_size + 1)
        .map(|i| {
            let x = i as f32 - half_size as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();
    normalize(raw)
}

/// Sigma implied by an odd kernel length when none is given explicitly.
///
/// This is the usual convention for "blur with an N-tap Gaussian":
/// `0.3 * ((k - 1) / 2 - 1) + 0.8`.
pub fn sigma_for_kernel_size(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian of odd length `ksize`, sigma derived from the length.
/// `ksize == 1` is the identity kernel.
///
/// # Panics
/// Panics if `ksize` is zero or even.
pub fn gaussian_kernel_for_size(ksize: usize) -> Vec<f32> {
    assert!(ksize % 2 == 1, "kernel size must be odd (got {ksize})");
    if ksize == 1 {
        return vec![1.0];
    }
    gaussian_kernel_1d(ksize / 2, sigma_for_kernel_size(ksize))
}

/// Uniform averaging kernel of odd length `ksize`.
pub fn box_kernel(ksize: usize) -> Vec<f32> {
    assert!(ksize % 2 == 1, "kernel size must be odd (got {ksize})");
    vec![1.0 / ksize as f32; ksize]
}

/// Gaussian blur with an odd `ksize × ksize` kernel.
pub fn gaussian_blur<T: Pixel>(src: &Image<T>, ksize: usize) -> Image<f32> {
    let k = gaussian_kernel_for_size(ksize);
    convolve_separable(src, &k, &k)
}

// ---------------------------------------------------------------------------

fn check_kernel(kernel: &[f32]) {
    assert!(!kernel.is_empty(), "kernel must not be empty");
    assert!(kernel.len() % 2 == 1, "kernel length must be odd (got {})", kernel.len());
}

/// Source index for tap `ki` centred on `i`, replicated into `[0, len)`.
#[inline]
fn replicate(i: usize, ki: usize, half: usize, len: usize) -> usize {
    let s = i as isize + ki as isize - half as isize;
    s.clamp(0, len as isize - 1) as usize
}

fn normalize(mut kernel: Vec<f32>) -> Vec<f32> {
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}
