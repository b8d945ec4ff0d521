// histeq.rs — Global histogram equalization.
//
// Jar photos drift in exposure over a day-long run (room lighting, the
// camera's own auto-exposure). Equalizing before the blur stretches the
// crop's intensities over the full range so the adaptive threshold sees
// comparable contrast from frame to frame.
//
//   1. 256-bin histogram
//   2. cumulative distribution
//   3. remap: out = round((cdf[v] - cdf_min) / (n - cdf_min) * 255)

use crate::image::Image;

/// Equalize a grayscale image. A constant image is returned unchanged.
pub fn equalize_histogram(image: &Image<u8>) -> Image<u8> {
    let n = image.width() * image.height();
    if n == 0 {
        return image.clone();
    }

    let mut hist = [0u32; 256];
    for &v in image.as_slice() {
        hist[v as usize] += 1;
    }

    match build_lut(&hist, n) {
        Some(lut) => image.map(|v| lut[v as usize]),
        None => image.clone(),
    }
}

/// CDF lookup table, or `None` when every pixel shares one value.
fn build_lut(hist: &[u32; 256], total: usize) -> Option<[u8; 256]> {
    let mut cdf = [0u32; 256];
    let mut running = 0u32;
    for (c, &h) in cdf.iter_mut().zip(hist) {
        running += h;
        *c = running;
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denom = total as f32 - cdf_min as f32;
    if denom <= 0.0 {
        return None;
    }

    let mut lut = [0u8; 256];
    for (l, &c) in lut.iter_mut().zip(&cdf) {
        let val = (c as f32 - cdf_min as f32) / denom * 255.0;
        *l = val.round().clamp(0.0, 255.0) as u8;
    }
    Some(lut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretches_narrow_range() {
        // Values packed into 100..=103 spread out to 0..=255.
        let img = Image::from_vec(4, 1, vec![100u8, 101, 102, 103]);
        let eq = equalize_histogram(&img);
        assert_eq!(eq.get(0, 0), 0);
        assert_eq!(eq.get(3, 0), 255);
        assert!(eq.get(1, 0) < eq.get(2, 0));
    }

    #[test]
    fn test_constant_image_unchanged() {
        let img = Image::filled(5, 5, 77u8);
        assert_eq!(equalize_histogram(&img), img);
    }

    #[test]
    fn test_preserves_ordering() {
        let data: Vec<u8> = (0..64).map(|i| (i * 2) as u8 + 40).collect();
        let img = Image::from_vec(8, 8, data);
        let eq = equalize_histogram(&img);
        for w in eq.as_slice().windows(2) {
            assert!(w[0] <= w[1], "equalization must be monotone");
        }
    }

    #[test]
    fn test_empty_image() {
        let img: Image<u8> = Image::new(0, 0);
        assert!(equalize_histogram(&img).is_empty());
    }
}
