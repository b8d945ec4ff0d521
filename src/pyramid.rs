// pyramid.rs — Gaussian image pyramid for coarse-to-fine tracking.
//
// Level 0 is the frame itself as f32. Each further level blurs the level
// above it and keeps every other pixel in both directions, so level n is
// roughly (width / 2^n, height / 2^n). The tracker starts at the coarsest
// level where a large surface displacement becomes a small one.

use crate::convolution::{convolve_separable, gaussian_kernel_1d};
use crate::image::{Image, Pixel};

/// A Gaussian image pyramid, finest level first.
pub struct Pyramid {
    pub levels: Vec<Image<f32>>,
}

impl Pyramid {
    /// Build `num_levels` levels. The kernel spans ±3σ.
    ///
    /// Building stops early once a level would collapse to zero width or
    /// height, so tiny frames get fewer levels than requested.
    ///
    /// # Panics
    /// Panics if `num_levels` is zero.
    pub fn build<T: Pixel>(src: &Image<T>, num_levels: usize, sigma: f32) -> Self {
        assert!(num_levels >= 1, "pyramid must have at least 1 level");

        let half_size = (3.0 * sigma).ceil().max(1.0) as usize;
        let kernel = gaussian_kernel_1d(half_size, sigma);

        let mut levels = Vec::with_capacity(num_levels);
        levels.push(src.map(Pixel::to_f32));

        while levels.len() < num_levels {
            let prev = &levels[levels.len() - 1];
            if prev.width() < 2 || prev.height() < 2 {
                break;
            }
            let blurred = convolve_separable(prev, &kernel, &kernel);
            levels.push(downsample_2x(&blurred));
        }

        Pyramid { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> &Image<f32> {
        &self.levels[level]
    }
}

/// `dst(x, y) = src(2x, 2y)`; odd trailing rows and columns are dropped.
fn downsample_2x(src: &Image<f32>) -> Image<f32> {
    let (w, h) = (src.width() / 2, src.height() / 2);
    let mut data = Vec::with_capacity(w * h);
    for y in 0..h {
        let row = src.row(2 * y);
        data.extend(row.iter().step_by(2).take(w));
    }
    Image::from_vec(w, h, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_odd_dimensions() {
        let img = Image::<f32>::new(7, 5);
        let down = downsample_2x(&img);
        assert_eq!((down.width(), down.height()), (3, 2));
    }

    #[test]
    fn test_downsample_takes_even_pixels() {
        let mut img = Image::<f32>::new(4, 4);
        img.set(0, 0, 1.0);
        img.set(2, 0, 2.0);
        img.set(0, 2, 3.0);
        img.set(2, 2, 4.0);
        let down = downsample_2x(&img);
        assert_eq!(down.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_level_dimensions() {
        let img: Image<u8> = Image::new(640, 480);
        let pyr = Pyramid::build(&img, 4, 1.0);
        let dims: Vec<_> = pyr.levels.iter().map(|l| (l.width(), l.height())).collect();
        assert_eq!(dims, vec![(640, 480), (320, 240), (160, 120), (80, 60)]);
    }

    #[test]
    fn test_stops_before_collapse() {
        let img: Image<u8> = Image::new(5, 3);
        let pyr = Pyramid::build(&img, 6, 1.0);
        // 5x3 → 2x1, then 2x1 cannot halve further.
        assert_eq!(pyr.num_levels(), 2);
        assert_eq!((pyr.level(1).width(), pyr.level(1).height()), (2, 1));
    }

    #[test]
    fn test_level0_is_raw_frame() {
        let img = Image::from_vec(2, 2, vec![10u8, 20, 30, 40]);
        let pyr = Pyramid::build(&img, 1, 1.0);
        assert_eq!(pyr.level(0).as_slice(), &[10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_zero_levels_panics() {
        let img: Image<u8> = Image::new(10, 10);
        Pyramid::build(&img, 0, 1.0);
    }
}
