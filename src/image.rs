// image.rs — Runtime-sized grayscale image container, generic over pixel type.
//
// Every stage of the pipeline speaks `Image<T>`:
//
//   frame decode ──► Image<u8> ──► pyramid (Image<f32>) ──► KLT
//                        │
//                        └──► crop ──► blur (Image<f32>) ──► threshold (Image<u8>) ──► contours
//
// The buffer is row-major and tightly packed (stride == width). Frames come
// from JPEG/PNG decoders that already hand us packed rows, so there is no
// alignment padding to carry around.

use std::fmt;

// ---------------------------------------------------------------------------
// Pixel trait
// ---------------------------------------------------------------------------

/// Types that can be stored in an `Image`.
///
/// `PartialOrd` is required so thresholding can compare raw values;
/// `Send + Sync` lets crops cross into rayon workers.
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Raw conversion to f32 (u8 42 → 42.0, not normalized).
    fn to_f32(self) -> f32;

    /// Conversion back from f32, clamping and rounding where needed.
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        // `as u8` saturates but truncates; round first.
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D image with runtime dimensions. `(x, y)` is (column, row).
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// Create a zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create an image filled with a constant value.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap an existing row-major pixel vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the image has no pixels (either dimension is zero).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.bounds_check(x, y);
        self.data[y * self.width + x] = value;
    }

    /// Read with signed coordinates; anything outside the image is `None`.
    /// Contour tracing walks off the edge routinely, so this never panics.
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize) -> Option<T> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(self.data[y as usize * self.width + x as usize])
        }
    }

    /// Get pixel value without bounds checking.
    ///
    /// # Safety
    /// Caller must guarantee `x < width` and `y < height`.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, x: usize, y: usize) -> T {
        debug_assert!(
            x < self.width && y < self.height,
            "get_unchecked({x},{y}) out of bounds for {}x{}",
            self.width,
            self.height
        );
        *self.data.get_unchecked(y * self.width + x)
    }

    /// Set pixel value without bounds checking.
    ///
    /// # Safety
    /// Caller must guarantee `x < width` and `y < height`.
    #[inline(always)]
    pub unsafe fn set_unchecked(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < self.width && y < self.height);
        *self.data.get_unchecked_mut(y * self.width + x) = value;
    }

    /// Borrow one row.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Borrow a rectangular region without copying.
    ///
    /// # Panics
    /// Panics if the region extends beyond the image.
    pub fn sub_image(&self, x: usize, y: usize, w: usize, h: usize) -> ImageView<'_, T> {
        assert!(
            x + w <= self.width && y + h <= self.height,
            "sub_image region ({x},{y},{w},{h}) exceeds image bounds ({},{})",
            self.width,
            self.height,
        );
        ImageView {
            parent: self,
            x0: x,
            y0: y,
            width: w,
            height: h,
        }
    }

    /// Copy out the intersection of the rectangle with the image.
    ///
    /// Unlike `sub_image` this clips instead of panicking: a rectangle that
    /// lies entirely outside yields an empty image.
    pub fn crop(&self, x: usize, y: usize, w: usize, h: usize) -> Image<T> {
        let x0 = x.min(self.width);
        let y0 = y.min(self.height);
        let x1 = x.saturating_add(w).min(self.width);
        let y1 = y.saturating_add(h).min(self.height);
        self.sub_image(x0, y0, x1 - x0, y1 - y0).to_owned_image()
    }

    /// Iterate over all pixels as `(x, y, value)`.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i % w, i / w, v))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Apply `f` to every pixel, producing an image of another pixel type.
    pub fn map<U: Pixel>(&self, f: impl Fn(T) -> U) -> Image<U> {
        Image {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            let row = &self.row(y)[..self.width.min(16)];
            write!(f, "  row {y}: {row:?}")?;
            if self.width > 16 {
                write!(f, " ...")?;
            }
            writeln!(f)?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

impl<T: Pixel> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Pixel> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}

// ---------------------------------------------------------------------------
// ImageView<'a, T>
// ---------------------------------------------------------------------------
// A view borrows its parent, so the parent can be neither mutated nor
// dropped while the view is alive. Coordinates are view-local.

/// A borrowed, read-only rectangular region of an `Image<T>`.
pub struct ImageView<'a, T: Pixel> {
    parent: &'a Image<T>,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
}

impl<'a, T: Pixel> ImageView<'a, T> {
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Top-left corner of the view in parent coordinates.
    pub fn origin(&self) -> (usize, usize) {
        (self.x0, self.y0)
    }

    /// (0, 0) is the top-left of the view, not of the parent.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        assert!(
            x < self.width && y < self.height,
            "ImageView pixel ({x},{y}) out of bounds for view {}×{}",
            self.width,
            self.height,
        );
        self.parent.get(self.x0 + x, self.y0 + y)
    }

    /// Copy the viewed pixels into a new owned image.
    pub fn to_owned_image(&self) -> Image<T> {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let row = self.parent.row(self.y0 + y);
            data.extend_from_slice(&row[self.x0..self.x0 + self.width]);
        }
        Image::from_vec(self.width, self.height, data)
    }
}

// ---------------------------------------------------------------------------
// Bilinear interpolation
// ---------------------------------------------------------------------------

/// Sub-pixel sample of an f32 image.
///
/// Coordinates are clamped to the image, so samples beyond the border
/// replicate the edge pixel. The KLT patch routinely hangs over the border
/// of coarse pyramid levels; clamping keeps that well defined.
///
/// # Panics
/// Panics if the image is empty.
pub fn interpolate_bilinear(img: &Image<f32>, x: f32, y: f32) -> f32 {
    assert!(!img.is_empty(), "cannot interpolate on an empty image");

    let x = x.clamp(0.0, (img.width() - 1) as f32);
    let y = y.clamp(0.0, (img.height() - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    // SAFETY: x0, x1 < width and y0, y1 < height after clamping.
    unsafe {
        let p00 = img.get_unchecked(x0, y0);
        let p10 = img.get_unchecked(x1, y0);
        let p01 = img.get_unchecked(x0, y1);
        let p11 = img.get_unchecked(x1, y1);
        (1.0 - fx) * (1.0 - fy) * p00
            + fx * (1.0 - fy) * p10
            + (1.0 - fx) * fy * p01
            + fx * fy * p11
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let img: Image<u8> = Image::new(10, 5);
        assert_eq!(img.width(), 10);
        assert_eq!(img.height(), 5);
        assert!(img.pixels().all(|(_, _, v)| v == 0));
    }

    #[test]
    fn test_from_vec_layout() {
        let img = Image::from_vec(4, 3, (0..12).collect::<Vec<u8>>());
        assert_eq!(img.get(3, 0), 3);
        assert_eq!(img.get(0, 1), 4);
        assert_eq!(img.get(3, 2), 11);
        assert_eq!(img.row(1), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_sub_image_is_view_local() {
        let img = Image::from_vec(4, 4, (0..16).collect::<Vec<u8>>());
        let view = img.sub_image(1, 1, 2, 2);
        assert_eq!(view.origin(), (1, 1));
        assert_eq!(view.get(0, 0), 5);
        assert_eq!(view.get(1, 1), 10);
        let owned = view.to_owned_image();
        assert_eq!(owned.as_slice(), &[5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let img = Image::from_vec(4, 4, (0..16).collect::<Vec<u8>>());
        let c = img.crop(2, 3, 10, 10);
        assert_eq!((c.width(), c.height()), (2, 1));
        assert_eq!(c.as_slice(), &[14, 15]);

        let outside = img.crop(8, 8, 2, 2);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_get_signed_outside_is_none() {
        let img = Image::filled(3, 3, 7u8);
        assert_eq!(img.get_signed(-1, 0), None);
        assert_eq!(img.get_signed(0, 3), None);
        assert_eq!(img.get_signed(2, 2), Some(7));
    }

    #[test]
    fn test_map_changes_pixel_type() {
        let img = Image::from_vec(2, 1, vec![10u8, 250]);
        let f: Image<f32> = img.map(|v| v as f32 * 0.5);
        assert_eq!(f.as_slice(), &[5.0, 125.0]);
    }

    #[test]
    fn test_index_syntax() {
        let mut img: Image<u8> = Image::new(4, 3);
        img[(1, 2)] = 42;
        assert_eq!(img[(1, 2)], 42);
        assert_eq!(img.get(1, 2), 42);
    }

    #[test]
    fn test_bilinear_midpoint_and_clamp() {
        let img = Image::from_vec(2, 2, vec![0.0f32, 10.0, 20.0, 30.0]);
        assert!((interpolate_bilinear(&img, 0.5, 0.5) - 15.0).abs() < 1e-6);
        assert!((interpolate_bilinear(&img, 5.0, 5.0) - 30.0).abs() < 1e-6);
        assert!((interpolate_bilinear(&img, -1.0, -1.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_bounds() {
        let img: Image<u8> = Image::new(4, 4);
        img.get(4, 0);
    }
}
