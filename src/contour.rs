// contour.rs — External contours of a binary mask.
//
// Pipeline per mask:
//   1. Flood the background 4-connected from the image border ("outer
//      background"). Background pockets this cannot reach are holes.
//   2. Label foreground 8-connected, in raster order.
//   3. A component is external if it touches the border or the outer
//      background. Components sitting inside another one's hole are skipped.
//   4. Trace each external component with Moore-neighbor tracing, starting
//      at its first raster pixel, and measure the closed chain.
//
// Foreground 8-connected with background 4-connected is the usual dual
// pairing: a diagonal gap in a ring does not let the outside leak in.
//
// Neighbor directions, clockwise on screen (y grows downward):
//
//     5 6 7
//     4 p 0
//     3 2 1

use std::collections::VecDeque;
use std::f32::consts::SQRT_2;

use crate::image::Image;

const DIRS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const WEST: usize = 4;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// One traced external contour and the geometry of the region it encloses.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary pixels in clockwise order, starting at the top-left-most
    /// pixel. Not repeated at the end.
    pub points: Vec<(usize, usize)>,
    /// Closed chain length: 1 per axis step, √2 per diagonal step.
    /// Zero for a single isolated pixel.
    pub perimeter: f32,
    /// Pixels inside the outer boundary, holes included.
    ///
    /// This counts whole pixels, boundary pixels too, so it runs larger than
    /// the polygon area through the boundary pixel centers: for a simple
    /// blob `area ≈ polygon_area() + perimeter / 2 + 1`. The area filters
    /// use this value; compare with [`Contour::polygon_area`] when porting
    /// thresholds tuned on polygon areas.
    pub area: usize,
    /// Foreground pixels of the component itself.
    pub pixel_count: usize,
    pub bbox: BoundingBox,
    /// Mean position of the component's pixels.
    pub centroid: (f32, f32),
}

impl Contour {
    /// Shoelace area of the closed polygon through the boundary pixel
    /// centers. Zero for single pixels and one-pixel-wide lines.
    pub fn polygon_area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum();
        twice.abs() as f32 * 0.5
    }
}

/// Trace the outer boundary of every external 8-connected foreground
/// component. Any non-zero mask value is foreground.
///
/// Contours come out in raster order of their starting pixel.
pub fn find_external_contours(mask: &Image<u8>) -> Vec<Contour> {
    if mask.is_empty() {
        return Vec::new();
    }
    let (w, h) = (mask.width(), mask.height());
    let fg = mask.as_slice();
    let outer = outer_background(mask);

    let mut labels = vec![0u32; w * h];
    let mut next_label = 1u32;
    let mut contours = Vec::new();

    for start in 0..w * h {
        if fg[start] == 0 || labels[start] != 0 {
            continue;
        }
        let pixels = label_component(mask, &mut labels, start, next_label);
        next_label += 1;

        if !reaches_outside(&pixels, &outer, w, h) {
            continue;
        }
        contours.push(measure(&labels, w, h, start, &pixels));
    }
    contours
}

/// Background pixels 4-connected to the image border.
fn outer_background(mask: &Image<u8>) -> Vec<bool> {
    let (w, h) = (mask.width(), mask.height());
    let fg = mask.as_slice();
    let mut outer = vec![false; w * h];
    let mut queue = VecDeque::new();

    let border = (0..w)
        .flat_map(|x| [x, (h - 1) * w + x])
        .chain((0..h).flat_map(|y| [y * w, y * w + w - 1]));
    for i in border {
        if fg[i] == 0 && !outer[i] {
            outer[i] = true;
            queue.push_back(i);
        }
    }

    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % w, i / w);
        for n in neighbors4(x, y, w, h) {
            if fg[n] == 0 && !outer[n] {
                outer[n] = true;
                queue.push_back(n);
            }
        }
    }
    outer
}

/// BFS-label the 8-connected component containing `start`.
fn label_component(mask: &Image<u8>, labels: &mut [u32], start: usize, label: u32) -> Vec<usize> {
    let (w, h) = (mask.width(), mask.height());
    let fg = mask.as_slice();
    let mut pixels = vec![start];
    labels[start] = label;

    let mut head = 0;
    while head < pixels.len() {
        let i = pixels[head];
        head += 1;
        let (x, y) = (i as isize % w as isize, i as isize / w as isize);
        for &(dx, dy) in &DIRS {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                continue;
            }
            let n = ny as usize * w + nx as usize;
            if fg[n] != 0 && labels[n] == 0 {
                labels[n] = label;
                pixels.push(n);
            }
        }
    }
    pixels
}

fn reaches_outside(pixels: &[usize], outer: &[bool], w: usize, h: usize) -> bool {
    pixels.iter().any(|&i| {
        let (x, y) = (i % w, i / w);
        x == 0
            || y == 0
            || x == w - 1
            || y == h - 1
            || neighbors4(x, y, w, h).any(|n| outer[n])
    })
}

fn neighbors4(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = usize> {
    let i = y * w + x;
    [
        (x > 0).then(|| i - 1),
        (x + 1 < w).then(|| i + 1),
        (y > 0).then(|| i - w),
        (y + 1 < h).then(|| i + w),
    ]
    .into_iter()
    .flatten()
}

fn measure(labels: &[u32], w: usize, h: usize, start: usize, pixels: &[usize]) -> Contour {
    let label = labels[start];
    let inside = |x: isize, y: isize| {
        x >= 0
            && y >= 0
            && (x as usize) < w
            && (y as usize) < h
            && labels[y as usize * w + x as usize] == label
    };

    let (points, chain) = trace_moore((start % w, start / w), pixels.len(), inside);
    let perimeter = chain
        .iter()
        .map(|&d| if d % 2 == 0 { 1.0 } else { SQRT_2 })
        .sum();

    let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0, 0);
    let (mut sx, mut sy) = (0f64, 0f64);
    for &i in pixels {
        let (x, y) = (i % w, i / w);
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
        sx += x as f64;
        sy += y as f64;
    }
    let bbox = BoundingBox {
        x: x0,
        y: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
    };
    let n = pixels.len() as f64;

    Contour {
        points,
        perimeter,
        area: filled_area(pixels, w, &bbox),
        pixel_count: pixels.len(),
        bbox,
        centroid: ((sx / n) as f32, (sy / n) as f32),
    }
}

/// Moore-neighbor boundary trace.
///
/// `start` must be the component's first pixel in raster order, which
/// guarantees its west neighbor is background. Returns the boundary pixels
/// and the direction of every step of the closed chain. Tracing ends when
/// the walk is back at `start` about to repeat its first step (Jacob's
/// stopping criterion), so pixels visited twice on thin parts are kept.
fn trace_moore(
    start: (usize, usize),
    component_size: usize,
    inside: impl Fn(isize, isize) -> bool,
) -> (Vec<(usize, usize)>, Vec<usize>) {
    let s = (start.0 as isize, start.1 as isize);

    // Clockwise sweep around `p`, beginning just after the backtrack
    // direction. Returns the step direction and the new backtrack direction
    // as seen from the pixel stepped to.
    let next = |p: (isize, isize), back: usize| -> Option<(usize, usize)> {
        (1..8).map(|i| (back + i) % 8).find_map(|k| {
            let (dx, dy) = DIRS[k];
            if !inside(p.0 + dx, p.1 + dy) {
                return None;
            }
            let (px, py) = DIRS[(k + 7) % 8];
            let rel = (px - dx, py - dy);
            let nb = DIRS.iter().position(|&d| d == rel).unwrap_or(WEST);
            Some((k, nb))
        })
    };

    let Some((first_dir, _)) = next(s, WEST) else {
        return (vec![start], Vec::new());
    };

    let mut points = Vec::new();
    let mut chain = Vec::new();
    let mut p = s;
    let mut back = WEST;
    // Every boundary pixel is entered at most once from each side.
    let cap = 4 * component_size + 8;

    while let Some((k, nb)) = next(p, back) {
        if p == s && k == first_dir && !chain.is_empty() {
            break;
        }
        points.push((p.0 as usize, p.1 as usize));
        chain.push(k);
        p = (p.0 + DIRS[k].0, p.1 + DIRS[k].1);
        back = nb;
        if chain.len() > cap {
            break;
        }
    }
    (points, chain)
}

/// Pixel count of the component with its holes filled.
fn filled_area(pixels: &[usize], w: usize, bbox: &BoundingBox) -> usize {
    // Bbox-local grid with a one-pixel empty margin so the outside is a
    // single connected region.
    let gw = bbox.width + 2;
    let gh = bbox.height + 2;
    let mut solid = vec![false; gw * gh];
    for &i in pixels {
        let (x, y) = (i % w - bbox.x + 1, i / w - bbox.y + 1);
        solid[y * gw + x] = true;
    }

    let mut seen = vec![false; gw * gh];
    let mut stack = vec![0usize];
    seen[0] = true;
    let mut outside = 0;
    while let Some(i) = stack.pop() {
        outside += 1;
        let (x, y) = (i % gw, i / gw);
        for n in neighbors4(x, y, gw, gh) {
            if !solid[n] && !seen[n] {
                seen[n] = true;
                stack.push(n);
            }
        }
    }
    gw * gh - outside
}
