// tracker.rs — Pyramidal Lucas-Kanade point tracker.
//
// Forward-additive LK over a translation-only warp. Per point:
//
//   for level in coarsest..=0:
//       p_l = p / 2^level
//       Gauss-Newton on d:  H δ = Σ ∇I(p_l + d + u) · (T(p_l + u) - I(p_l + d + u))
//       d += δ  until |δ| < epsilon or max_iterations
//       d *= 2 before descending
//
// T is the previous frame, I the current one; u runs over the
// (2·window + 1)² patch. Gradients are central differences of I at the
// warped position, so H is rebuilt every iteration.
//
// A point survives only if every level's H is well conditioned, the finest
// level converges, it lands inside the frame, and the patch still matches
// (mean |T - I| within `max_residual`). Anything else is dropped with a
// status saying why.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::image::{interpolate_bilinear, Image};
use crate::points::{Point2, PointSet};
use crate::pyramid::Pyramid;

/// Why a point was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Tracked,
    /// Gradient matrix ill-conditioned at some level (flat or edge-only
    /// patch).
    Lost,
    /// Finest level ran out of iterations.
    NotConverged,
    /// Final position outside the frame.
    OutOfBounds,
    /// Patch at the final position no longer resembles the template.
    HighResidual,
}

/// One input point after a tracking pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPoint {
    /// Best estimate of the new position. Unreliable unless `Tracked`.
    pub position: Point2,
    pub status: TrackStatus,
    /// Mean absolute intensity difference over the patch at level 0.
    /// `NaN` when tracking stopped before level 0.
    pub residual: f32,
}

impl TrackedPoint {
    pub fn is_tracked(&self) -> bool {
        self.status == TrackStatus::Tracked
    }
}

/// Per-point results of one tracking pass, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackOutcome {
    pub points: Vec<TrackedPoint>,
}

impl TrackOutcome {
    /// Positions of the tracked points, input order kept.
    pub fn surviving(&self) -> PointSet {
        self.points
            .iter()
            .filter(|p| p.is_tracked())
            .map(|p| p.position)
            .collect()
    }

    pub fn count(&self, status: TrackStatus) -> usize {
        self.points.iter().filter(|p| p.status == status).count()
    }
}

/// Advances a point set from one frame to the next.
///
/// `track` returns exactly one entry per input point. Implementations must
/// not fail: a point that cannot be followed is reported, not an error.
pub trait PointTracker {
    fn track(&self, previous: &Image<u8>, current: &Image<u8>, points: &PointSet) -> TrackOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Patch half-size; the patch is (2·window + 1)².
    pub window: usize,
    pub pyramid_levels: usize,
    pub pyramid_sigma: f32,
    /// Gauss-Newton iterations per level.
    pub max_iterations: usize,
    /// Convergence threshold on |δ| in pixels.
    pub epsilon: f32,
    /// Minimum eigenvalue of the per-pixel gradient matrix,
    /// in (intensity / pixel)².
    pub min_eigenvalue: f32,
    /// Largest acceptable mean absolute residual, in intensity levels.
    pub max_residual: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window: 7,
            pyramid_levels: 3,
            pyramid_sigma: 1.0,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigenvalue: 1e-3,
            max_residual: 40.0,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::NotPositive("window"));
        }
        if self.pyramid_levels == 0 {
            return Err(ConfigError::NotPositive("pyramid_levels"));
        }
        if !(self.pyramid_sigma > 0.0) {
            return Err(ConfigError::NotPositive("pyramid_sigma"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::NotPositive("max_iterations"));
        }
        if !(self.epsilon > 0.0) {
            return Err(ConfigError::NotPositive("epsilon"));
        }
        if !(self.min_eigenvalue >= 0.0) {
            return Err(ConfigError::Negative("min_eigenvalue"));
        }
        if !(self.max_residual > 0.0) {
            return Err(ConfigError::NotPositive("max_residual"));
        }
        Ok(())
    }
}

/// Outcome of Gauss-Newton refinement at one pyramid level.
enum LevelResult {
    Converged(f32, f32),
    MaxIter(f32, f32),
    IllConditioned,
}

/// Pyramidal forward-additive Lucas-Kanade tracker.
pub struct LkTracker {
    config: TrackerConfig,
}

impl LkTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Track over pre-built pyramids of the previous and current frame.
    pub fn track_pyramids(&self, prev: &Pyramid, curr: &Pyramid, points: &PointSet) -> TrackOutcome {
        let levels = self
            .config
            .pyramid_levels
            .min(prev.num_levels())
            .min(curr.num_levels());
        TrackOutcome {
            points: points
                .iter()
                .map(|p| self.track_point(prev, curr, *p, levels))
                .collect(),
        }
    }

    fn track_point(&self, prev: &Pyramid, curr: &Pyramid, p: Point2, levels: usize) -> TrackedPoint {
        let (mut dx, mut dy) = (0.0f32, 0.0f32);
        let mut finest_converged = false;

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let (px, py) = (p.x * scale, p.y * scale);

            match self.refine_level(prev.level(level), curr.level(level), px, py, dx, dy) {
                LevelResult::Converged(ndx, ndy) => {
                    (dx, dy) = (ndx, ndy);
                    finest_converged = level == 0;
                }
                LevelResult::MaxIter(ndx, ndy) => (dx, dy) = (ndx, ndy),
                LevelResult::IllConditioned => {
                    return TrackedPoint {
                        position: Point2::new(p.x + dx / scale, p.y + dy / scale),
                        status: TrackStatus::Lost,
                        residual: f32::NAN,
                    };
                }
            }

            if level > 0 {
                dx *= 2.0;
                dy *= 2.0;
            }
        }

        let position = Point2::new(p.x + dx, p.y + dy);
        let residual = patch_residual(prev.level(0), curr.level(0), p, dx, dy, self.config.window);
        let (w, h) = (prev.level(0).width(), prev.level(0).height());

        let status = if !finest_converged {
            TrackStatus::NotConverged
        } else if !position.is_inside(w, h) {
            TrackStatus::OutOfBounds
        } else if !(residual <= self.config.max_residual) {
            TrackStatus::HighResidual
        } else {
            TrackStatus::Tracked
        };

        TrackedPoint {
            position,
            status,
            residual,
        }
    }

    fn refine_level(
        &self,
        prev: &Image<f32>,
        curr: &Image<f32>,
        px: f32,
        py: f32,
        mut dx: f32,
        mut dy: f32,
    ) -> LevelResult {
        let half = self.config.window as isize;
        let n = ((2 * half + 1) * (2 * half + 1)) as f32;

        for _ in 0..self.config.max_iterations {
            let (mut h00, mut h01, mut h11) = (0.0f32, 0.0f32, 0.0f32);
            let (mut b0, mut b1) = (0.0f32, 0.0f32);

            for v in -half..=half {
                for u in -half..=half {
                    let (uf, vf) = (u as f32, v as f32);
                    let t = interpolate_bilinear(prev, px + uf, py + vf);
                    let (wx, wy) = (px + dx + uf, py + dy + vf);
                    let e = t - interpolate_bilinear(curr, wx, wy);

                    let gx = 0.5
                        * (interpolate_bilinear(curr, wx + 1.0, wy)
                            - interpolate_bilinear(curr, wx - 1.0, wy));
                    let gy = 0.5
                        * (interpolate_bilinear(curr, wx, wy + 1.0)
                            - interpolate_bilinear(curr, wx, wy - 1.0));

                    h00 += gx * gx;
                    h01 += gx * gy;
                    h11 += gy * gy;
                    b0 += gx * e;
                    b1 += gy * e;
                }
            }

            if min_eigenvalue(h00 / n, h01 / n, h11 / n) < self.config.min_eigenvalue {
                return LevelResult::IllConditioned;
            }
            let det = h00 * h11 - h01 * h01;
            if det.abs() < 1e-6 {
                return LevelResult::IllConditioned;
            }

            let inv_det = 1.0 / det;
            let delta_x = inv_det * (h11 * b0 - h01 * b1);
            let delta_y = inv_det * (h00 * b1 - h01 * b0);
            dx += delta_x;
            dy += delta_y;

            if delta_x * delta_x + delta_y * delta_y < self.config.epsilon * self.config.epsilon {
                return LevelResult::Converged(dx, dy);
            }
        }
        LevelResult::MaxIter(dx, dy)
    }
}

impl PointTracker for LkTracker {
    fn track(&self, previous: &Image<u8>, current: &Image<u8>, points: &PointSet) -> TrackOutcome {
        if points.is_empty() {
            return TrackOutcome::default();
        }
        let levels = self.config.pyramid_levels;
        let sigma = self.config.pyramid_sigma;
        let prev = Pyramid::build(previous, levels, sigma);
        let curr = Pyramid::build(current, levels, sigma);
        self.track_pyramids(&prev, &curr, points)
    }
}

/// Smaller eigenvalue of the symmetric matrix [[a, b], [b, c]].
fn min_eigenvalue(a: f32, b: f32, c: f32) -> f32 {
    let diff = a - c;
    ((a + c) - (diff * diff + 4.0 * b * b).sqrt()) * 0.5
}

/// Mean |T(p + u) - I(p + d + u)| over the patch at full resolution.
fn patch_residual(prev: &Image<f32>, curr: &Image<f32>, p: Point2, dx: f32, dy: f32, window: usize) -> f32 {
    let half = window as isize;
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for v in -half..=half {
        for u in -half..=half {
            let (uf, vf) = (u as f32, v as f32);
            let t = interpolate_bilinear(prev, p.x + uf, p.y + vf);
            let i = interpolate_bilinear(curr, p.x + dx + uf, p.y + dy + vf);
            sum += (t - i).abs();
            count += 1;
        }
    }
    sum / count as f32
}
