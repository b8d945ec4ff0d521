// surface.rs — Surface height from the tracked points.
//
// The points sit on the starter's top surface, so their mean row is the
// surface line. Height is measured up from the bottom of the frame:
//
//   height   = frame_height - mean(y)
//   crop_row = round(mean(y))
//
// Every point counts equally; a single stray point drags the mean with it.

use crate::points::PointSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceEstimate {
    /// Pixels from the bottom edge of the frame up to the surface.
    pub height: f32,
    /// Frame row of the surface; bubble segmentation starts here.
    pub crop_row: usize,
}

impl SurfaceEstimate {
    /// `None` when the set is empty.
    ///
    /// Points are clamped into `[0, frame_height]` first, so the height
    /// never leaves that range even if a point drifted off the frame.
    pub fn from_points(points: &PointSet, frame_height: usize) -> Option<Self> {
        let mean_y = points.mean_y()?.clamp(0.0, frame_height as f64);
        Some(Self {
            height: (frame_height as f64 - mean_y) as f32,
            crop_row: mean_y.round() as usize,
        })
    }
}
