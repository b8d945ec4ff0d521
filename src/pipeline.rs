// pipeline.rs — Frame-by-frame tracking and bubble counting.
//
// For every readable frame, in order:
//
//   1. track the surface points from the previous frame into this one
//   2. no survivors → Degraded: record without measurements, keep the old
//      points so the next frame retries from where tracking was last good
//   3. survivors → surface estimate → crop below the surface (and to the
//      ROI) → bubble segmentation → full record
//   4. this frame becomes the previous frame
//
// The first readable frame is tracked against itself, so every readable
// frame yields exactly one record.
//
// Tracking is inherently sequential, segmentation is not: frames are
// tracked in batches and the batch's crops are segmented on the rayon pool.
// Records are emitted in frame order either way.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, Roi};
use crate::environment::EnvironmentLog;
use crate::error::{ConfigError, Error, Result};
use crate::frames::{Frame, FrameSource};
use crate::image::Image;
use crate::points::PointSet;
use crate::record::{FrameStatus, MeasurementRecord};
use crate::segment::{BubbleSegmenter, Segmentation};
use crate::surface::SurfaceEstimate;
use crate::tracker::{LkTracker, PointTracker, TrackStatus};

/// Where the run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// First frame loaded, initial points set, nothing measured yet.
    Initialized,
    /// The last frame was measured.
    Tracking,
    /// The last frame lost every point; the previous points are being
    /// retried.
    Degraded,
    /// The sequence is exhausted.
    Completed,
}

/// What carries over from one frame to the next.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub previous_frame: Image<u8>,
    /// Never empty: a frame that loses every point leaves the prior set in
    /// place.
    pub point_set: PointSet,
}

/// Everything produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub record: MeasurementRecord,
    /// Points that survived tracking on this frame (empty when degraded).
    pub points: PointSet,
    /// `None` on degraded frames.
    pub segmentation: Option<Segmentation>,
    /// Top-left of the segmented region in frame coordinates.
    pub region_origin: (usize, usize),
}

/// A frame that has been tracked but not yet segmented.
struct TrackedFrame {
    frame: Frame,
    points: PointSet,
    surface: Option<SurfaceEstimate>,
    region: Option<Image<u8>>,
    region_origin: (usize, usize),
}

pub struct TrackingPipeline<T: PointTracker = LkTracker> {
    config: PipelineConfig,
    tracker: T,
    segmenter: BubbleSegmenter,
    environment: Option<EnvironmentLog>,
    phase: PipelinePhase,
}

impl TrackingPipeline<LkTracker> {
    pub fn new(config: PipelineConfig) -> std::result::Result<Self, ConfigError> {
        let tracker = LkTracker::new(config.tracker.clone())?;
        Self::with_tracker(config, tracker)
    }
}

impl<T: PointTracker> TrackingPipeline<T> {
    /// Build around any tracker. The whole config is validated here,
    /// tracker section included.
    pub fn with_tracker(config: PipelineConfig, tracker: T) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let segmenter = BubbleSegmenter::new(config.segmenter.clone())?;
        Ok(Self {
            config,
            tracker,
            segmenter,
            environment: None,
            phase: PipelinePhase::Initialized,
        })
    }

    /// Attach temperature/humidity readings; row i goes to frame i.
    pub fn with_environment(mut self, log: EnvironmentLog) -> Self {
        self.environment = Some(log);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Process one frame: `(state, frame) → (state', output)`.
    pub fn step(&self, state: PipelineState, frame: &Frame) -> (PipelineState, FrameOutput) {
        let (next, tracked) = self.track_frame(state, frame.clone());
        let segmentation = tracked.region.as_ref().map(|r| self.segmenter.segment(r));
        (next, self.finish(&tracked, segmentation))
    }

    /// Run over the whole source and return the records in frame order.
    pub fn run<S>(&mut self, source: &S, initial: PointSet) -> Result<Vec<MeasurementRecord>>
    where
        S: FrameSource + ?Sized,
    {
        self.run_with(source, initial, |_, _| Ok(()))
    }

    /// Like [`run`](Self::run), also handing each frame and its output to
    /// `on_frame` in order (overlay rendering, streaming CSV).
    pub fn run_with<S, F>(&mut self, source: &S, initial: PointSet, mut on_frame: F) -> Result<Vec<MeasurementRecord>>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&Frame, &FrameOutput) -> Result<()>,
    {
        if initial.is_empty() {
            return Err(ConfigError::NoInitialPoints.into());
        }
        if source.is_empty() {
            return Err(Error::NoFrames);
        }

        let mut indices = 0..source.len();
        let first = indices
            .by_ref()
            .find_map(|i| load_or_skip(source, i))
            .ok_or(Error::NoFrames)?;
        let (width, height) = (first.gray.width(), first.gray.height());
        if let Some(p) = initial.iter().find(|p| !p.is_inside(width, height)) {
            return Err(ConfigError::PointOutsideFrame {
                x: p.x,
                y: p.y,
                width,
                height,
            }
            .into());
        }

        info!(
            frames = source.len(),
            points = initial.len(),
            width,
            height,
            roi = ?self.config.roi,
            "starting run"
        );
        self.phase = PipelinePhase::Initialized;

        let mut state = PipelineState {
            previous_frame: first.gray.clone(),
            point_set: initial,
        };
        let mut records = Vec::with_capacity(source.len());
        // Everything before the first readable frame was skipped.
        let mut skipped = first.index;
        let mut pending = vec![first];

        loop {
            while pending.len() < self.config.batch_size {
                let Some(i) = indices.next() else {
                    break;
                };
                let Some(frame) = load_or_skip(source, i) else {
                    skipped += 1;
                    continue;
                };
                if (frame.gray.width(), frame.gray.height()) != (width, height) {
                    warn!(
                        frame = %frame.name,
                        width = frame.gray.width(),
                        height = frame.gray.height(),
                        "frame size differs from the first frame, skipping"
                    );
                    skipped += 1;
                    continue;
                }
                pending.push(frame);
            }
            if pending.is_empty() {
                break;
            }

            let batch = std::mem::take(&mut pending);
            state = self.process_batch(state, batch, &mut records, &mut on_frame)?;
        }

        self.phase = PipelinePhase::Completed;
        let measured = records.iter().filter(|r| r.is_measured()).count();
        info!(
            records = records.len(),
            measured,
            degraded = records.len() - measured,
            skipped,
            "run complete"
        );
        Ok(records)
    }

    fn process_batch<F>(
        &mut self,
        mut state: PipelineState,
        batch: Vec<Frame>,
        records: &mut Vec<MeasurementRecord>,
        on_frame: &mut F,
    ) -> Result<PipelineState>
    where
        F: FnMut(&Frame, &FrameOutput) -> Result<()>,
    {
        let mut tracked = Vec::with_capacity(batch.len());
        for frame in batch {
            let (next, t) = self.track_frame(state, frame);
            state = next;
            tracked.push(t);
        }

        let segmenter = &self.segmenter;
        let segment = |t: &TrackedFrame| t.region.as_ref().map(|r| segmenter.segment(r));
        let segmentations: Vec<Option<Segmentation>> = if self.config.parallel_segmentation {
            tracked.par_iter().map(segment).collect()
        } else {
            tracked.iter().map(segment).collect()
        };

        for (t, seg) in tracked.iter().zip(segmentations) {
            let output = self.finish(t, seg);
            self.advance_phase(&output.record);
            on_frame(&t.frame, &output)?;
            records.push(output.record);
        }
        Ok(state)
    }

    fn track_frame(&self, state: PipelineState, frame: Frame) -> (PipelineState, TrackedFrame) {
        let outcome = self
            .tracker
            .track(&state.previous_frame, &frame.gray, &state.point_set);
        let survivors = outcome.surviving();
        debug!(
            frame = %frame.name,
            tracked = survivors.len(),
            lost = outcome.count(TrackStatus::Lost),
            not_converged = outcome.count(TrackStatus::NotConverged),
            out_of_bounds = outcome.count(TrackStatus::OutOfBounds),
            high_residual = outcome.count(TrackStatus::HighResidual),
            "tracked frame"
        );

        let surface = SurfaceEstimate::from_points(&survivors, frame.gray.height());
        let (region, region_origin) = match surface {
            Some(s) => {
                let (r, origin) = crop_region(&frame.gray, s.crop_row, self.config.roi);
                (Some(r), origin)
            }
            None => (None, (0, 0)),
        };

        // A total loss keeps the prior set; the frame still becomes the
        // reference for the next one.
        let point_set = if survivors.is_empty() {
            state.point_set
        } else {
            survivors.clone()
        };
        let next = PipelineState {
            previous_frame: frame.gray.clone(),
            point_set,
        };

        let tracked = TrackedFrame {
            frame,
            points: survivors,
            surface,
            region,
            region_origin,
        };
        (next, tracked)
    }

    fn finish(&self, t: &TrackedFrame, segmentation: Option<Segmentation>) -> FrameOutput {
        let status = match t.surface {
            Some(_) => FrameStatus::Measured,
            None => FrameStatus::Degraded,
        };
        let record = MeasurementRecord {
            index: t.frame.index,
            image: t.frame.name.clone(),
            status,
            height: t.surface.map(|s| s.height),
            bubble_count: segmentation.as_ref().map(Segmentation::count),
            tracked_points: t.points.len(),
            crop_row: t.surface.map(|s| s.crop_row),
            environment: self
                .environment
                .as_ref()
                .and_then(|log| log.reading(t.frame.index)),
        };
        FrameOutput {
            record,
            points: t.points.clone(),
            segmentation,
            region_origin: t.region_origin,
        }
    }

    fn advance_phase(&mut self, record: &MeasurementRecord) {
        let next = match record.status {
            FrameStatus::Measured => PipelinePhase::Tracking,
            FrameStatus::Degraded => PipelinePhase::Degraded,
        };
        match (self.phase, next) {
            (PipelinePhase::Degraded, PipelinePhase::Degraded) => {}
            (_, PipelinePhase::Degraded) => {
                warn!(frame = %record.image, "all points lost, retrying with previous points")
            }
            (PipelinePhase::Degraded, PipelinePhase::Tracking) => {
                info!(frame = %record.image, points = record.tracked_points, "tracking recovered")
            }
            _ => {}
        }
        debug!(
            frame = %record.image,
            height = ?record.height,
            bubbles = ?record.bubble_count,
            "measured"
        );
        self.phase = next;
    }
}

fn load_or_skip<S: FrameSource + ?Sized>(source: &S, index: usize) -> Option<Frame> {
    match source.load(index) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(frame = source.name(index), error = %e, "skipping unreadable frame");
            None
        }
    }
}

/// The part of the frame searched for bubbles, and its top-left corner.
///
/// Without an ROI: full width, from `crop_row` to the bottom. With one: the
/// ROI's columns, from the lower of `crop_row` and the ROI top down to the
/// ROI bottom. Everything is clipped to the frame; a surface below the ROI
/// gives an empty region.
pub fn crop_region(gray: &Image<u8>, crop_row: usize, roi: Option<Roi>) -> (Image<u8>, (usize, usize)) {
    let (w, h) = (gray.width(), gray.height());
    let (x, y, rw, rh) = match roi {
        None => (0, crop_row, w, h.saturating_sub(crop_row)),
        Some(roi) => {
            let top = crop_row.max(roi.y);
            let bottom = roi.y.saturating_add(roi.height);
            (roi.x, top, roi.width, bottom.saturating_sub(top))
        }
    };
    (gray.crop(x, y, rw, rh), (x.min(w), y.min(h)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> Image<u8> {
        Image::from_vec(w, h, (0..w * h).map(|i| (i % 251) as u8).collect())
    }

    #[test]
    fn test_crop_without_roi() {
        let img = ramp(10, 8);
        let (r, origin) = crop_region(&img, 5, None);
        assert_eq!((r.width(), r.height()), (10, 3));
        assert_eq!(origin, (0, 5));
        assert_eq!(r.get(0, 0), img.get(0, 5));
    }

    #[test]
    fn test_crop_with_roi_surface_inside() {
        let img = ramp(20, 20);
        let roi = Roi { x: 4, y: 2, width: 10, height: 12 };
        let (r, origin) = crop_region(&img, 6, Some(roi));
        assert_eq!(origin, (4, 6));
        assert_eq!((r.width(), r.height()), (10, 8));
    }

    #[test]
    fn test_crop_with_roi_surface_above() {
        let img = ramp(20, 20);
        let roi = Roi { x: 4, y: 10, width: 10, height: 5 };
        let (r, origin) = crop_region(&img, 3, Some(roi));
        assert_eq!(origin, (4, 10));
        assert_eq!((r.width(), r.height()), (10, 5));
    }

    #[test]
    fn test_crop_surface_below_roi_is_empty() {
        let img = ramp(20, 20);
        let roi = Roi { x: 0, y: 0, width: 10, height: 5 };
        let (r, _) = crop_region(&img, 12, Some(roi));
        assert!(r.is_empty());
    }

    #[test]
    fn test_crop_roi_clipped_to_frame() {
        let img = ramp(20, 20);
        let roi = Roi { x: 15, y: 15, width: 10, height: 10 };
        let (r, _) = crop_region(&img, 0, Some(roi));
        assert_eq!((r.width(), r.height()), (5, 5));
    }

    #[test]
    fn test_crop_roi_at_usize_max_does_not_overflow() {
        let img = ramp(20, 20);
        let roi = Roi { x: 0, y: usize::MAX, width: 10, height: 5 };
        let (r, origin) = crop_region(&img, 3, Some(roi));
        assert!(r.is_empty());
        assert_eq!(origin, (0, 20));
    }

    #[test]
    fn test_crop_at_bottom_is_empty() {
        let img = ramp(10, 8);
        let (r, _) = crop_region(&img, 8, None);
        assert!(r.is_empty());
    }
}
