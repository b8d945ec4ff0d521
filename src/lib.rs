// rise-track: surface height and bubble counts from a time-lapse of a
// fermenting starter.
//
// Layering, leaf first:
//   image, convert, convolution, pyramid, histeq, threshold, contour
//       → tracker (pyramidal LK), surface, segment (bubble detection)
//       → pipeline (per-frame state machine, batched segmentation)
//   frames, environment, record, overlay sit at the edges: input, output.

pub mod image;
pub mod convert;
pub mod convolution;
pub mod pyramid;
pub mod histeq;
pub mod threshold;
pub mod contour;

pub mod points;
pub mod surface;
pub mod tracker;
pub mod segment;

pub mod config;
pub mod error;
pub mod frames;
pub mod environment;
pub mod record;
pub mod pipeline;
pub mod overlay;

pub use config::{PipelineConfig, Roi};
pub use error::{ConfigError, Error, Result};
pub use frames::{DirectoryFrameStore, Frame, FrameSource, MemoryFrameStore};
pub use pipeline::{FrameOutput, PipelinePhase, PipelineState, TrackingPipeline};
pub use points::{Point2, PointSet};
pub use record::{FrameStatus, MeasurementRecord};
