// segment.rs — Bubble detection in the region below the surface.
//
//   region (Image<u8>)
//     → [equalize]            optional global histogram equalization
//     → Gaussian blur         odd `blur_kernel`, 1 disables
//     → adaptive threshold    inverted: darker than the neighborhood = bubble
//     → external contours     8-connected, nested components ignored
//     → candidate filters     perimeter > 0, area range, [circularity range]
//
// The count is a pure function of the region pixels and the config. Each
// frame is segmented from scratch; no bubble identity is kept.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::contour::{find_external_contours, Contour};
use crate::convert::f32_to_u8;
use crate::convolution::gaussian_blur;
use crate::error::ConfigError;
use crate::histeq::equalize_histogram;
use crate::image::Image;
use crate::threshold::{adaptive_threshold_inv, AdaptiveMethod};

/// Segmentation parameters. Defaults are tuned for ~1 MP jar photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Equalize the region's histogram before blurring.
    pub equalize: bool,
    /// Odd Gaussian kernel size; 1 skips the blur.
    pub blur_kernel: usize,
    pub threshold_method: AdaptiveMethod,
    /// Odd neighborhood size for the local mean, at least 3.
    pub block_size: usize,
    /// How much darker than the local mean a pixel must be.
    pub c: f32,
    /// Inclusive area range in pixels (holes filled).
    pub min_area: f32,
    pub max_area: f32,
    /// Inclusive `(min, max)` circularity range; `None` disables the check.
    pub circularity: Option<(f32, f32)>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            equalize: false,
            blur_kernel: 11,
            threshold_method: AdaptiveMethod::Gaussian,
            block_size: 11,
            c: 2.0,
            min_area: 50.0,
            max_area: 1500.0,
            circularity: None,
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blur_kernel % 2 == 0 {
            return Err(ConfigError::KernelSize {
                name: "blur_kernel",
                value: self.blur_kernel,
                min: 1,
            });
        }
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(ConfigError::KernelSize {
                name: "block_size",
                value: self.block_size,
                min: 3,
            });
        }
        if !(self.min_area >= 0.0 && self.min_area < self.max_area) {
            return Err(ConfigError::AreaRange {
                min: self.min_area,
                max: self.max_area,
            });
        }
        if let Some((min, max)) = self.circularity {
            if !(min >= 0.0 && min <= max && max.is_finite()) {
                return Err(ConfigError::CircularityRange { min, max });
            }
        }
        Ok(())
    }

    /// The acceptance rules this config implies, cheapest first.
    pub fn filters(&self) -> Vec<CandidateFilter> {
        let mut filters = vec![
            CandidateFilter::NonZeroPerimeter,
            CandidateFilter::Area {
                min: self.min_area,
                max: self.max_area,
            },
        ];
        if let Some((min, max)) = self.circularity {
            filters.push(CandidateFilter::Circularity { min, max });
        }
        filters
    }
}

/// A closed outer contour found in the threshold mask, in region
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleCandidate {
    pub contour: Contour,
    /// `4π·area / perimeter²`; 0 when the perimeter is 0.
    pub circularity: f32,
}

impl BubbleCandidate {
    pub fn from_contour(contour: Contour) -> Self {
        let circularity = if contour.perimeter > 0.0 {
            4.0 * PI * contour.area as f32 / (contour.perimeter * contour.perimeter)
        } else {
            0.0
        };
        Self {
            contour,
            circularity,
        }
    }

    pub fn area(&self) -> f32 {
        self.contour.area as f32
    }

    pub fn perimeter(&self) -> f32 {
        self.contour.perimeter
    }
}

/// One acceptance rule for a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandidateFilter {
    /// Rejects single pixels and anything else with an empty chain.
    NonZeroPerimeter,
    Area { min: f32, max: f32 },
    Circularity { min: f32, max: f32 },
}

impl CandidateFilter {
    pub fn accepts(&self, candidate: &BubbleCandidate) -> bool {
        match *self {
            CandidateFilter::NonZeroPerimeter => candidate.perimeter() > 0.0,
            CandidateFilter::Area { min, max } => (min..=max).contains(&candidate.area()),
            CandidateFilter::Circularity { min, max } => {
                (min..=max).contains(&candidate.circularity)
            }
        }
    }
}

/// Result of segmenting one region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    /// Accepted candidates, in raster order of their first pixel.
    pub bubbles: Vec<BubbleCandidate>,
    /// Contours found before filtering.
    pub candidates_seen: usize,
}

impl Segmentation {
    pub fn count(&self) -> usize {
        self.bubbles.len()
    }
}

pub struct BubbleSegmenter {
    config: SegmenterConfig,
    filters: Vec<CandidateFilter>,
}

impl BubbleSegmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let filters = config.filters();
        Ok(Self { config, filters })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Binary bubble mask (255 = darker than surroundings) for a region.
    pub fn mask(&self, region: &Image<u8>) -> Image<u8> {
        let equalized;
        let src = if self.config.equalize {
            equalized = equalize_histogram(region);
            &equalized
        } else {
            region
        };
        let blurred = f32_to_u8(&gaussian_blur(src, self.config.blur_kernel));
        adaptive_threshold_inv(
            &blurred,
            self.config.threshold_method,
            self.config.block_size,
            self.config.c,
        )
    }

    /// All external contours of the mask, unfiltered.
    pub fn candidates(&self, region: &Image<u8>) -> Vec<BubbleCandidate> {
        if region.is_empty() {
            return Vec::new();
        }
        find_external_contours(&self.mask(region))
            .into_iter()
            .map(BubbleCandidate::from_contour)
            .collect()
    }

    pub fn segment(&self, region: &Image<u8>) -> Segmentation {
        let candidates = self.candidates(region);
        let candidates_seen = candidates.len();
        let bubbles = candidates
            .into_iter()
            .filter(|c| self.filters.iter().all(|f| f.accepts(c)))
            .collect();
        Segmentation {
            bubbles,
            candidates_seen,
        }
    }

    pub fn count(&self, region: &Image<u8>) -> usize {
        self.segment(region).count()
    }
}
