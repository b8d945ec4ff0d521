// config.rs — Run configuration, loadable from JSON.
//
// Every field has a default, so a config file only needs the values it
// changes:
//
//   { "segmenter": { "max_area": 800 }, "roi": { "x": 120, "y": 40, "width": 300, "height": 420 } }

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::segment::SegmenterConfig;
use crate::tracker::TrackerConfig;

/// Jar region in frame pixels. Bubbles are only counted inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `"x,y,w,h"`.
impl FromStr for Roi {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<usize> = s
            .split(',')
            .map(|v| v.trim().parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("bad ROI '{s}': {e}"))?;
        match parts[..] {
            [x, y, width, height] => Ok(Roi { x, y, width, height }),
            _ => Err(format!("expected X,Y,W,H but got '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub segmenter: SegmenterConfig,
    pub roi: Option<Roi>,
    /// Segment the frames of a batch on the rayon pool.
    pub parallel_segmentation: bool,
    /// Frames tracked before their crops are segmented together.
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            segmenter: SegmenterConfig::default(),
            roi: None,
            parallel_segmentation: true,
            batch_size: 16,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.tracker.validate()?;
        self.segmenter.validate()?;
        if let Some(roi) = self.roi {
            if roi.width == 0 || roi.height == 0 {
                return Err(ConfigError::EmptyRoi);
            }
            if roi.x.checked_add(roi.width).is_none() || roi.y.checked_add(roi.height).is_none() {
                return Err(ConfigError::RoiOverflow {
                    x: roi.x,
                    y: roi.y,
                    width: roi.width,
                    height: roi.height,
                });
            }
        }
        if self.batch_size == 0 {
            return Err(ConfigError::NotPositive("batch_size"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "segmenter": { "max_area": 800, "threshold_method": "mean" },
                 "roi": { "x": 1, "y": 2, "width": 3, "height": 4 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.segmenter.max_area, 800.0);
        assert_eq!(cfg.segmenter.min_area, 50.0);
        assert_eq!(cfg.segmenter.threshold_method, crate::threshold::AdaptiveMethod::Mean);
        assert_eq!(cfg.tracker, TrackerConfig::default());
        assert_eq!(cfg.roi, Some(Roi { x: 1, y: 2, width: 3, height: 4 }));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_circularity_from_json() {
        let cfg = PipelineConfig::from_json_str(r#"{ "segmenter": { "circularity": [0.5, 1.2] } }"#).unwrap();
        assert_eq!(cfg.segmenter.circularity, Some((0.5, 1.2)));
    }

    #[test]
    fn test_unknown_method_is_error() {
        assert!(PipelineConfig::from_json_str(r#"{ "segmenter": { "threshold_method": "otsu" } }"#).is_err());
    }

    #[test]
    fn test_validate_catches_each_section() {
        let mut cfg = PipelineConfig::default();
        cfg.roi = Some(Roi { x: 0, y: 0, width: 0, height: 10 });
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyRoi));

        let mut cfg = PipelineConfig::default();
        cfg.batch_size = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::NotPositive("batch_size")));

        let mut cfg = PipelineConfig::default();
        cfg.segmenter.min_area = 2000.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::AreaRange { .. })));

        let mut cfg = PipelineConfig::default();
        cfg.tracker.window = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::NotPositive("window")));
    }

    #[test]
    fn test_roi_past_usize_max_is_rejected() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "roi": { "x": 0, "y": 18446744073709551615, "width": 10, "height": 5 } }"#,
        )
        .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::RoiOverflow { height: 5, .. })));

        let mut cfg = PipelineConfig::default();
        cfg.roi = Some(Roi { x: usize::MAX - 1, y: 0, width: 2, height: 10 });
        assert!(matches!(cfg.validate(), Err(ConfigError::RoiOverflow { .. })));

        cfg.roi = Some(Roi { x: usize::MAX - 2, y: 0, width: 2, height: 10 });
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_roi_parse() {
        assert_eq!("10, 20,30,40".parse::<Roi>().unwrap(), Roi { x: 10, y: 20, width: 30, height: 40 });
        assert!("1,2,3".parse::<Roi>().is_err());
        assert!("1,2,3,-4".parse::<Roi>().is_err());
    }
}
