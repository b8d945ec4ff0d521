// error.rs — Library error types.
//
// Configuration problems are caught by `validate()` before any frame is
// read. Everything else is I/O at the edges: frame decoding, the
// environment log, the record CSV.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("no readable frames in the sequence")]
    NoFrames,
    #[error("failed to read frame {name}: {source}")]
    Frame {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be odd and at least {min} (got {value})")]
    KernelSize {
        name: &'static str,
        value: usize,
        min: usize,
    },
    #[error("min_area ({min}) must be below max_area ({max})")]
    AreaRange { min: f32, max: f32 },
    #[error("circularity range [{min}, {max}] is invalid")]
    CircularityRange { min: f32, max: f32 },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("roi must have non-zero width and height")]
    EmptyRoi,
    #[error("roi ({x}, {y}, {width}, {height}) extends past the addressable range")]
    RoiOverflow {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("initial point set is empty")]
    NoInitialPoints,
    #[error("initial point ({x}, {y}) lies outside the {width}x{height} frame")]
    PointOutsideFrame {
        x: f32,
        y: f32,
        width: usize,
        height: usize,
    },
}
