// environment.rs — Temperature/humidity log written next to the photos.
//
// The capture loop appends one row per photo, so row i belongs to frame i.
// Columns: Timestamp, Temperature (°F), Humidity (%). Blank cells are
// allowed; a sensor read that failed leaves its value empty.

use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Readings taken alongside one photo.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentReading {
    pub temperature_f: Option<f32>,
    pub humidity_pct: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct LogRow {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Temperature (°F)")]
    temperature_f: Option<f32>,
    #[serde(rename = "Humidity (%)")]
    humidity_pct: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentLog {
    timestamps: Vec<String>,
    readings: Vec<EnvironmentReading>,
}

impl EnvironmentLog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let rdr = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
        Self::from_csv(rdr)
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self> {
        let rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        Self::from_csv(rdr)
    }

    fn from_csv<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        let mut log = Self::default();
        for row in rdr.deserialize::<LogRow>() {
            let row = row?;
            log.timestamps.push(row.timestamp);
            log.readings.push(EnvironmentReading {
                temperature_f: row.temperature_f,
                humidity_pct: row.humidity_pct,
            });
        }
        Ok(log)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings for frame `index`; `None` past the end of the log.
    pub fn reading(&self, index: usize) -> Option<EnvironmentReading> {
        self.readings.get(index).copied()
    }

    pub fn timestamp(&self, index: usize) -> Option<&str> {
        self.timestamps.get(index).map(String::as_str)
    }
}
