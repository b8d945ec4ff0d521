// record.rs — Per-frame measurements and their CSV form.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentReading;
use crate::error::{Error, Result};

/// Whether the frame produced measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    /// Tracking held; height and bubble count are present.
    Measured,
    /// Every point was lost on this frame; height and count are absent.
    Degraded,
}

/// Everything measured on one frame.
///
/// A degraded frame reports "no measurement" rather than zero: `height` and
/// `bubble_count` are `None`. Consumers that want the old zero-filled
/// series can use [`MeasurementRecord::bubble_count_or_zero`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub index: usize,
    pub image: String,
    pub status: FrameStatus,
    /// Pixels from the bottom of the frame to the surface.
    pub height: Option<f32>,
    pub bubble_count: Option<usize>,
    /// Points still tracked after this frame.
    pub tracked_points: usize,
    /// Row the bubble region started at.
    pub crop_row: Option<usize>,
    pub environment: Option<EnvironmentReading>,
}

impl MeasurementRecord {
    pub fn is_measured(&self) -> bool {
        self.status == FrameStatus::Measured
    }

    pub fn bubble_count_or_zero(&self) -> usize {
        self.bubble_count.unwrap_or(0)
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Image")]
    image: &'a str,
    #[serde(rename = "Starter Height (Pixels)")]
    height: Option<f32>,
    #[serde(rename = "Bubble Count")]
    bubble_count: Option<usize>,
    #[serde(rename = "Tracked Points")]
    tracked_points: usize,
    #[serde(rename = "Status")]
    status: FrameStatus,
    #[serde(rename = "Temperature (°F)")]
    temperature_f: Option<f32>,
    #[serde(rename = "Humidity (%)")]
    humidity_pct: Option<f32>,
}

impl<'a> From<&'a MeasurementRecord> for CsvRow<'a> {
    fn from(r: &'a MeasurementRecord) -> Self {
        let env = r.environment.unwrap_or_default();
        CsvRow {
            image: &r.image,
            height: r.height,
            bubble_count: r.bubble_count,
            tracked_points: r.tracked_points,
            status: r.status,
            temperature_f: env.temperature_f,
            humidity_pct: env.humidity_pct,
        }
    }
}

/// Streams records to CSV, one row per frame. Absent values are empty
/// cells.
pub struct RecordWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl RecordWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            inner: csv::Writer::from_writer(writer),
        }
    }

    pub fn write(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.inner.serialize(CsvRow::from(record))?;
        Ok(())
    }

    pub fn write_all<'r>(&mut self, records: impl IntoIterator<Item = &'r MeasurementRecord>) -> Result<()> {
        for r in records {
            self.write(r)?;
        }
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()).into())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// A CSV file that is only created when the first record arrives, so a run
/// that fails before emitting anything leaves no file behind.
pub struct RecordFile {
    path: PathBuf,
    writer: Option<RecordWriter<File>>,
    written: usize,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn write(&mut self, record: &MeasurementRecord) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(RecordWriter::create(&self.path)?);
        }
        if let Some(w) = &mut self.writer {
            w.write(record)?;
            self.written += 1;
        }
        Ok(())
    }

    /// Flush if anything was written; `false` when the file was never
    /// created.
    pub fn finish(&mut self) -> Result<bool> {
        match &mut self.writer {
            Some(w) => {
                w.flush()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured() -> MeasurementRecord {
        MeasurementRecord {
            index: 0,
            image: "image_0001.jpg".into(),
            status: FrameStatus::Measured,
            height: Some(400.0),
            bubble_count: Some(3),
            tracked_points: 8,
            crop_row: Some(100),
            environment: Some(EnvironmentReading {
                temperature_f: Some(72.5),
                humidity_pct: Some(41.0),
            }),
        }
    }

    fn to_csv(records: &[MeasurementRecord]) -> String {
        let mut w = RecordWriter::from_writer(Vec::new());
        w.write_all(records).unwrap();
        String::from_utf8(w.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_header_and_measured_row() {
        let csv = to_csv(&[measured()]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Image,Starter Height (Pixels),Bubble Count,Tracked Points,Status,Temperature (°F),Humidity (%)"
        );
        assert_eq!(lines.next().unwrap(), "image_0001.jpg,400.0,3,8,Measured,72.5,41.0");
    }

    #[test]
    fn test_degraded_row_has_empty_cells() {
        let rec = MeasurementRecord {
            status: FrameStatus::Degraded,
            height: None,
            bubble_count: None,
            crop_row: None,
            environment: None,
            tracked_points: 0,
            ..measured()
        };
        assert_eq!(rec.bubble_count_or_zero(), 0);
        let csv = to_csv(&[rec]);
        assert_eq!(csv.lines().nth(1).unwrap(), "image_0001.jpg,,,0,Degraded,,");
    }

    #[test]
    fn test_record_file_created_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut file = RecordFile::new(&path);
        assert!(!file.finish().unwrap());
        assert!(!path.exists());

        file.write(&measured()).unwrap();
        assert!(file.finish().unwrap());
        assert_eq!(file.written(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
