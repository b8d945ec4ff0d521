// frames.rs — Ordered frame sources.
//
// A source only knows how many frames it has, what they are called and how
// to decode one. Loading is lazy so a day-long time-lapse never sits in
// memory at once; the pipeline holds at most the previous frame and the
// current batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::convert::split_dynamic;
use crate::error::{Error, Result};
use crate::image::Image;

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One decoded photo.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the source's ordering.
    pub index: usize,
    /// Source identifier, normally the file name.
    pub name: String,
    pub gray: Image<u8>,
    /// Present only when the source was asked to keep color.
    pub color: Option<RgbImage>,
}

pub trait FrameSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifier of frame `index`.
    fn name(&self, index: usize) -> &str;

    /// Decode frame `index`.
    fn load(&self, index: usize) -> Result<Frame>;
}

/// Image files in one directory, ordered by file name.
#[derive(Debug, Clone)]
pub struct DirectoryFrameStore {
    files: Vec<PathBuf>,
    names: Vec<String>,
    keep_color: bool,
}

impl DirectoryFrameStore {
    /// List `jpg`/`jpeg`/`png` files in `dir`, optionally only those whose
    /// name starts with `prefix`. Subdirectories are not searched.
    pub fn open(dir: impl AsRef<Path>, prefix: Option<&str>) -> Result<Self> {
        let dir = dir.as_ref();
        let io_err = |source: io::Error| Error::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() || !has_image_extension(&path) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if prefix.is_some_and(|p| !name.starts_with(p)) {
                continue;
            }
            entries.push((name.to_string(), path));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(dir = %dir.display(), frames = entries.len(), "listed frame directory");

        let (names, files) = entries.into_iter().unzip();
        Ok(Self {
            files,
            names,
            keep_color: false,
        })
    }

    /// Also decode the RGB variant of each frame (needed for overlays).
    pub fn with_color(mut self, keep_color: bool) -> Self {
        self.keep_color = keep_color;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for DirectoryFrameStore {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    fn load(&self, index: usize) -> Result<Frame> {
        let name = self.names[index].clone();
        let decoded = match image::open(&self.files[index]) {
            Ok(img) => img,
            Err(source) => return Err(Error::Frame { name, source }),
        };
        let (gray, color) = split_dynamic(decoded, self.keep_color);
        Ok(Frame {
            index,
            name,
            gray,
            color,
        })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Frames held in memory. An entry can be marked unreadable to exercise
/// the skip path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameStore {
    entries: Vec<MemoryEntry>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    name: String,
    frame: Option<(Image<u8>, Option<RgbImage>)>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, gray: Image<u8>) -> &mut Self {
        self.entries.push(MemoryEntry {
            name: name.into(),
            frame: Some((gray, None)),
        });
        self
    }

    pub fn push_color(&mut self, name: impl Into<String>, gray: Image<u8>, color: RgbImage) -> &mut Self {
        self.entries.push(MemoryEntry {
            name: name.into(),
            frame: Some((gray, Some(color))),
        });
        self
    }

    pub fn push_unreadable(&mut self, name: impl Into<String>) -> &mut Self {
        self.entries.push(MemoryEntry {
            name: name.into(),
            frame: None,
        });
        self
    }
}

impl FromIterator<Image<u8>> for MemoryFrameStore {
    /// Names frames `frame_0000`, `frame_0001`, ...
    fn from_iter<I: IntoIterator<Item = Image<u8>>>(iter: I) -> Self {
        let mut store = Self::new();
        for (i, img) in iter.into_iter().enumerate() {
            store.push(format!("frame_{i:04}"), img);
        }
        store
    }
}

impl FrameSource for MemoryFrameStore {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn name(&self, index: usize) -> &str {
        &self.entries[index].name
    }

    fn load(&self, index: usize) -> Result<Frame> {
        let entry = &self.entries[index];
        match &entry.frame {
            Some((gray, color)) => Ok(Frame {
                index,
                name: entry.name.clone(),
                gray: gray.clone(),
                color: color.clone(),
            }),
            None => Err(Error::Frame {
                name: entry.name.clone(),
                source: image::ImageError::IoError(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "frame marked unreadable",
                )),
            }),
        }
    }
}
