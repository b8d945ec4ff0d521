// points.rs — Tracked surface points.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A sub-pixel image position, `x` right and `y` down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Inside `[0, width) × [0, height)`.
    pub fn is_inside(&self, width: usize, height: usize) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x < width as f32 && self.y < height as f32
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Parses `"x,y"`, the form used on the command line.
impl FromStr for Point2 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f32>()
                .map_err(|e| format!("bad coordinate '{v}': {e}"))
        };
        Ok(Point2::new(parse(x)?, parse(y)?))
    }
}

/// The ordered points currently being tracked along the surface.
///
/// Points are only ever dropped, so the set shrinks or stays the same
/// over a run. An empty set means tracking was lost.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointSet(Vec<Point2>);

impl PointSet {
    pub fn new(points: Vec<Point2>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point2> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Point2] {
        &self.0
    }

    /// Mean y in f64, or `None` for an empty set.
    pub fn mean_y(&self) -> Option<f64> {
        if self.0.is_empty() {
            return None;
        }
        let sum: f64 = self.0.iter().map(|p| p.y as f64).sum();
        Some(sum / self.0.len() as f64)
    }
}

impl From<Vec<Point2>> for PointSet {
    fn from(points: Vec<Point2>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point2> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point2>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point2;
    type IntoIter = std::slice::Iter<'a, Point2>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
