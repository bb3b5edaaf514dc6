//! Whole-tile silhouette outlines expressed as SVG path data.

use kurbo::{Affine, BezPath, PathEl, Shape};

use crate::geometry::Point;

/// Reference box the built-in outlines are drawn against.
pub const OUTLINE_BOX: (f64, f64) = (100.0, 90.0);

/// Silhouette for the first tile: wider shoulder on the left, where nothing overlaps it.
pub const FIRST_TILE_OUTLINE: &str =
    "M 4 90 L 2 38 L 14 14 L 34 2 L 50 0 L 66 2 L 84 12 L 96 34 L 94 90 Z";

/// Silhouette shared by every other tile.
pub const REST_TILE_OUTLINE: &str =
    "M 12 90 L 10 44 L 22 16 L 40 3 L 60 3 L 78 16 L 90 44 L 88 90 Z";

/// Flattening tolerance for curved segments, in pixels.
const FLATTEN_TOLERANCE: f64 = 0.25;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("invalid path data: {0}")]
    Svg(#[from] kurbo::SvgParseError),
    #[error("numbers after closepath at byte {0}")]
    ArgumentsAfterClose(usize),
    #[error("outline needs at least three points, got {0}")]
    TooFewPoints(usize),
}

/// A closed outline parsed from path data, in reference-box coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlinePath {
    pub path: BezPath,
    pub box_size: (f64, f64),
}

impl OutlinePath {
    pub fn parse(data: &str, box_size: (f64, f64)) -> Result<Self, PathError> {
        reject_closepath_arguments(data)?;
        let path = BezPath::from_svg(data)?;
        let points = vertex_count(&path);
        if points < 3 {
            return Err(PathError::TooFewPoints(points));
        }
        Ok(Self { path, box_size })
    }

    pub fn vertex_count(&self) -> usize {
        vertex_count(&self.path)
    }

    /// Scales the outline to `tile_height` (keeping aspect ratio) and anchors
    /// it to the bottom-center of a `tile_width × tile_height` tile.
    pub fn fit_to_tile(&self, tile_width: f64, tile_height: f64) -> BezPath {
        let (box_w, box_h) = self.box_size;
        if box_h <= 0.0 {
            return BezPath::new();
        }
        let s = tile_height / box_h;
        let dx = tile_width / 2.0 - box_w * s / 2.0;
        let dy = tile_height - box_h * s;
        Affine::translate((dx, dy)) * Affine::scale(s) * self.path.clone()
    }

    pub fn contains(&self, p: Point) -> bool {
        path_contains(&self.path, p)
    }
}

/// The pair of outlines used in whole-shape mode.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineSet {
    pub first: OutlinePath,
    pub rest: OutlinePath,
}

impl OutlineSet {
    pub fn builtin() -> Result<Self, PathError> {
        Self::from_data(FIRST_TILE_OUTLINE, REST_TILE_OUTLINE)
    }

    pub fn from_data(first: &str, rest: &str) -> Result<Self, PathError> {
        Ok(Self {
            first: OutlinePath::parse(first, OUTLINE_BOX)?,
            rest: OutlinePath::parse(rest, OUTLINE_BOX)?,
        })
    }

    pub fn for_index(&self, index: usize) -> &OutlinePath {
        if index == 0 { &self.first } else { &self.rest }
    }
}

/// Nonzero-winding containment.
pub fn path_contains(path: &BezPath, p: Point) -> bool {
    path.contains(kurbo::Point::new(p.x, p.y))
}

/// Vertices of `path`, curves flattened, for drawing.
pub fn polygon(path: &BezPath) -> Vec<Point> {
    let mut points = Vec::new();
    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => points.push(Point::new(p.x, p.y)),
        _ => {}
    });
    points
}

fn vertex_count(path: &BezPath) -> usize {
    path.elements()
        .iter()
        .filter(|el| !matches!(el, PathEl::ClosePath))
        .count()
}

/// Closepath takes no arguments, so a number right after it is malformed
/// rather than an implicit repeat.
fn reject_closepath_arguments(data: &str) -> Result<(), PathError> {
    for (i, c) in data.char_indices() {
        if !matches!(c, 'Z' | 'z') {
            continue;
        }
        let rest = data[i + c.len_utf8()..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
            return Err(PathError::ArgumentsAfterClose(i));
        }
    }
    Ok(())
}
