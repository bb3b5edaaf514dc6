//! Horizontal track layout.
//!
//! Tiles overlap: each tile's left edge advances by an equalized step that is
//! shorter than the tile width, and earlier tiles sit above later ones.

use std::collections::BTreeMap;

use glam::DAffine2;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::util::finite_or_zero;

/// Artwork reference box width, in reference pixels.
pub const REFERENCE_ITEM_WIDTH: f64 = 323.0;
/// Artwork reference box height; the mega tile size at which `REFERENCE_ITEM_WIDTH` applies.
pub const REFERENCE_MEGA_TILE_SIZE: f64 = 290.0;
/// Fraction of the mega tile size that neighbouring tiles share.
pub const OVERLAP_RATIO: f64 = 0.36;
pub const DEFAULT_MEGA_TILE_SIZE: f64 = 160.0;

/// Widens the track's viewport on the left and trims it on the right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualViewport {
    pub extend_left_px: f64,
    pub trim_right_px: f64,
}

/// Whole-track uniform scale about an anchor derived from the last tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnchoredScale {
    /// Gap between the last tile's right edge and the effective right edge.
    pub inset_right_px: f64,
    pub scale: f64,
    /// Vertical anchor as a fraction of tile height (0 = top, 1 = bottom).
    pub pivot_y: f64,
}

impl Default for AnchoredScale {
    fn default() -> Self {
        Self {
            inset_right_px: 0.0,
            scale: 1.0,
            pivot_y: 1.0,
        }
    }
}

/// Fully resolved layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutParams {
    pub mega_tile_size: f64,
    pub compress_factor: f64,
    pub first_offset_px: f64,
    pub last_offset_px: f64,
    pub crop_first_right_px: f64,
    pub redistribute_between_first_and_last: bool,
    pub auto_align_last_to_right: bool,
    pub viewport: VirtualViewport,
    pub anchored: Option<AnchoredScale>,
    /// Per-index nudge added to the computed left edge.
    pub left_offset_overrides: BTreeMap<usize, f64>,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            mega_tile_size: DEFAULT_MEGA_TILE_SIZE,
            compress_factor: 1.0,
            first_offset_px: 0.0,
            last_offset_px: 0.0,
            crop_first_right_px: 0.0,
            redistribute_between_first_and_last: false,
            auto_align_last_to_right: false,
            viewport: VirtualViewport::default(),
            anchored: None,
            left_offset_overrides: BTreeMap::new(),
        }
    }
}

impl LayoutParams {
    /// Compress factor coerced into `(0, 1]`.
    pub fn effective_compress_factor(&self) -> f64 {
        let c = self.compress_factor;
        if c.is_finite() && c > 0.0 { c.min(1.0) } else { 1.0 }
    }

    /// Rendered width of one tile.
    pub fn button_width(&self) -> f64 {
        REFERENCE_ITEM_WIDTH * finite_or_zero(self.mega_tile_size) / REFERENCE_MEGA_TILE_SIZE
    }

    pub fn tile_height(&self) -> f64 {
        finite_or_zero(self.mega_tile_size)
    }
}

/// Intermediate spacing values, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub button_width: f64,
    pub base_overlap: f64,
    pub base_step: f64,
    pub step: f64,
    pub step_eq: f64,
    /// Last offset actually used (differs from the parameter under auto-align).
    pub last_offset_px: f64,
}

/// Computes the spacing for `count` tiles across `effective_width`.
#[allow(clippy::cast_precision_loss)]
pub fn step_metrics(params: &LayoutParams, count: usize, effective_width: f64) -> StepMetrics {
    let mega = params.tile_height();
    let button_width = params.button_width();
    let base_overlap = (mega * OVERLAP_RATIO).round();
    let base_step = (button_width - base_overlap).max(0.0);
    let step = (base_step * params.effective_compress_factor()).round();

    let first = finite_or_zero(params.first_offset_px);
    let spans = count.saturating_sub(1) as f64;
    let inset = params.anchored.map_or(0.0, |a| finite_or_zero(a.inset_right_px));

    let last_offset_px = if (params.auto_align_last_to_right || params.anchored.is_some()) && count >= 2 {
        effective_width - inset - button_width - (first + spans * step)
    } else {
        finite_or_zero(params.last_offset_px)
    };

    let step_eq = if count >= 2 {
        step + last_offset_px / spans
    } else {
        step
    };

    StepMetrics {
        button_width,
        base_overlap,
        base_step,
        step,
        step_eq,
        last_offset_px,
    }
}

/// Geometry of one tile in track-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileGeometry {
    pub index: usize,
    pub left_px: f64,
    pub width_px: f64,
    pub height_px: f64,
    /// Higher values are drawn on top.
    pub z_order: usize,
    /// Pixels clipped from the right edge of the artwork.
    pub clip_right_px: f64,
}

impl TileGeometry {
    /// Width that remains visible (and clickable) after clipping.
    pub fn visible_width(&self) -> f64 {
        (self.width_px - self.clip_right_px).max(0.0)
    }
}

/// Uniform scale applied to the whole track about `anchor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackTransform {
    pub anchor: Point,
    pub scale: f64,
}

impl TrackTransform {
    /// Scale about `anchor` as an affine map.
    pub fn affine(&self) -> DAffine2 {
        DAffine2::from_translation(self.anchor)
            * DAffine2::from_scale(Point::splat(self.scale))
            * DAffine2::from_translation(-self.anchor)
    }
}

/// Output of [`compute_layout`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLayout {
    pub container_width: f64,
    /// Container x of the track-local origin.
    pub viewport_left: f64,
    pub effective_width: f64,
    pub metrics: StepMetrics,
    pub tiles: Vec<TileGeometry>,
    pub transform: Option<TrackTransform>,
}

impl TrackLayout {
    /// Track-local to container coordinates.
    pub fn to_container(&self) -> DAffine2 {
        let shift = DAffine2::from_translation(Point::new(self.viewport_left, 0.0));
        match self.transform {
            Some(t) => shift * t.affine(),
            None => shift,
        }
    }

    pub fn local_to_container(&self, p: Point) -> Point {
        self.to_container().transform_point2(p)
    }

    /// Inverse of [`Self::local_to_container`]. `None` for a degenerate scale.
    pub fn container_to_local(&self, p: Point) -> Option<Point> {
        let affine = self.to_container();
        if affine.matrix2.determinant().abs() < f64::EPSILON {
            return None;
        }
        Some(affine.inverse().transform_point2(p))
    }

    pub fn scale(&self) -> f64 {
        self.transform.map_or(1.0, |t| t.scale)
    }
}

/// Lays out `count` tiles in a container `container_width` pixels wide.
///
/// Returns `None` when the host has not been measured yet (missing or
/// non-finite width) or when there is nothing to lay out.
#[allow(clippy::cast_precision_loss)]
pub fn compute_layout(
    container_width: Option<f64>,
    count: usize,
    params: &LayoutParams,
) -> Option<TrackLayout> {
    let width = container_width.filter(|w| w.is_finite() && *w > 0.0)?;
    if count == 0 {
        return None;
    }

    let extend = finite_or_zero(params.viewport.extend_left_px);
    let trim = finite_or_zero(params.viewport.trim_right_px);
    let effective_width = width + extend - trim;
    let metrics = step_metrics(params, count, effective_width);

    let first = finite_or_zero(params.first_offset_px);
    let last_index = count - 1;
    let nudge = |i: usize| {
        params
            .left_offset_overrides
            .get(&i)
            .copied()
            .map_or(0.0, finite_or_zero)
    };
    let base_left = |i: usize| {
        if i == last_index && count >= 2 {
            first + last_index as f64 * metrics.step + metrics.last_offset_px
        } else {
            first + i as f64 * metrics.step_eq
        }
    };

    let first_left = base_left(0) + nudge(0);
    let last_left = base_left(last_index) + nudge(last_index);

    let tiles = (0..count)
        .map(|i| {
            let left_px = if i == 0 {
                first_left
            } else if i == last_index {
                last_left
            } else if params.left_offset_overrides.contains_key(&i) {
                base_left(i) + nudge(i)
            } else if params.redistribute_between_first_and_last {
                let t = i as f64 / last_index as f64;
                first_left + (last_left - first_left) * t
            } else {
                base_left(i)
            };
            TileGeometry {
                index: i,
                left_px,
                width_px: metrics.button_width,
                height_px: params.tile_height(),
                z_order: count - i,
                clip_right_px: if i == 0 {
                    finite_or_zero(params.crop_first_right_px).clamp(0.0, metrics.button_width)
                } else {
                    0.0
                },
            }
        })
        .collect();

    let transform = params.anchored.map(|a| TrackTransform {
        anchor: Point::new(
            effective_width - finite_or_zero(a.inset_right_px),
            finite_or_zero(a.pivot_y) * params.tile_height(),
        ),
        scale: if a.scale.is_finite() && a.scale > 0.0 { a.scale } else { 1.0 },
    });

    tracing::debug!(
        count,
        width,
        step = metrics.step,
        step_eq = metrics.step_eq,
        "computed track layout"
    );

    Some(TrackLayout {
        container_width: width,
        viewport_left: -extend,
        effective_width,
        metrics,
        tiles,
        transform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden_params() -> LayoutParams {
        LayoutParams {
            mega_tile_size: 160.0,
            compress_factor: 0.79,
            first_offset_px: -20.0,
            last_offset_px: 63.0,
            ..LayoutParams::default()
        }
    }

    #[test]
    fn test_golden_fourteen_tiles() {
        let layout = compute_layout(Some(1600.0), 14, &golden_params()).unwrap();
        let m = layout.metrics;

        assert!((m.button_width - 323.0 * 160.0 / 290.0).abs() < 1e-12);
        assert_eq!(m.base_overlap, 58.0);
        assert_eq!(m.step, 95.0);
        assert!((m.step_eq - (95.0 + 63.0 / 13.0)).abs() < 1e-12);

        assert_eq!(layout.tiles.len(), 14);
        for tile in &layout.tiles[..13] {
            let expected = -20.0 + tile.index as f64 * m.step_eq;
            assert!(
                (tile.left_px - expected).abs() < 1e-9,
                "tile {} at {} expected {}",
                tile.index,
                tile.left_px,
                expected
            );
        }
        assert_eq!(layout.tiles[13].left_px, 1278.0);
        assert_eq!(layout.tiles[0].left_px, -20.0);
        assert!((layout.tiles[1].left_px - 79.846_153_846_153_85).abs() < 1e-9);
    }

    #[test]
    fn test_equalized_spacing_lands_last_tile() {
        for count in 2..20 {
            let params = golden_params();
            let layout = compute_layout(Some(1200.0), count, &params).unwrap();
            let m = layout.metrics;
            let last = layout.tiles.last().unwrap();
            let spans = (count - 1) as f64;
            assert_eq!(last.left_px, -20.0 + spans * m.step + 63.0);
            assert!((last.left_px - (-20.0 + spans * m.step_eq)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_monotonic_placement() {
        for compress in [0.3, 0.5, 0.79, 1.0] {
            for redistribute in [false, true] {
                let params = LayoutParams {
                    compress_factor: compress,
                    redistribute_between_first_and_last: redistribute,
                    ..golden_params()
                };
                let layout = compute_layout(Some(900.0), 9, &params).unwrap();
                for pair in layout.tiles.windows(2) {
                    assert!(
                        pair[1].left_px > pair[0].left_px,
                        "not increasing at compress {compress}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_z_order_decreases_with_index() {
        let layout = compute_layout(Some(800.0), 5, &LayoutParams::default()).unwrap();
        let z: Vec<usize> = layout.tiles.iter().map(|t| t.z_order).collect();
        assert_eq!(z, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_unmeasured_container_renders_nothing() {
        let params = LayoutParams::default();
        assert!(compute_layout(None, 5, &params).is_none());
        assert!(compute_layout(Some(f64::NAN), 5, &params).is_none());
        assert!(compute_layout(Some(0.0), 5, &params).is_none());
        assert!(compute_layout(Some(500.0), 0, &params).is_none());
    }

    #[test]
    fn test_single_tile_sits_at_first_offset() {
        let layout = compute_layout(Some(500.0), 1, &golden_params()).unwrap();
        assert_eq!(layout.tiles.len(), 1);
        assert_eq!(layout.tiles[0].left_px, -20.0);
        assert_eq!(layout.metrics.step_eq, layout.metrics.step);
    }

    #[test]
    fn test_redistribution_honours_endpoint_overrides() {
        let mut params = golden_params();
        params.redistribute_between_first_and_last = true;
        params.left_offset_overrides.insert(0, 10.0);
        params.left_offset_overrides.insert(4, -30.0);
        let layout = compute_layout(Some(1000.0), 5, &params).unwrap();

        let first = layout.tiles[0].left_px;
        let last = layout.tiles[4].left_px;
        assert_eq!(first, -10.0);
        assert_eq!(last, -20.0 + 4.0 * 95.0 + 63.0 - 30.0);
        let gap = (last - first) / 4.0;
        for tile in &layout.tiles {
            assert!((tile.left_px - (first + gap * tile.index as f64)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_middle_override_wins_over_redistribution() {
        let mut params = golden_params();
        params.redistribute_between_first_and_last = true;
        params.last_offset_px = 0.0;
        params.left_offset_overrides.insert(2, 7.0);
        let layout = compute_layout(Some(1000.0), 5, &params).unwrap();
        let expected = -20.0 + 2.0 * layout.metrics.step_eq + 7.0;
        assert!((layout.tiles[2].left_px - expected).abs() < 1e-9);
    }

    #[test]
    fn test_auto_align_meets_right_edge() {
        let params = LayoutParams {
            auto_align_last_to_right: true,
            viewport: VirtualViewport {
                extend_left_px: 40.0,
                trim_right_px: 10.0,
            },
            ..golden_params()
        };
        let layout = compute_layout(Some(1000.0), 6, &params).unwrap();
        let last = layout.tiles.last().unwrap();
        assert!((last.left_px + last.width_px - 1030.0).abs() < 1e-9);
        assert_eq!(layout.viewport_left, -40.0);
        assert_eq!(layout.effective_width, 1030.0);
    }

    #[test]
    fn test_anchored_scale_keeps_anchor_fixed() {
        let params = LayoutParams {
            anchored: Some(AnchoredScale {
                inset_right_px: 20.0,
                scale: 0.8,
                pivot_y: 1.0,
            }),
            ..golden_params()
        };
        let layout = compute_layout(Some(1000.0), 6, &params).unwrap();
        let last = layout.tiles.last().unwrap();
        assert!((last.left_px + last.width_px - 980.0).abs() < 1e-9);

        let anchor = layout.transform.unwrap().anchor;
        assert_eq!(anchor, Point::new(980.0, 160.0));
        assert!(layout.local_to_container(anchor).distance(anchor) < 1e-9);

        let p = Point::new(100.0, 20.0);
        let mapped = layout.local_to_container(p);
        let back = layout.container_to_local(mapped).unwrap();
        assert!(back.distance(p) < 1e-9);
    }

    #[test]
    fn test_crop_clips_first_tile_only() {
        let params = LayoutParams {
            crop_first_right_px: 20.0,
            ..golden_params()
        };
        let layout = compute_layout(Some(1000.0), 3, &params).unwrap();
        assert_eq!(layout.tiles[0].clip_right_px, 20.0);
        assert!((layout.tiles[0].visible_width() - (layout.metrics.button_width - 20.0)).abs() < 1e-9);
        assert_eq!(layout.tiles[1].clip_right_px, 0.0);
    }

    #[test]
    fn test_compress_factor_is_sanitized() {
        let mut params = golden_params();
        params.compress_factor = f64::NAN;
        assert_eq!(params.effective_compress_factor(), 1.0);
        params.compress_factor = -0.5;
        assert_eq!(params.effective_compress_factor(), 1.0);
        params.compress_factor = 3.0;
        assert_eq!(params.effective_compress_factor(), 1.0);
    }
}
