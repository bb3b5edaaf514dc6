//! Per-tile clickable regions and pointer dispatch.

use kurbo::BezPath;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, RotatedRect};
use crate::layout::{TileGeometry, TrackLayout};
use crate::outline::{OutlineSet, path_contains, polygon};
use crate::pieces::{
    ChainConfig, PieceOverrides, PieceScale, ResolvedPiece, first_tile_pieces, middle_tile_pieces,
    resolve_pieces,
};

/// How decomposed tiles build their clickable area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HitMode {
    /// Rotated-rectangle pieces, individually tunable.
    #[default]
    Pieces,
    /// One silhouette path per tile role.
    Outline,
}

/// Clickable area of one tile, in tile-local pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum HitRegion {
    Full(RotatedRect),
    Pieces(Vec<ResolvedPiece>),
    Outline(BezPath),
}

impl HitRegion {
    pub fn contains(&self, p: Point) -> bool {
        match self {
            Self::Full(rect) => rect.contains(p),
            Self::Pieces(pieces) => pieces.iter().any(|piece| piece.rect.contains(p)),
            Self::Outline(path) => path_contains(path, p),
        }
    }

    /// Closed polygons describing the region, for diagnostics.
    pub fn outlines(&self) -> Vec<Vec<Point>> {
        match self {
            Self::Full(rect) => vec![rect.corners().to_vec()],
            Self::Pieces(pieces) => pieces.iter().map(|p| p.rect.corners().to_vec()).collect(),
            Self::Outline(path) => vec![polygon(path)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileRegion {
    pub index: usize,
    pub region: HitRegion,
}

/// Inputs shared by every tile of one resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub layout: &'a TrackLayout,
    pub mode: HitMode,
    pub chain: &'a ChainConfig,
    pub overrides: &'a PieceOverrides,
    /// Required for [`HitMode::Outline`]; without it tiles fall back to
    /// whole-tile regions.
    pub outlines: Option<&'a OutlineSet>,
}

impl ResolveContext<'_> {
    fn scale(&self) -> PieceScale {
        PieceScale::new(self.layout.metrics.button_width, self.tile_height())
    }

    fn tile_height(&self) -> f64 {
        self.layout.tiles.first().map_or(0.0, |t| t.height_px)
    }

    /// Left edge of the part of a middle tile not covered by its predecessor.
    pub fn overlap_boundary(&self) -> f64 {
        self.layout.metrics.button_width - self.layout.metrics.step_eq
    }
}

/// Picks the strategy for one tile and resolves its region.
pub fn resolve_tile(ctx: &ResolveContext<'_>, tile: &TileGeometry) -> HitRegion {
    let full = || {
        HitRegion::Full(RotatedRect::axis_aligned(
            0.0,
            0.0,
            tile.visible_width(),
            tile.height_px,
        ))
    };
    let count = ctx.layout.tiles.len();
    if count == 1 {
        return full();
    }

    match ctx.mode {
        HitMode::Outline => ctx.outlines.map_or_else(full, |set| {
            HitRegion::Outline(
                set.for_index(tile.index)
                    .fit_to_tile(tile.width_px, tile.height_px),
            )
        }),
        // Nothing overlaps the last tile, so its whole face is clickable.
        HitMode::Pieces if tile.index + 1 == count => full(),
        HitMode::Pieces if tile.index == 0 => {
            let pieces = first_tile_pieces(ctx.scale(), ctx.chain, ctx.overrides);
            HitRegion::Pieces(resolve_pieces(Point::ZERO, &pieces))
        }
        HitMode::Pieces => {
            let pieces = middle_tile_pieces(ctx.scale(), ctx.overrides);
            HitRegion::Pieces(resolve_pieces(
                Point::new(ctx.overlap_boundary(), 0.0),
                &pieces,
            ))
        }
    }
}

pub fn resolve_regions(ctx: &ResolveContext<'_>) -> Vec<TileRegion> {
    ctx.layout
        .tiles
        .iter()
        .map(|tile| TileRegion {
            index: tile.index,
            region: resolve_tile(ctx, tile),
        })
        .collect()
}

/// Finds the topmost tile whose region contains `container_point`.
///
/// Tiles are tried in decreasing z-order, so where regions overlap the
/// earlier tile wins. Points in a tile's clipped strip never hit it.
pub fn hit_test(layout: &TrackLayout, regions: &[TileRegion], container_point: Point) -> Option<usize> {
    let local = layout.container_to_local(container_point)?;
    let mut tiles: Vec<&TileGeometry> = layout.tiles.iter().collect();
    tiles.sort_by(|a, b| b.z_order.cmp(&a.z_order));

    tiles.into_iter().find_map(|tile| {
        let p = Point::new(local.x - tile.left_px, local.y);
        if p.x < 0.0 || p.x > tile.visible_width() {
            return None;
        }
        let region = regions.iter().find(|r| r.index == tile.index)?;
        region.region.contains(p).then_some(tile.index)
    })
}
