//! Rotated-rectangle pieces that make up a decomposed hit region.
//!
//! A piece is either placed at an offset from the tile's piece origin, or
//! chained: one of its corners is pinned to a corner of an earlier piece.
//! Mirrored pieces flip their rotation and shift down by
//! `min_y(θ) − min_y(−θ)` so their top edge stays where the source's was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, RotatedRect, Vertex, min_y_at_rotation, rect_vertex, rotate};
use crate::layout::{REFERENCE_ITEM_WIDTH, REFERENCE_MEGA_TILE_SIZE};

/// Corner-to-corner attachment to an earlier piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSpec {
    /// ID of the piece being attached to.
    pub piece: String,
    /// Corner of that piece the attachment point sits on.
    pub target_vertex: Vertex,
    /// Corner of this piece that lands on the attachment point.
    pub own_vertex: Vertex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    pub id: String,
    /// Offset from the piece origin; for chained pieces, a nudge after chaining.
    pub x_offset_px: f64,
    pub y_offset_px: f64,
    pub rotation_deg: f64,
    pub width_px: f64,
    pub height_px: f64,
    #[serde(default)]
    pub anchor: Option<AnchorSpec>,
    #[serde(default)]
    pub mirrored: bool,
}

/// Per-field replacement for a piece's default geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PieceOverride {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub rotation: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl PieceOverride {
    pub fn apply(&self, piece: &mut Piece) {
        let keep_finite = |v: Option<f64>| v.filter(|v| v.is_finite());
        if let Some(x) = keep_finite(self.x) {
            piece.x_offset_px = x;
        }
        if let Some(y) = keep_finite(self.y) {
            piece.y_offset_px = y;
        }
        if let Some(r) = keep_finite(self.rotation) {
            piece.rotation_deg = r;
        }
        if let Some(w) = keep_finite(self.width) {
            piece.width_px = w.max(0.0);
        }
        if let Some(h) = keep_finite(self.height) {
            piece.height_px = h.max(0.0);
        }
    }

    /// Field-wise merge where `self` takes priority over `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            x: self.x.or(fallback.x),
            y: self.y.or(fallback.y),
            rotation: self.rotation.or(fallback.rotation),
            width: self.width.or(fallback.width),
            height: self.height.or(fallback.height),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub type PieceOverrides = BTreeMap<String, PieceOverride>;

/// A piece after chaining and mirroring, in tile-local pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPiece {
    pub id: String,
    pub rect: RotatedRect,
    pub mirrored: bool,
}

/// Options for the chained fifth piece of the first tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainConfig {
    pub enabled: bool,
    pub target_vertex: Vertex,
    pub own_vertex: Vertex,
    pub mirror: bool,
    pub mirror_offset: Point,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_vertex: Vertex::TopRight,
            own_vertex: Vertex::TopLeft,
            mirror: false,
            mirror_offset: Point::ZERO,
        }
    }
}

/// Corner of `base` used as an attachment point.
pub fn anchor_point(base: &RotatedRect, vertex: Vertex) -> Point {
    base.vertex(vertex)
}

/// Origin that puts this piece's `own_vertex` (after its rotation) on `anchor`.
pub fn chain_origin(
    anchor: Point,
    width: f64,
    height: f64,
    rotation_deg: f64,
    own_vertex: Vertex,
) -> Point {
    anchor - rotate(rect_vertex(width, height, own_vertex), rotation_deg.to_radians())
}

/// Vertical shift that re-aligns a mirrored piece's top edge with its source.
pub fn mirror_compensation(width: f64, height: f64, rotation_deg: f64) -> f64 {
    min_y_at_rotation(width, height, rotation_deg) - min_y_at_rotation(width, height, -rotation_deg)
}

/// Mirrored copy of `source`: negated rotation, compensated vertically, then
/// moved by `manual`.
pub fn mirror_rect(source: &RotatedRect, manual: Point) -> RotatedRect {
    let delta = mirror_compensation(source.width, source.height, source.rotation_deg);
    RotatedRect {
        origin: source.origin + Point::new(manual.x, delta + manual.y),
        width: source.width,
        height: source.height,
        rotation_deg: -source.rotation_deg,
    }
}

/// Resolves pieces in order relative to `origin`.
///
/// A chained piece whose target has not been resolved yet falls back to
/// plain offset placement.
pub fn resolve_pieces(origin: Point, pieces: &[Piece]) -> Vec<ResolvedPiece> {
    let mut resolved: Vec<ResolvedPiece> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let offset = Point::new(piece.x_offset_px, piece.y_offset_px);
        let target = piece.anchor.as_ref().and_then(|anchor| {
            let found = resolved
                .iter()
                .find(|r| r.id == anchor.piece)
                .map(|base| (anchor, base.rect));
            if found.is_none() {
                tracing::warn!(piece = %piece.id, target = %anchor.piece, "chain target not resolved");
            }
            found
        });

        let rect = match target {
            Some((anchor, base)) => {
                let pinned = chain_origin(
                    anchor_point(&base, anchor.target_vertex),
                    piece.width_px,
                    piece.height_px,
                    piece.rotation_deg,
                    anchor.own_vertex,
                );
                let unmirrored =
                    RotatedRect::new(pinned, piece.width_px, piece.height_px, piece.rotation_deg);
                if piece.mirrored {
                    mirror_rect(&unmirrored, offset)
                } else {
                    RotatedRect {
                        origin: pinned + offset,
                        ..unmirrored
                    }
                }
            }
            None => {
                let placed = RotatedRect::new(
                    origin + offset,
                    piece.width_px,
                    piece.height_px,
                    piece.rotation_deg,
                );
                if piece.mirrored {
                    mirror_rect(&placed, Point::ZERO)
                } else {
                    placed
                }
            }
        };

        resolved.push(ResolvedPiece {
            id: piece.id.clone(),
            rect,
            mirrored: piece.mirrored,
        });
    }
    resolved
}

/// Default geometry in reference-box units (323 × 290).
#[derive(Debug, Clone, Copy)]
struct PieceTemplate {
    id: &'static str,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rotation_deg: f64,
}

const fn template(
    id: &'static str,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rotation_deg: f64,
) -> PieceTemplate {
    PieceTemplate {
        id,
        x,
        y,
        width,
        height,
        rotation_deg,
    }
}

const FIRST_TILE_SECTORS: [PieceTemplate; 4] = [
    template("first.1", 0.0, 40.0, 120.0, 250.0, 0.0),
    template("first.2", 96.0, 0.0, 132.0, 110.0, 0.0),
    template("first.3", 110.0, 100.0, 128.0, 190.0, 0.0),
    template("first.4", 228.0, 70.0, 62.0, 150.0, -10.0),
];

const FIRST_TILE_CHAIN: PieceTemplate = template("first.5", 0.0, 0.0, 40.0, 96.0, 14.0);

pub const FIRST_CHAIN_ID: &str = "first.5";
pub const FIRST_MIRROR_ID: &str = "first.5m";

/// Offsets are from the overlap boundary with the previous tile.
const MIDDLE_TILE_PIECES: [PieceTemplate; 7] = [
    template("mid.1", 0.0, 20.0, 70.0, 90.0, 0.0),
    template("mid.2", -22.0, 110.0, 44.0, 120.0, 12.0),
    template("mid.3", 22.0, 110.0, 96.0, 110.0, 0.0),
    template("mid.4", 118.0, 40.0, 44.0, 160.0, -6.0),
    template("mid.5", -10.0, 220.0, 80.0, 70.0, 0.0),
    template("mid.6", 70.0, 220.0, 84.0, 70.0, 0.0),
    template("mid.7", 24.0, 0.0, 100.0, 24.0, 0.0),
];

/// Reference-box to pixel scale factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceScale {
    pub sx: f64,
    pub sy: f64,
}

impl PieceScale {
    pub fn new(button_width: f64, tile_height: f64) -> Self {
        Self {
            sx: button_width / REFERENCE_ITEM_WIDTH,
            sy: tile_height / REFERENCE_MEGA_TILE_SIZE,
        }
    }

    fn piece(self, t: &PieceTemplate, overrides: &PieceOverrides) -> Piece {
        let mut piece = Piece {
            id: t.id.to_owned(),
            x_offset_px: t.x * self.sx,
            y_offset_px: t.y * self.sy,
            rotation_deg: t.rotation_deg,
            width_px: t.width * self.sx,
            height_px: t.height * self.sy,
            anchor: None,
            mirrored: false,
        };
        if let Some(o) = overrides.get(t.id) {
            o.apply(&mut piece);
        }
        piece
    }
}

/// Piece list for the first tile: four sectors plus the optional chained
/// piece and its mirror.
pub fn first_tile_pieces(
    scale: PieceScale,
    chain: &ChainConfig,
    overrides: &PieceOverrides,
) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = FIRST_TILE_SECTORS
        .iter()
        .map(|t| scale.piece(t, overrides))
        .collect();
    if !chain.enabled {
        return pieces;
    }

    let anchor = AnchorSpec {
        piece: FIRST_TILE_SECTORS[3].id.to_owned(),
        target_vertex: chain.target_vertex,
        own_vertex: chain.own_vertex,
    };
    let mut chained = scale.piece(&FIRST_TILE_CHAIN, overrides);
    // Template offsets are meaningless once chained; only overrides nudge.
    let nudge = overrides.get(FIRST_CHAIN_ID).copied().unwrap_or_default();
    chained.x_offset_px = nudge.x.unwrap_or(0.0);
    chained.y_offset_px = nudge.y.unwrap_or(0.0);
    chained.anchor = Some(anchor.clone());

    if chain.mirror {
        let manual = overrides.get(FIRST_MIRROR_ID).copied().unwrap_or_default();
        pieces.push(chained.clone());
        pieces.push(Piece {
            id: FIRST_MIRROR_ID.to_owned(),
            x_offset_px: manual.x.unwrap_or(chain.mirror_offset.x),
            y_offset_px: manual.y.unwrap_or(chain.mirror_offset.y),
            anchor: Some(anchor),
            mirrored: true,
            ..chained
        });
    } else {
        pieces.push(chained);
    }
    pieces
}

/// Piece list for a middle tile.
pub fn middle_tile_pieces(scale: PieceScale, overrides: &PieceOverrides) -> Vec<Piece> {
    MIDDLE_TILE_PIECES
        .iter()
        .map(|t| scale.piece(t, overrides))
        .collect()
}
