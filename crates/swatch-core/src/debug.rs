//! Diagnostic overlay model. Only visualizes geometry; never feeds back
//! into layout or hit testing.

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationRecord, FieldSources};
use crate::geometry::Point;
use crate::hit_region::{HitRegion, TileRegion};
use crate::layout::TrackLayout;
use crate::session::CalibrationMode;
use crate::signature::GeometrySignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugFlags {
    pub outlines: bool,
    pub hud: bool,
    pub guides: bool,
}

impl DebugFlags {
    pub fn any(&self) -> bool {
        self.outlines || self.hud || self.guides
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineKind {
    TileBounds,
    Piece,
    Silhouette,
}

/// A closed polygon in container coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugOutline {
    pub tile: usize,
    pub kind: OutlineKind,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideKind {
    TileLeft,
    OverlapBoundary,
    Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideLine {
    pub kind: GuideKind,
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudLine {
    pub label: &'static str,
    pub value: String,
}

/// Numeric state shown in the heads-up readout.
#[derive(Debug, Clone, Copy)]
pub struct HudState<'a> {
    /// `None` while no calibration session is running.
    pub mode: Option<CalibrationMode>,
    pub record: Option<&'a CalibrationRecord>,
    pub sources: Option<FieldSources>,
    pub signature: Option<&'a GeometrySignature>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugOverlay {
    pub outlines: Vec<DebugOutline>,
    pub guides: Vec<GuideLine>,
    pub hud: Vec<HudLine>,
}

impl DebugOverlay {
    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty() && self.guides.is_empty() && self.hud.is_empty()
    }
}

pub fn build_overlay(
    flags: DebugFlags,
    layout: &TrackLayout,
    regions: &[TileRegion],
    hud: &HudState<'_>,
) -> DebugOverlay {
    let mut overlay = DebugOverlay::default();
    if flags.outlines {
        overlay.outlines = outlines(layout, regions);
    }
    if flags.guides {
        overlay.guides = guides(layout);
    }
    if flags.hud {
        overlay.hud = hud_lines(layout, hud);
    }
    overlay
}

fn to_container(layout: &TrackLayout, tile_left: f64, p: Point) -> Point {
    layout.local_to_container(Point::new(tile_left + p.x, p.y))
}

fn outlines(layout: &TrackLayout, regions: &[TileRegion]) -> Vec<DebugOutline> {
    let mut out = Vec::new();
    for tile in &layout.tiles {
        let bounds = [
            Point::new(0.0, 0.0),
            Point::new(tile.visible_width(), 0.0),
            Point::new(tile.visible_width(), tile.height_px),
            Point::new(0.0, tile.height_px),
        ];
        out.push(DebugOutline {
            tile: tile.index,
            kind: OutlineKind::TileBounds,
            points: bounds
                .iter()
                .map(|p| to_container(layout, tile.left_px, *p))
                .collect(),
        });

        let Some(region) = regions.iter().find(|r| r.index == tile.index) else {
            continue;
        };
        let kind = match region.region {
            // Already covered by the bounds outline.
            HitRegion::Full(_) => continue,
            HitRegion::Pieces(_) => OutlineKind::Piece,
            HitRegion::Outline(_) => OutlineKind::Silhouette,
        };
        for polygon in region.region.outlines() {
            out.push(DebugOutline {
                tile: tile.index,
                kind,
                points: polygon
                    .iter()
                    .map(|p| to_container(layout, tile.left_px, *p))
                    .collect(),
            });
        }
    }
    out
}

fn guides(layout: &TrackLayout) -> Vec<GuideLine> {
    let height = layout.tiles.first().map_or(0.0, |t| t.height_px);
    let vertical = |kind: GuideKind, x: f64| GuideLine {
        kind,
        from: layout.local_to_container(Point::new(x, 0.0)),
        to: layout.local_to_container(Point::new(x, height)),
    };

    let boundary = layout.metrics.button_width - layout.metrics.step_eq;
    let last = layout.tiles.len().saturating_sub(1);
    let mut out: Vec<GuideLine> = Vec::new();
    for tile in &layout.tiles {
        out.push(vertical(GuideKind::TileLeft, tile.left_px));
        if tile.index > 0 && tile.index < last {
            out.push(vertical(GuideKind::OverlapBoundary, tile.left_px + boundary));
        }
    }
    if let Some(t) = layout.transform {
        let anchor = layout.local_to_container(t.anchor);
        out.push(GuideLine {
            kind: GuideKind::Anchor,
            from: Point::new(anchor.x, 0.0),
            to: Point::new(anchor.x, anchor.y),
        });
    }
    out
}

fn hud_lines(layout: &TrackLayout, hud: &HudState<'_>) -> Vec<HudLine> {
    let m = layout.metrics;
    let mut lines = vec![
        HudLine {
            label: "mode",
            value: hud.mode.map_or_else(|| "off".to_owned(), |m| m.as_str().to_owned()),
        },
        HudLine {
            label: "step",
            value: format!("{:.0} / eq {:.3}", m.step, m.step_eq),
        },
        HudLine {
            label: "button",
            value: format!("{:.2} x {:.0}", m.button_width, layout.tiles.first().map_or(0.0, |t| t.height_px)),
        },
        HudLine {
            label: "lastOffset",
            value: format!("{:.1}", m.last_offset_px),
        },
    ];
    if let Some(record) = hud.record {
        let mut value = format!("x {:.1}  y {:.1}  s {:.3}", record.x, record.y, record.scale);
        if let Some((rx, ry)) = record.ratios() {
            value.push_str(&format!("  rx {rx:.4}  ry {ry:.4}"));
        }
        lines.push(HudLine {
            label: "calibration",
            value,
        });
    }
    if let Some(sources) = hud.sources {
        lines.push(HudLine {
            label: "source",
            value: format!("{:?}/{:?}/{:?}", sources.x, sources.y, sources.scale),
        });
    }
    if let Some(signature) = hud.signature {
        lines.push(HudLine {
            label: "signature",
            value: signature.to_string(),
        });
    }
    lines
}
