//! Caller-supplied stripe configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calibration::{
    CalibrationDefaults, CalibrationFamily, CalibrationRecord, LoadSources, RecordOverrides,
    TargetSelector,
};
use crate::debug::DebugFlags;
use crate::hit_region::HitMode;
use crate::layout::{AnchoredScale, DEFAULT_MEGA_TILE_SIZE, LayoutParams, VirtualViewport};
use crate::outline::{FIRST_TILE_OUTLINE, OutlineSet, PathError, REST_TILE_OUTLINE};
use crate::pieces::{ChainConfig, PieceOverrides};
use crate::session::SessionConfig;
use crate::tuning::{QueryOverrides, TuningLayers};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse stripe config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compressFactor must be in (0, 1], got {0}")]
    InvalidCompressFactor(f64),
    #[error("megaTileSize must be a positive number, got {0}")]
    InvalidMegaTileSize(f64),
    #[error("anchored scale must be a positive number, got {0}")]
    InvalidAnchoredScale(f64),
    #[error("invalid outline path: {0}")]
    Outline(#[from] PathError),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationConfig {
    pub target: TargetSelector,
    /// Explicit values for the reference-image family.
    #[serde(rename = "ref")]
    pub reference: RecordOverrides,
    pub overlay: RecordOverrides,
    /// Extra per-artwork defaults, merged over the built-in ones.
    pub artwork_defaults: CalibrationDefaults,
}

impl CalibrationConfig {
    pub fn explicit(&self, family: CalibrationFamily) -> RecordOverrides {
        match family {
            CalibrationFamily::Reference => self.reference,
            CalibrationFamily::Overlay => self.overlay,
        }
    }

    pub fn defaults(&self) -> CalibrationDefaults {
        CalibrationDefaults::builtin().merged_with(&self.artwork_defaults)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StripeConfig {
    pub mega_tile_size: Option<f64>,
    pub compress_factor: Option<f64>,
    pub first_offset_px: Option<f64>,
    pub last_offset_px: Option<f64>,
    pub crop_first_right_px: Option<f64>,
    pub redistribute_between_first_and_last: bool,
    pub auto_align_last_to_right: bool,
    pub viewport_extend_left_px: f64,
    pub viewport_trim_right_px: f64,
    pub anchored: Option<AnchoredScale>,
    pub left_offset_overrides: BTreeMap<usize, f64>,
    pub hit_mode: HitMode,
    pub chain: ChainConfig,
    pub piece_overrides: PieceOverrides,
    pub calibration: CalibrationConfig,
    pub session: SessionConfig,
    pub debug: DebugFlags,
    pub allow_query_overrides: bool,
    pub first_outline: Option<String>,
    pub rest_outline: Option<String>,
}

impl StripeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(c) = self.compress_factor {
            if !(c.is_finite() && c > 0.0 && c <= 1.0) {
                return Err(ConfigError::InvalidCompressFactor(c));
            }
        }
        if let Some(m) = self.mega_tile_size {
            if !(m.is_finite() && m > 0.0) {
                return Err(ConfigError::InvalidMegaTileSize(m));
            }
        }
        if let Some(a) = self.anchored {
            if !(a.scale.is_finite() && a.scale > 0.0) {
                return Err(ConfigError::InvalidAnchoredScale(a.scale));
            }
        }
        self.outline_set()?;
        Ok(())
    }

    /// The query layer, or `None` when query overrides are not allowed.
    pub fn permitted_query<'a>(&self, query: &'a QueryOverrides) -> Option<&'a QueryOverrides> {
        self.allow_query_overrides.then_some(query)
    }

    /// Resolves layout parameters: explicit value, then query value, then
    /// the generic default.
    pub fn layout_params(&self, query: Option<&QueryOverrides>) -> LayoutParams {
        let generic = LayoutParams::default();
        let tunable = |explicit: Option<f64>, name: &str, fallback: f64| {
            TuningLayers {
                explicit,
                query: query.and_then(|q| q.get(name)),
                ..TuningLayers::default()
            }
            .resolve(fallback)
        };
        LayoutParams {
            mega_tile_size: tunable(self.mega_tile_size, "megaTileSize", DEFAULT_MEGA_TILE_SIZE),
            compress_factor: tunable(self.compress_factor, "compressFactor", generic.compress_factor),
            first_offset_px: tunable(self.first_offset_px, "firstOffsetPx", generic.first_offset_px),
            last_offset_px: tunable(self.last_offset_px, "lastOffsetPx", generic.last_offset_px),
            crop_first_right_px: tunable(
                self.crop_first_right_px,
                "cropFirstRightPx",
                generic.crop_first_right_px,
            ),
            redistribute_between_first_and_last: self.redistribute_between_first_and_last,
            auto_align_last_to_right: self.auto_align_last_to_right,
            viewport: VirtualViewport {
                extend_left_px: self.viewport_extend_left_px,
                trim_right_px: self.viewport_trim_right_px,
            },
            anchored: self.anchored,
            left_offset_overrides: self.left_offset_overrides.clone(),
        }
    }

    /// Explicit piece overrides, completed field by field from the query.
    pub fn piece_overrides(&self, query: Option<&QueryOverrides>) -> PieceOverrides {
        let mut merged = query.map(QueryOverrides::piece_overrides).unwrap_or_default();
        for (id, explicit) in &self.piece_overrides {
            let entry = merged.entry(id.clone()).or_default();
            *entry = explicit.or(*entry);
        }
        merged
    }

    pub fn outline_set(&self) -> Result<OutlineSet, PathError> {
        OutlineSet::from_data(
            self.first_outline.as_deref().unwrap_or(FIRST_TILE_OUTLINE),
            self.rest_outline.as_deref().unwrap_or(REST_TILE_OUTLINE),
        )
    }

    pub fn load_sources(
        &self,
        family: CalibrationFamily,
        query: Option<&QueryOverrides>,
        artwork: Option<CalibrationRecord>,
    ) -> LoadSources {
        let name = family.as_str();
        LoadSources {
            explicit: self.calibration.explicit(family),
            query: query.map(|q| RecordOverrides {
                x: q.calibration_value(name, "x"),
                y: q.calibration_value(name, "y"),
                scale: q.calibration_value(name, "scale"),
            }),
            artwork,
        }
    }
}
