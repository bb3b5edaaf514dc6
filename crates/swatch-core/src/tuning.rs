//! Layered resolution of tunable numbers and the query-string layer.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::pieces::{PieceOverride, PieceOverrides};

/// Where a resolved value came from, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TuningSource {
    Explicit,
    Query,
    Persisted,
    Artwork,
    Generic,
}

/// Candidate values for one tunable, one per layer. Non-finite values are
/// skipped as if unset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TuningLayers {
    pub explicit: Option<f64>,
    pub query: Option<f64>,
    pub persisted: Option<f64>,
    pub artwork: Option<f64>,
}

impl TuningLayers {
    pub fn resolve(&self, generic: f64) -> f64 {
        self.resolve_with_source(generic).0
    }

    pub fn resolve_with_source(&self, generic: f64) -> (f64, TuningSource) {
        [
            (self.explicit, TuningSource::Explicit),
            (self.query, TuningSource::Query),
            (self.persisted, TuningSource::Persisted),
            (self.artwork, TuningSource::Artwork),
        ]
        .into_iter()
        .find_map(|(value, source)| value.filter(|v| v.is_finite()).map(|v| (v, source)))
        .unwrap_or((generic, TuningSource::Generic))
    }
}

/// Numeric overrides recovered from the address bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOverrides {
    values: BTreeMap<String, f64>,
}

impl QueryOverrides {
    pub const PIECE_PREFIX: &'static str = "piece.";

    /// Parses `?a=1&b=2`-style search strings. Entries whose value is not a
    /// finite number are dropped.
    pub fn parse(search: &str) -> Self {
        let values = search
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = decode(key)?;
                let value = decode(value)?.trim().parse::<f64>().ok()?;
                value.is_finite().then_some((key, value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `{family}.x`, `{family}.y` or `{family}.scale`.
    pub fn calibration_value(&self, family: &str, field: &str) -> Option<f64> {
        self.get(&format!("{family}.{field}"))
    }

    /// Collects every `piece.{id}.{field}` entry.
    pub fn piece_overrides(&self) -> PieceOverrides {
        let mut out = PieceOverrides::new();
        for (key, value) in &self.values {
            let Some(rest) = key.strip_prefix(Self::PIECE_PREFIX) else {
                continue;
            };
            let Some((id, field)) = rest.rsplit_once('.') else {
                continue;
            };
            let entry: &mut PieceOverride = out.entry(id.to_owned()).or_default();
            let slot = match field {
                "x" => &mut entry.x,
                "y" => &mut entry.y,
                "rotation" => &mut entry.rotation,
                "width" => &mut entry.width,
                "height" => &mut entry.height,
                _ => continue,
            };
            *slot = Some(*value);
        }
        out.retain(|_, o| !o.is_empty());
        out
    }
}

fn decode(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let layers = TuningLayers {
            explicit: None,
            query: Some(2.0),
            persisted: Some(3.0),
            artwork: Some(4.0),
        };
        assert_eq!(layers.resolve_with_source(5.0), (2.0, TuningSource::Query));

        let layers = TuningLayers {
            explicit: Some(1.0),
            ..layers
        };
        assert_eq!(layers.resolve_with_source(5.0), (1.0, TuningSource::Explicit));

        let empty = TuningLayers::default();
        assert_eq!(empty.resolve_with_source(5.0), (5.0, TuningSource::Generic));

        let artwork_only = TuningLayers {
            artwork: Some(-46.0),
            ..TuningLayers::default()
        };
        assert_eq!(artwork_only.resolve(0.0), -46.0);
    }

    #[test]
    fn test_non_finite_layers_are_skipped() {
        let layers = TuningLayers {
            explicit: Some(f64::NAN),
            query: Some(f64::INFINITY),
            persisted: Some(7.0),
            artwork: None,
        };
        assert_eq!(layers.resolve_with_source(0.0), (7.0, TuningSource::Persisted));
    }

    #[test]
    fn test_parse_query_string() {
        let q = QueryOverrides::parse("?compressFactor=0.8&ref.x=-12&overlay%2Escale=1.2&junk&bad=abc&nan=NaN");
        assert_eq!(q.get("compressFactor"), Some(0.8));
        assert_eq!(q.calibration_value("ref", "x"), Some(-12.0));
        assert_eq!(q.calibration_value("overlay", "scale"), Some(1.2));
        assert_eq!(q.get("bad"), None);
        assert_eq!(q.get("nan"), None);
        assert_eq!(q.len(), 3);
        assert!(QueryOverrides::parse("").is_empty());
    }

    #[test]
    fn test_piece_overrides_from_query() {
        let q = QueryOverrides::parse("piece.first.5.rotation=22&piece.mid.3.x=4&piece.mid.3.color=1&piece.bare=3");
        let overrides = q.piece_overrides();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides["first.5"].rotation, Some(22.0));
        assert_eq!(overrides["mid.3"].x, Some(4.0));
        assert_eq!(overrides["mid.3"].y, None);
    }
}
