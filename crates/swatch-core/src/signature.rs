//! Geometry signature: a short deterministic digest of every layout input
//! that moves pixels, used to scope persisted calibration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutParams;
use crate::util::{finite_or_zero, safe_int};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeometrySignature(String);

impl GeometrySignature {
    /// Builds the signature from resolved layout parameters.
    ///
    /// `last_offset_px` is the offset the layout actually used, so an
    /// auto-aligned track changes signature when its measured width does.
    /// Non-finite inputs hash as zero.
    #[allow(clippy::float_cmp)]
    pub fn compute(params: &LayoutParams, last_offset_px: f64) -> Self {
        let mut sig = format!(
            "mt{}_cf{}_fo{}_lo{}_cr{}_rb{}",
            length(params.mega_tile_size),
            ratio(params.compress_factor),
            length(params.first_offset_px),
            length(last_offset_px),
            length(params.crop_first_right_px),
            u8::from(params.redistribute_between_first_and_last),
        );

        let vp = params.viewport;
        if finite_or_zero(vp.extend_left_px) != 0.0 || finite_or_zero(vp.trim_right_px) != 0.0 {
            sig.push_str(&format!(
                "_vl{}_vt{}",
                length(vp.extend_left_px),
                length(vp.trim_right_px)
            ));
        }
        if let Some(anchored) = params.anchored {
            sig.push_str(&format!(
                "_as{}_in{}_pv{}",
                ratio(anchored.scale),
                length(anchored.inset_right_px),
                ratio(anchored.pivot_y)
            ));
        }
        if !params.left_offset_overrides.is_empty() {
            let nudges: Vec<String> = params
                .left_offset_overrides
                .iter()
                .map(|(i, dx)| format!("{i}:{}", length(*dx)))
                .collect();
            sig.push_str(&format!("_lx{}", nudges.join(",")));
        }
        Self(sig)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whole pixel values print as integers, fractional ones in their shortest
/// exact form, so distinct inputs never share a rendering.
#[allow(clippy::float_cmp)]
fn length(value: f64) -> String {
    let value = finite_or_zero(value);
    if value.fract() == 0.0 {
        safe_int(value).to_string()
    } else {
        format!("{value}")
    }
}

/// Three decimals when that is exact, the shortest exact form otherwise.
#[allow(clippy::float_cmp)]
fn ratio(value: f64) -> String {
    let value = finite_or_zero(value);
    if (value * 1000.0).round() / 1000.0 == value {
        format!("{value:.3}")
    } else {
        format!("{value}")
    }
}

impl From<&str> for GeometrySignature {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for GeometrySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
