//! Swatch Core Library
//!
//! Layout, hit-region and calibration engine for the color-swatch stripe.
//!
//! The engine is host-agnostic: a UI feeds it container sizes, items, key
//! presses and pointer positions, and renders what it derives:
//! - tile geometry along one overlapping horizontal track
//! - per-tile clickable regions (rotated pieces, silhouettes or whole tiles)
//! - persisted `{x, y, scale}` calibration keyed by a geometry signature

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod calibration;
pub mod config;
pub mod debug;
pub mod engine;
pub mod geometry;
pub mod hit_region;
pub mod layout;
pub mod observer;
pub mod outline;
pub mod pieces;
pub mod repository;
pub mod session;
pub mod signature;
pub mod tuning;
pub mod util;

pub use calibration::{
    CalibrationDefaults, CalibrationFamily, CalibrationKey, CalibrationRecord, CalibrationStore,
    TargetIdentity, TargetSelector,
};
pub use config::{ConfigError, StripeConfig};
pub use debug::{DebugFlags, DebugOverlay, GuideKind, OutlineKind};
pub use engine::{Attachment, Item, StripeEngine, TileView, attach};
pub use geometry::{Point, RotatedRect, Size, Vertex};
pub use hit_region::{HitMode, HitRegion, TileRegion};
pub use layout::{LayoutParams, TileGeometry, TrackLayout, compute_layout};
pub use observer::{SizeBroadcaster, SizeObserver, SizeTarget};
pub use repository::{
    CalibrationRepository, JsonRepository, MemoryStorage, RawStorage, RepositoryError,
    SharedMemoryStorage,
};
pub use session::{CalibrationMode, CalibrationSession, KeyPress, SessionCommand, SessionKey};
pub use signature::GeometrySignature;
pub use tuning::QueryOverrides;
