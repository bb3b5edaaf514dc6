//! Calibration records: manual `{x, y, scale}` adjustments persisted per
//! target and per geometry signature.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Size};
use crate::repository::CalibrationRepository;
use crate::signature::GeometrySignature;
use crate::tuning::{TuningLayers, TuningSource};
use crate::util::Memo;

pub const STORAGE_PREFIX: &str = "swatch-calibration/v1";
pub const SCALE_MIN: f64 = 0.1;
pub const SCALE_MAX: f64 = 5.0;

/// Ratios are re-applied only when they move a coordinate by more than this.
const POSITION_EPSILON: f64 = 1e-9;

/// The two independently calibrated overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CalibrationFamily {
    /// Reference image, kept pixel-fixed.
    #[serde(rename = "ref")]
    Reference,
    /// Decorative overlay, tracked as a fraction of the tile size.
    #[serde(rename = "overlay")]
    Overlay,
}

impl CalibrationFamily {
    pub const ALL: [Self; 2] = [Self::Reference, Self::Overlay];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "ref",
            Self::Overlay => "overlay",
        }
    }

    pub fn uses_ratios(self) -> bool {
        matches!(self, Self::Overlay)
    }
}

impl fmt::Display for CalibrationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a calibration applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetIdentity {
    Index(usize),
    Item(String),
    Group(String),
    All,
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "idx-{i}"),
            Self::Item(slug) => write!(f, "item-{slug}"),
            Self::Group(name) => write!(f, "group-{name}"),
            Self::All => f.write_str("all"),
        }
    }
}

impl TargetIdentity {
    /// Whether the tile at `index` showing `slug` (in `group`) is covered.
    pub fn matches(&self, index: usize, slug: &str, group: Option<&str>) -> bool {
        match self {
            Self::Index(i) => *i == index,
            Self::Item(s) => s == slug,
            Self::Group(g) => group == Some(g.as_str()),
            Self::All => true,
        }
    }
}

/// Explicit targeting supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetSelector {
    pub index: Option<usize>,
    pub item: Option<String>,
    pub group: Option<String>,
}

/// Index, then item, then group, then the current selection, then everything.
pub fn resolve_target(selector: &TargetSelector, selected: Option<&str>) -> TargetIdentity {
    if let Some(index) = selector.index {
        TargetIdentity::Index(index)
    } else if let Some(item) = &selector.item {
        TargetIdentity::Item(item.clone())
    } else if let Some(group) = &selector.group {
        TargetIdentity::Group(group.clone())
    } else if let Some(slug) = selected {
        TargetIdentity::Item(slug.to_owned())
    } else {
        TargetIdentity::All
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalibrationKey {
    pub family: CalibrationFamily,
    pub target: TargetIdentity,
    pub signature: GeometrySignature,
}

impl CalibrationKey {
    pub fn storage_key(&self) -> String {
        format!(
            "{STORAGE_PREFIX}:{}:{}:{}",
            self.family, self.target, self.signature
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ry: Option<f64>,
}

impl Default for CalibrationRecord {
    fn default() -> Self {
        Self::GENERIC
    }
}

impl CalibrationRecord {
    pub const GENERIC: Self = Self {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
        rx: None,
        ry: None,
    };

    pub const fn new(x: f64, y: f64, scale: f64) -> Self {
        Self {
            x,
            y,
            scale,
            rx: None,
            ry: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        let ratio_ok = |r: Option<f64>| r.is_none_or(f64::is_finite);
        self.x.is_finite()
            && self.y.is_finite()
            && self.scale.is_finite()
            && self.scale > 0.0
            && ratio_ok(self.rx)
            && ratio_ok(self.ry)
    }

    pub fn ratios(&self) -> Option<(f64, f64)> {
        Some((self.rx?, self.ry?))
    }

    pub fn offset(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Built-in per-artwork defaults, by family and artwork slug.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationDefaults(BTreeMap<CalibrationFamily, BTreeMap<String, CalibrationRecord>>);

impl CalibrationDefaults {
    pub fn builtin() -> Self {
        let mut defaults = Self::default();
        defaults.insert(
            CalibrationFamily::Overlay,
            "ncc-1701",
            CalibrationRecord::new(-46.0, 0.0, 1.315),
        );
        defaults
    }

    pub fn insert(&mut self, family: CalibrationFamily, artwork: &str, record: CalibrationRecord) {
        self.0
            .entry(family)
            .or_default()
            .insert(artwork.to_owned(), record);
    }

    /// Entries of `other` win over ours.
    #[must_use]
    pub fn merged_with(mut self, other: &Self) -> Self {
        for (family, entries) in &other.0 {
            for (artwork, record) in entries {
                self.insert(*family, artwork, *record);
            }
        }
        self
    }

    pub fn lookup(&self, family: CalibrationFamily, artwork: Option<&str>) -> Option<CalibrationRecord> {
        self.0.get(&family)?.get(artwork?).copied()
    }
}

/// Caller- or query-supplied values for individual record fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordOverrides {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub scale: Option<f64>,
}

impl RecordOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Layers consulted when a key is (re)loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadSources {
    pub explicit: RecordOverrides,
    /// `None` unless query overrides are allowed.
    pub query: Option<RecordOverrides>,
    pub artwork: Option<CalibrationRecord>,
}

/// Where each field of the active record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSources {
    pub x: TuningSource,
    pub y: TuningSource,
    pub scale: TuningSource,
}

impl Default for FieldSources {
    fn default() -> Self {
        Self {
            x: TuningSource::Generic,
            y: TuningSource::Generic,
            scale: TuningSource::Generic,
        }
    }
}

/// Live calibration for one family.
///
/// Holds the record for the current key, keeps ratio-tracked positions in
/// step with the measured tile size and writes edits through to a
/// repository. Persistence is best-effort: failures are logged and the
/// in-memory record stays authoritative.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    family: CalibrationFamily,
    key: Option<CalibrationKey>,
    record: CalibrationRecord,
    sources: FieldSources,
    tile_size: Option<Size>,
    /// Set once the key has a stored record or has been edited.
    persisted: bool,
    ratio_position: Memo<(Size, f64, f64), Point>,
}

impl CalibrationStore {
    pub fn new(family: CalibrationFamily) -> Self {
        Self {
            family,
            key: None,
            record: CalibrationRecord::GENERIC,
            sources: FieldSources::default(),
            tile_size: None,
            persisted: false,
            ratio_position: Memo::new(),
        }
    }

    pub fn family(&self) -> CalibrationFamily {
        self.family
    }

    pub fn key(&self) -> Option<&CalibrationKey> {
        self.key.as_ref()
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    pub fn sources(&self) -> FieldSources {
        self.sources
    }

    pub fn tile_size(&self) -> Option<Size> {
        self.tile_size
    }

    /// Loads the record for `key`. Does nothing when `key` is already
    /// loaded; returns whether a load happened.
    pub fn load(
        &mut self,
        key: CalibrationKey,
        repo: &impl CalibrationRepository,
        sources: &LoadSources,
    ) -> bool {
        if self.key.as_ref() == Some(&key) {
            return false;
        }
        let storage_key = key.storage_key();
        let stored = repo.get(&storage_key);
        let query = sources.query.unwrap_or_default();
        let artwork = sources.artwork;

        let layers = |explicit: Option<f64>, query: Option<f64>, pick: fn(&CalibrationRecord) -> f64| {
            TuningLayers {
                explicit,
                query,
                persisted: stored.as_ref().map(pick),
                artwork: artwork.as_ref().map(pick),
            }
        };
        let (x, x_src) = layers(sources.explicit.x, query.x, |r| r.x)
            .resolve_with_source(CalibrationRecord::GENERIC.x);
        let (y, y_src) = layers(sources.explicit.y, query.y, |r| r.y)
            .resolve_with_source(CalibrationRecord::GENERIC.y);
        let (scale, scale_src) = layers(sources.explicit.scale, query.scale, |r| r.scale)
            .resolve_with_source(CalibrationRecord::GENERIC.scale);

        // Stored ratios only describe a stored position.
        let keep_ratios = self.family.uses_ratios()
            && x_src == TuningSource::Persisted
            && y_src == TuningSource::Persisted;
        let (rx, ry) = match (keep_ratios, stored.and_then(|r| r.ratios())) {
            (true, Some((rx, ry))) => (Some(rx), Some(ry)),
            _ => (None, None),
        };

        self.record = CalibrationRecord {
            x,
            y,
            scale: scale.clamp(SCALE_MIN, SCALE_MAX),
            rx,
            ry,
        };
        self.sources = FieldSources {
            x: x_src,
            y: y_src,
            scale: scale_src,
        };
        self.persisted = stored.is_some();
        self.ratio_position.invalidate();
        tracing::debug!(
            key = %storage_key,
            stored = stored.is_some(),
            x, y, scale,
            "loaded calibration"
        );
        self.key = Some(key);

        if let Some(size) = self.tile_size {
            self.apply_tile_size(size);
        }
        true
    }

    /// Records a new measured tile size. Ratio-tracked records re-derive
    /// their position, or derive their ratios on first measurement.
    /// Unmeasurable sizes are skipped until the next notification.
    pub fn observe_tile_size(&mut self, size: Size, repo: &mut impl CalibrationRepository) {
        if !size.is_measurable() || self.tile_size == Some(size) {
            return;
        }
        self.tile_size = Some(size);
        if self.apply_tile_size(size) && self.persisted {
            self.persist(repo);
        }
    }

    /// Moves the record by `(dx, dy)` pixels and persists it.
    pub fn nudge(&mut self, dx: f64, dy: f64, repo: &mut impl CalibrationRepository) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.record.x += dx;
        self.record.y += dy;
        self.sources.x = TuningSource::Persisted;
        self.sources.y = TuningSource::Persisted;
        self.refresh_ratios();
        self.persist(repo);
    }

    /// Changes the scale by `delta`, clamped to `[SCALE_MIN, SCALE_MAX]`.
    pub fn adjust_scale(&mut self, delta: f64, repo: &mut impl CalibrationRepository) {
        if !delta.is_finite() {
            return;
        }
        let scale = (self.record.scale + delta).clamp(SCALE_MIN, SCALE_MAX);
        // Avoid drift from repeated binary float steps.
        self.record.scale = (scale * 1e6).round() / 1e6;
        self.sources.scale = TuningSource::Persisted;
        self.persist(repo);
    }

    /// Replaces the position and scale outright.
    pub fn set_record(&mut self, x: f64, y: f64, scale: f64, repo: &mut impl CalibrationRepository) {
        let candidate = CalibrationRecord::new(x, y, scale);
        if !candidate.is_valid() {
            tracing::warn!(family = %self.family, "rejecting invalid calibration values");
            return;
        }
        self.record = CalibrationRecord {
            scale: scale.clamp(SCALE_MIN, SCALE_MAX),
            ..candidate
        };
        self.sources = FieldSources {
            x: TuningSource::Persisted,
            y: TuningSource::Persisted,
            scale: TuningSource::Persisted,
        };
        self.refresh_ratios();
        self.persist(repo);
    }

    /// Writes the current record under the current key. Failures are
    /// logged and swallowed.
    pub fn persist(&mut self, repo: &mut impl CalibrationRepository) {
        let Some(key) = &self.key else {
            tracing::debug!(family = %self.family, "no calibration key yet; edit kept in memory");
            return;
        };
        self.persisted = true;
        let storage_key = key.storage_key();
        if let Err(e) = repo.put(&storage_key, &self.record) {
            tracing::warn!(key = %storage_key, error = %e, "calibration not persisted");
        }
    }

    /// Returns whether the record changed.
    fn apply_tile_size(&mut self, size: Size) -> bool {
        if !self.family.uses_ratios() {
            return false;
        }
        match self.record.ratios() {
            Some((rx, ry)) => {
                let p = *self
                    .ratio_position
                    .get_or_compute((size, rx, ry), |(s, rx, ry)| {
                        Point::new(rx * s.width, ry * s.height)
                    });
                let moved = (p.x - self.record.x).abs() > POSITION_EPSILON
                    || (p.y - self.record.y).abs() > POSITION_EPSILON;
                if moved {
                    tracing::debug!(family = %self.family, x = p.x, y = p.y, "re-derived calibration from ratios");
                    self.record.x = p.x;
                    self.record.y = p.y;
                }
                moved
            }
            None => {
                self.record.rx = Some(self.record.x / size.width);
                self.record.ry = Some(self.record.y / size.height);
                true
            }
        }
    }

    fn refresh_ratios(&mut self) {
        if !self.family.uses_ratios() {
            return;
        }
        match self.tile_size {
            Some(size) => {
                self.record.rx = Some(self.record.x / size.width);
                self.record.ry = Some(self.record.y / size.height);
            }
            None => {
                self.record.rx = None;
                self.record.ry = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{JsonRepository, MemoryStorage, RawStorage};

    const EPS: f64 = 1e-9;

    fn sig() -> GeometrySignature {
        GeometrySignature::from("mt160_cf0.790_fo-20_lo63_cr20_rb0")
    }

    fn key(family: CalibrationFamily, target: TargetIdentity) -> CalibrationKey {
        CalibrationKey {
            family,
            target,
            signature: sig(),
        }
    }

    fn repo() -> JsonRepository<MemoryStorage> {
        JsonRepository::new(MemoryStorage::new())
    }

    #[test]
    fn test_storage_key_format() {
        let k = key(CalibrationFamily::Overlay, TargetIdentity::Item("ncc-1701".into()));
        assert_eq!(
            k.storage_key(),
            "swatch-calibration/v1:overlay:item-ncc-1701:mt160_cf0.790_fo-20_lo63_cr20_rb0"
        );
        assert_eq!(TargetIdentity::Index(3).to_string(), "idx-3");
        assert_eq!(TargetIdentity::Group("tops".into()).to_string(), "group-tops");
        assert_eq!(TargetIdentity::All.to_string(), "all");
    }

    #[test]
    fn test_target_priority() {
        let mut selector = TargetSelector {
            index: Some(2),
            item: Some("a".into()),
            group: Some("g".into()),
        };
        assert_eq!(resolve_target(&selector, Some("sel")), TargetIdentity::Index(2));
        selector.index = None;
        assert_eq!(resolve_target(&selector, Some("sel")), TargetIdentity::Item("a".into()));
        selector.item = None;
        assert_eq!(resolve_target(&selector, Some("sel")), TargetIdentity::Group("g".into()));
        selector.group = None;
        assert_eq!(resolve_target(&selector, Some("sel")), TargetIdentity::Item("sel".into()));
        assert_eq!(resolve_target(&selector, None), TargetIdentity::All);
    }

    #[test]
    fn test_target_matches_tiles() {
        assert!(TargetIdentity::Index(2).matches(2, "a", None));
        assert!(!TargetIdentity::Index(2).matches(1, "a", None));
        assert!(TargetIdentity::Item("a".into()).matches(7, "a", None));
        assert!(TargetIdentity::Group("tops".into()).matches(0, "a", Some("tops")));
        assert!(!TargetIdentity::Group("tops".into()).matches(0, "a", None));
        assert!(TargetIdentity::All.matches(9, "z", None));
    }

    #[test]
    fn test_named_artwork_default() {
        let defaults = CalibrationDefaults::builtin();
        let sources = LoadSources {
            artwork: defaults.lookup(CalibrationFamily::Overlay, Some("ncc-1701")),
            ..LoadSources::default()
        };
        let mut store = CalibrationStore::new(CalibrationFamily::Overlay);
        let k = key(CalibrationFamily::Overlay, TargetIdentity::Item("ncc-1701".into()));
        assert!(store.load(k, &repo(), &sources));

        let r = store.record();
        assert_eq!((r.x, r.y, r.scale), (-46.0, 0.0, 1.315));
        assert_eq!(store.sources().x, TuningSource::Artwork);
        assert_eq!(defaults.lookup(CalibrationFamily::Reference, Some("ncc-1701")), None);
        assert_eq!(defaults.lookup(CalibrationFamily::Overlay, Some("other")), None);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let mut repo = repo();
        let k = key(CalibrationFamily::Reference, TargetIdentity::All);
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        store.load(k.clone(), &repo, &LoadSources::default());
        store.set_record(12.0, -7.0, 1.25, &mut repo);

        let mut fresh = CalibrationStore::new(CalibrationFamily::Reference);
        fresh.load(k, &repo, &LoadSources::default());
        assert_eq!(fresh.record(), store.record());
        assert_eq!(fresh.sources().scale, TuningSource::Persisted);
    }

    #[test]
    fn test_load_is_noop_for_same_key() {
        let repo = repo();
        let k = key(CalibrationFamily::Reference, TargetIdentity::All);
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        assert!(store.load(k.clone(), &repo, &LoadSources::default()));
        assert!(!store.load(k, &repo, &LoadSources::default()));
    }

    #[test]
    fn test_field_priority_on_load() {
        let mut repo = repo();
        let k = key(CalibrationFamily::Reference, TargetIdentity::All);
        repo.put(&k.storage_key(), &CalibrationRecord::new(5.0, 6.0, 2.0)).unwrap();

        let sources = LoadSources {
            explicit: RecordOverrides {
                x: Some(1.0),
                ..RecordOverrides::default()
            },
            query: Some(RecordOverrides {
                x: Some(9.0),
                y: Some(2.0),
                ..RecordOverrides::default()
            }),
            artwork: Some(CalibrationRecord::new(-1.0, -1.0, 0.5)),
        };
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        store.load(k, &repo, &sources);
        let r = store.record();
        assert_eq!((r.x, r.y, r.scale), (1.0, 2.0, 2.0));
        assert_eq!(
            store.sources(),
            FieldSources {
                x: TuningSource::Explicit,
                y: TuningSource::Query,
                scale: TuningSource::Persisted,
            }
        );
    }

    #[test]
    fn test_ratio_stability() {
        let mut repo = repo();
        let k = key(CalibrationFamily::Overlay, TargetIdentity::All);
        let mut store = CalibrationStore::new(CalibrationFamily::Overlay);
        store.load(k.clone(), &repo, &LoadSources::default());
        store.observe_tile_size(Size::new(200.0, 100.0), &mut repo);
        store.set_record(-50.0, 10.0, 1.0, &mut repo);
        assert_eq!(store.record().ratios(), Some((-0.25, 0.1)));

        store.observe_tile_size(Size::new(320.0, 160.0), &mut repo);
        let r = *store.record();
        assert!((r.x - (-0.25 * 320.0)).abs() < EPS);
        assert!((r.y - 0.1 * 160.0).abs() < EPS);

        // A second store loading the same key at another size tracks the ratios.
        let mut other = CalibrationStore::new(CalibrationFamily::Overlay);
        other.observe_tile_size(Size::new(100.0, 50.0), &mut repo);
        other.load(k, &repo, &LoadSources::default());
        assert!((other.record().x - (-25.0)).abs() < EPS);
        assert!((other.record().y - 5.0).abs() < EPS);
    }

    #[test]
    fn test_reference_family_stays_pixel_fixed() {
        let mut repo = repo();
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        store.load(key(CalibrationFamily::Reference, TargetIdentity::All), &repo, &LoadSources::default());
        store.observe_tile_size(Size::new(200.0, 100.0), &mut repo);
        store.set_record(-50.0, 10.0, 1.0, &mut repo);
        store.observe_tile_size(Size::new(400.0, 200.0), &mut repo);
        assert_eq!(store.record().x, -50.0);
        assert_eq!(store.record().ratios(), None);
    }

    #[test]
    fn test_unmeasured_tile_skips_derivation() {
        let mut repo = repo();
        let mut store = CalibrationStore::new(CalibrationFamily::Overlay);
        store.load(key(CalibrationFamily::Overlay, TargetIdentity::All), &repo, &LoadSources::default());
        store.nudge(10.0, 0.0, &mut repo);
        store.observe_tile_size(Size::new(0.0, 100.0), &mut repo);
        assert_eq!(store.record().ratios(), None);
        assert_eq!(store.tile_size(), None);

        store.observe_tile_size(Size::new(100.0, 100.0), &mut repo);
        assert_eq!(store.record().ratios(), Some((0.1, 0.0)));
    }

    #[test]
    fn test_defaults_are_not_written_until_edited() {
        let mut repo = repo();
        let mut store = CalibrationStore::new(CalibrationFamily::Overlay);
        store.load(key(CalibrationFamily::Overlay, TargetIdentity::All), &repo, &LoadSources::default());
        store.observe_tile_size(Size::new(100.0, 100.0), &mut repo);
        assert!(repo.storage().is_empty());

        store.adjust_scale(0.005, &mut repo);
        assert_eq!(repo.storage().len(), 1);
    }

    #[test]
    fn test_malformed_record_falls_back_to_defaults() {
        let k = key(CalibrationFamily::Overlay, TargetIdentity::Item("ncc-1701".into()));
        let mut storage = MemoryStorage::new();
        storage.set_item(&k.storage_key(), "{\"x\": ").unwrap();
        let repo = JsonRepository::new(storage);

        let sources = LoadSources {
            artwork: CalibrationDefaults::builtin().lookup(CalibrationFamily::Overlay, Some("ncc-1701")),
            ..LoadSources::default()
        };
        let mut store = CalibrationStore::new(CalibrationFamily::Overlay);
        store.load(k, &repo, &sources);
        assert_eq!(store.record().x, -46.0);
        assert_eq!(store.record().scale, 1.315);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut repo = JsonRepository::new(MemoryStorage::with_quota(4));
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        store.load(key(CalibrationFamily::Reference, TargetIdentity::All), &repo, &LoadSources::default());
        store.nudge(3.0, 4.0, &mut repo);
        assert_eq!(store.record().offset(), Point::new(3.0, 4.0));
        assert!(repo.storage().is_empty());
    }

    #[test]
    fn test_changed_signature_orphans_old_record() {
        let mut repo = repo();
        let old = key(CalibrationFamily::Reference, TargetIdentity::All);
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        store.load(old.clone(), &repo, &LoadSources::default());
        store.nudge(8.0, 0.0, &mut repo);

        let new = CalibrationKey {
            signature: GeometrySignature::from("mt160_cf0.800_fo-20_lo63_cr20_rb0"),
            ..old.clone()
        };
        store.load(new, &repo, &LoadSources::default());
        assert_eq!(*store.record(), CalibrationRecord::GENERIC);
        assert!(repo.get(&old.storage_key()).is_some());
    }

    #[test]
    fn test_scale_is_clamped() {
        let mut repo = repo();
        let mut store = CalibrationStore::new(CalibrationFamily::Reference);
        store.load(key(CalibrationFamily::Reference, TargetIdentity::All), &repo, &LoadSources::default());
        store.adjust_scale(10.0, &mut repo);
        assert_eq!(store.record().scale, SCALE_MAX);
        store.adjust_scale(-10.0, &mut repo);
        assert_eq!(store.record().scale, SCALE_MIN);
        store.adjust_scale(0.005, &mut repo);
        assert_eq!(store.record().scale, 0.105);
    }

    #[test]
    fn test_record_validation() {
        assert!(CalibrationRecord::GENERIC.is_valid());
        assert!(!CalibrationRecord::new(f64::NAN, 0.0, 1.0).is_valid());
        assert!(!CalibrationRecord::new(0.0, 0.0, -1.0).is_valid());
        let bad_ratio = CalibrationRecord {
            rx: Some(f64::INFINITY),
            ..CalibrationRecord::GENERIC
        };
        assert!(!bad_ratio.is_valid());
    }

    #[test]
    fn test_defaults_merge() {
        let mut extra = CalibrationDefaults::default();
        extra.insert(CalibrationFamily::Overlay, "ncc-1701", CalibrationRecord::new(1.0, 2.0, 3.0));
        extra.insert(CalibrationFamily::Reference, "nx-01", CalibrationRecord::new(4.0, 0.0, 1.0));
        let merged = CalibrationDefaults::builtin().merged_with(&extra);
        assert_eq!(
            merged.lookup(CalibrationFamily::Overlay, Some("ncc-1701")),
            Some(CalibrationRecord::new(1.0, 2.0, 3.0))
        );
        assert!(merged.lookup(CalibrationFamily::Reference, Some("nx-01")).is_some());
        assert_eq!(merged.lookup(CalibrationFamily::Overlay, None), None);
    }
}
