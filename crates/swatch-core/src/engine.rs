//! The stripe engine: inputs in, derived layout, regions and calibration out.
//!
//! Every input has a setter that is a no-op for unchanged values. Derived
//! values live in memo cells keyed by exactly the inputs they read, so a
//! recomputation only happens when one of those inputs actually moved.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::calibration::{
    CalibrationFamily, CalibrationKey, CalibrationStore, TargetIdentity, resolve_target,
};
use crate::config::StripeConfig;
use crate::debug::{DebugOverlay, HudState, build_overlay};
use crate::geometry::{Point, Size};
use crate::hit_region::{HitMode, ResolveContext, TileRegion, hit_test, resolve_regions};
use crate::layout::{LayoutParams, TrackLayout, compute_layout};
use crate::observer::{SizeObserver, SizeTarget, SubscriptionId};
use crate::outline::OutlineSet;
use crate::pieces::{ChainConfig, PieceOverrides};
use crate::repository::CalibrationRepository;
use crate::session::{CalibrationMode, CalibrationSession, KeyPress, SessionCommand};
use crate::signature::GeometrySignature;
use crate::tuning::QueryOverrides;
use crate::util::Memo;

/// One selectable entry in the stripe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub slug: String,
    #[serde(default)]
    pub group: Option<String>,
}

impl Item {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            group: None,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Render-ready view of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileView<'a> {
    pub index: usize,
    pub item: &'a Item,
    pub left_px: f64,
    pub width_px: f64,
    pub height_px: f64,
    pub z_order: usize,
    pub clip_right_px: f64,
    pub selected: bool,
}

pub type SelectionCallback = Box<dyn FnMut(&Item)>;

type LayoutKey = (Option<f64>, usize, LayoutParams);
type RegionKey = (TrackLayout, HitMode, ChainConfig, PieceOverrides, Option<OutlineSet>);

pub struct StripeEngine<R> {
    repo: R,
    config: StripeConfig,
    outlines: Option<OutlineSet>,
    query: QueryOverrides,
    container: Option<Size>,
    items: Vec<Item>,
    selected: Option<String>,
    session: CalibrationSession,
    reference: CalibrationStore,
    overlay: CalibrationStore,
    piece_overrides: PieceOverrides,
    params: LayoutParams,
    layout: Memo<LayoutKey, Option<TrackLayout>>,
    regions: Memo<RegionKey, Vec<TileRegion>>,
    signature: Option<GeometrySignature>,
    on_select: Option<SelectionCallback>,
}

impl<R> std::fmt::Debug for StripeEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeEngine")
            .field("items", &self.items.len())
            .field("container", &self.container)
            .field("selected", &self.selected)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl<R: CalibrationRepository> StripeEngine<R> {
    pub fn new(config: StripeConfig, repo: R) -> Self {
        let mut engine = Self {
            repo,
            outlines: load_outlines(&config),
            session: CalibrationSession::new(config.session),
            config,
            query: QueryOverrides::default(),
            container: None,
            items: Vec::new(),
            selected: None,
            reference: CalibrationStore::new(CalibrationFamily::Reference),
            overlay: CalibrationStore::new(CalibrationFamily::Overlay),
            piece_overrides: PieceOverrides::new(),
            params: LayoutParams::default(),
            layout: Memo::new(),
            regions: Memo::new(),
            signature: None,
            on_select: None,
        };
        engine.refresh();
        engine
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    pub fn set_config(&mut self, config: StripeConfig) {
        if config == self.config {
            return;
        }
        self.outlines = load_outlines(&config);
        self.session.set_config(config.session);
        self.config = config;
        self.refresh();
    }

    /// Replaces the query layer from a `location.search` string.
    pub fn set_query(&mut self, search: &str) {
        let query = QueryOverrides::parse(search);
        if query == self.query {
            return;
        }
        self.query = query;
        self.refresh();
    }

    pub fn set_container_size(&mut self, size: Size) {
        if self.container == Some(size) {
            return;
        }
        self.container = Some(size);
        self.refresh();
    }

    /// Forwards a measured tile size to the calibration stores.
    pub fn set_tile_size(&mut self, size: Size) {
        self.reference.observe_tile_size(size, &mut self.repo);
        self.overlay.observe_tile_size(size, &mut self.repo);
    }

    pub fn set_items(&mut self, items: Vec<Item>) {
        if items == self.items {
            return;
        }
        self.items = items;
        self.refresh();
    }

    pub fn set_selected(&mut self, slug: Option<&str>) {
        if self.selected.as_deref() == slug {
            return;
        }
        self.selected = slug.map(str::to_owned);
        self.refresh();
    }

    pub fn on_select(&mut self, callback: impl FnMut(&Item) + 'static) {
        self.on_select = Some(Box::new(callback));
    }

    // ------------------------------------------------------------------
    // Calibration session
    // ------------------------------------------------------------------

    pub fn start_session(&mut self) {
        self.session.start();
    }

    pub fn stop_session(&mut self) {
        self.session.stop();
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    /// Routes a key press through the session and applies the result.
    pub fn handle_key(&mut self, press: KeyPress) -> Option<SessionCommand> {
        let command = self.session.handle_key(press)?;
        let repo = &mut self.repo;
        match command {
            SessionCommand::Nudge { family, dx, dy } => match family {
                CalibrationFamily::Reference => self.reference.nudge(dx, dy, repo),
                CalibrationFamily::Overlay => self.overlay.nudge(dx, dy, repo),
            },
            SessionCommand::Scale { family, delta } => match family {
                CalibrationFamily::Reference => self.reference.adjust_scale(delta, repo),
                CalibrationFamily::Overlay => self.overlay.adjust_scale(delta, repo),
            },
            SessionCommand::ModeChanged(_) => {}
        }
        Some(command)
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// `None` until the container is measured and there is at least one item.
    pub fn layout(&self) -> Option<&TrackLayout> {
        self.layout.value().and_then(Option::as_ref)
    }

    pub fn regions(&self) -> &[TileRegion] {
        if self.layout().is_none() {
            return &[];
        }
        self.regions.value().map_or(&[], Vec::as_slice)
    }

    pub fn signature(&self) -> Option<&GeometrySignature> {
        self.signature.as_ref()
    }

    pub fn calibration(&self, family: CalibrationFamily) -> &CalibrationStore {
        match family {
            CalibrationFamily::Reference => &self.reference,
            CalibrationFamily::Overlay => &self.overlay,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// How many times the layout was actually recomputed.
    pub fn layout_computations(&self) -> u64 {
        self.layout.computations()
    }

    pub fn tiles(&self) -> Vec<TileView<'_>> {
        let Some(layout) = self.layout() else {
            return Vec::new();
        };
        layout
            .tiles
            .iter()
            .zip(&self.items)
            .map(|(tile, item)| TileView {
                index: tile.index,
                item,
                left_px: tile.left_px,
                width_px: tile.width_px,
                height_px: tile.height_px,
                z_order: tile.z_order,
                clip_right_px: tile.clip_right_px,
                selected: self.selected.as_deref() == Some(item.slug.as_str()),
            })
            .collect()
    }

    /// Dispatches a pointer interaction at `point` (container coordinates).
    /// Invokes the selection callback and returns the hit index.
    pub fn click(&mut self, point: Point) -> Option<usize> {
        let layout = self.layout.value().and_then(Option::as_ref)?;
        let index = hit_test(layout, self.regions.value().map_or(&[], Vec::as_slice), point)?;
        let item = self.items.get(index)?;
        tracing::debug!(index, slug = %item.slug, "tile selected");
        if let Some(callback) = self.on_select.as_mut() {
            callback(item);
        }
        Some(index)
    }

    pub fn debug_overlay(&self) -> Option<DebugOverlay> {
        let flags = self.config.debug;
        if !flags.any() {
            return None;
        }
        let layout = self.layout()?;
        let mode = self.session.is_active().then(|| self.session.mode());
        let store = self.calibration(mode.unwrap_or_default().family());
        let hud = HudState {
            mode,
            record: Some(store.record()),
            sources: Some(store.sources()),
            signature: self.signature.as_ref(),
        };
        Some(build_overlay(flags, layout, self.regions(), &hud))
    }

    /// Active mode, if a session is running.
    pub fn active_mode(&self) -> Option<CalibrationMode> {
        self.session.is_active().then(|| self.session.mode())
    }

    // ------------------------------------------------------------------
    // Dataflow
    // ------------------------------------------------------------------

    fn refresh(&mut self) {
        let query = self.config.permitted_query(&self.query);
        self.params = self.config.layout_params(query);
        self.piece_overrides = self.config.piece_overrides(query);

        let width = self.container.map(|s| s.width);
        let key = (width, self.items.len(), self.params.clone());
        let layout = self
            .layout
            .get_or_compute(key, |(w, n, p)| compute_layout(*w, *n, p));

        match layout {
            Some(layout) => {
                let key = (
                    layout.clone(),
                    self.config.hit_mode,
                    self.config.chain.clone(),
                    self.piece_overrides.clone(),
                    self.outlines.clone(),
                );
                self.regions.get_or_compute(key, |(layout, mode, chain, overrides, outlines)| {
                    resolve_regions(&ResolveContext {
                        layout,
                        mode: *mode,
                        chain,
                        overrides,
                        outlines: outlines.as_ref(),
                    })
                });
                self.signature = Some(GeometrySignature::compute(
                    &self.params,
                    layout.metrics.last_offset_px,
                ));
            }
            None => {
                self.regions.invalidate();
                // Without a measurement the derived last offset is unknown.
                let derived = self.params.auto_align_last_to_right || self.params.anchored.is_some();
                self.signature = (!derived)
                    .then(|| GeometrySignature::compute(&self.params, self.params.last_offset_px));
            }
        }

        self.load_calibration();
    }

    fn load_calibration(&mut self) {
        let Some(signature) = self.signature.clone() else {
            return;
        };
        let target = resolve_target(&self.config.calibration.target, self.selected.as_deref());
        let artwork = self.artwork_slug(&target).map(str::to_owned);
        let defaults = self.config.calibration.defaults();
        let query = self.config.permitted_query(&self.query);

        for family in CalibrationFamily::ALL {
            let sources = self.config.load_sources(
                family,
                query,
                defaults.lookup(family, artwork.as_deref()),
            );
            let key = CalibrationKey {
                family,
                target: target.clone(),
                signature: signature.clone(),
            };
            let store = match family {
                CalibrationFamily::Reference => &mut self.reference,
                CalibrationFamily::Overlay => &mut self.overlay,
            };
            store.load(key, &self.repo, &sources);
        }
    }

    /// Artwork identity used to look up built-in defaults for `target`.
    fn artwork_slug<'a>(&'a self, target: &'a TargetIdentity) -> Option<&'a str> {
        match target {
            TargetIdentity::Index(i) => self.items.get(*i).map(|item| item.slug.as_str()),
            TargetIdentity::Item(slug) => Some(slug.as_str()),
            TargetIdentity::Group(group) => Some(group.as_str()),
            TargetIdentity::All => None,
        }
    }
}

/// `None` leaves outline-mode tiles with whole-tile regions.
fn load_outlines(config: &StripeConfig) -> Option<OutlineSet> {
    config
        .outline_set()
        .or_else(|e| {
            tracing::warn!(error = %e, "invalid outline path; using built-in outlines");
            OutlineSet::builtin()
        })
        .map_err(|e| tracing::warn!(error = %e, "built-in outlines failed to parse"))
        .ok()
}

/// Subscriptions held on behalf of an engine.
#[derive(Debug)]
pub struct Attachment {
    ids: Vec<SubscriptionId>,
}

impl Attachment {
    pub fn detach<O: SizeObserver>(self, observer: &O) {
        for id in self.ids {
            observer.unsubscribe(id);
        }
    }
}

/// Feeds container and tile sizes from `observer` into `engine`.
///
/// Callbacks hold a weak handle, so a dropped engine simply stops
/// receiving updates.
pub fn attach<R, O>(engine: &Rc<RefCell<StripeEngine<R>>>, observer: &O) -> Attachment
where
    R: CalibrationRepository + 'static,
    O: SizeObserver<Handle = SizeTarget>,
{
    let subscribe = |target: SizeTarget| {
        let weak = Rc::downgrade(engine);
        observer.subscribe(
            &target,
            Box::new(move |size: Size| {
                let Some(engine) = weak.upgrade() else {
                    return;
                };
                let Ok(mut engine) = engine.try_borrow_mut() else {
                    tracing::warn!(?target, "engine busy; size notification dropped");
                    return;
                };
                match target {
                    SizeTarget::Container => engine.set_container_size(size),
                    SizeTarget::Tile => engine.set_tile_size(size),
                }
            }),
        )
    };
    Attachment {
        ids: vec![subscribe(SizeTarget::Container), subscribe(SizeTarget::Tile)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationRecord;
    use crate::debug::DebugFlags;
    use crate::observer::SizeBroadcaster;
    use crate::repository::{JsonRepository, MemoryStorage};
    use crate::session::SessionKey;

    type Engine = StripeEngine<JsonRepository<MemoryStorage>>;

    fn golden_config() -> StripeConfig {
        StripeConfig {
            mega_tile_size: Some(160.0),
            compress_factor: Some(0.79),
            first_offset_px: Some(-20.0),
            last_offset_px: Some(63.0),
            crop_first_right_px: Some(20.0),
            ..StripeConfig::default()
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::new(format!("color-{i}"))).collect()
    }

    fn engine() -> Engine {
        let mut engine = StripeEngine::new(golden_config(), JsonRepository::new(MemoryStorage::new()));
        engine.set_items(items(14));
        engine.set_container_size(Size::new(1600.0, 200.0));
        engine
    }

    #[test]
    fn test_unmeasured_renders_nothing() {
        let mut engine = StripeEngine::new(golden_config(), JsonRepository::new(MemoryStorage::new()));
        engine.set_items(items(3));
        assert!(engine.layout().is_none());
        assert!(engine.tiles().is_empty());
        assert!(engine.regions().is_empty());
        assert_eq!(engine.click(Point::new(10.0, 10.0)), None);
        // Signature is still known without auto-align.
        assert_eq!(
            engine.signature().unwrap().as_str(),
            "mt160_cf0.790_fo-20_lo63_cr20_rb0"
        );
    }

    #[test]
    fn test_setters_are_idempotent() {
        let mut engine = engine();
        let before = engine.layout_computations();
        engine.set_container_size(Size::new(1600.0, 200.0));
        engine.set_items(items(14));
        engine.set_config(golden_config());
        engine.set_query("");
        assert_eq!(engine.layout_computations(), before);

        engine.set_container_size(Size::new(1500.0, 200.0));
        assert_eq!(engine.layout_computations(), before + 1);
    }

    #[test]
    fn test_golden_tiles_and_signature() {
        let engine = engine();
        let tiles = engine.tiles();
        assert_eq!(tiles.len(), 14);
        assert_eq!(tiles[0].left_px, -20.0);
        assert_eq!(tiles[13].left_px, 1278.0);
        assert_eq!(tiles[0].clip_right_px, 20.0);
        assert_eq!(
            engine.signature().unwrap().as_str(),
            "mt160_cf0.790_fo-20_lo63_cr20_rb0"
        );
    }

    #[test]
    fn test_click_invokes_callback() {
        let mut engine = engine();
        let picked = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&picked);
        engine.on_select(move |item| *sink.borrow_mut() = Some(item.slug.clone()));

        assert_eq!(engine.click(Point::new(60.0, 100.0)), Some(0));
        assert_eq!(picked.borrow().as_deref(), Some("color-0"));

        assert_eq!(engine.click(Point::new(60.0, 500.0)), None);
        assert_eq!(picked.borrow().as_deref(), Some("color-0"));
    }

    #[test]
    fn test_named_artwork_default_for_selection() {
        let mut engine = engine();
        let mut list = items(13);
        list.push(Item::new("ncc-1701"));
        engine.set_items(list);
        engine.set_selected(Some("ncc-1701"));

        let overlay = engine.calibration(CalibrationFamily::Overlay);
        let key = overlay.key().unwrap();
        assert_eq!(
            key.storage_key(),
            "swatch-calibration/v1:overlay:item-ncc-1701:mt160_cf0.790_fo-20_lo63_cr20_rb0"
        );
        let r = overlay.record();
        assert_eq!((r.x, r.y, r.scale), (-46.0, 0.0, 1.315));
        // The reference family has no artwork default.
        assert_eq!(
            *engine.calibration(CalibrationFamily::Reference).record(),
            CalibrationRecord::GENERIC
        );
    }

    #[test]
    fn test_keys_edit_active_family_and_persist() {
        let mut engine = engine();
        engine.handle_key(KeyPress::new(SessionKey::Left));
        assert_eq!(engine.calibration(CalibrationFamily::Reference).record().x, 0.0);

        engine.start_session();
        engine.handle_key(KeyPress::new(SessionKey::Left));
        engine.handle_key(KeyPress {
            large_step: true,
            ..KeyPress::new(SessionKey::Down)
        });
        let r = *engine.calibration(CalibrationFamily::Reference).record();
        assert_eq!((r.x, r.y), (-1.0, 10.0));

        engine.handle_key(KeyPress::new(SessionKey::SelectOverlay));
        engine.handle_key(KeyPress::new(SessionKey::Plus));
        assert_eq!(engine.calibration(CalibrationFamily::Overlay).record().scale, 1.005);
        assert_eq!(engine.active_mode(), Some(CalibrationMode::Overlay));

        assert_eq!(engine.repository().storage().len(), 2);
    }

    #[test]
    fn test_signature_change_reloads_calibration() {
        let mut engine = engine();
        engine.start_session();
        engine.handle_key(KeyPress::new(SessionKey::Right));
        assert_eq!(engine.calibration(CalibrationFamily::Reference).record().x, 1.0);

        engine.set_config(StripeConfig {
            compress_factor: Some(0.8),
            ..golden_config()
        });
        assert_eq!(engine.calibration(CalibrationFamily::Reference).record().x, 0.0);

        engine.set_config(golden_config());
        assert_eq!(engine.calibration(CalibrationFamily::Reference).record().x, 1.0);
    }

    #[test]
    fn test_query_overrides_need_permission() {
        let mut engine = engine();
        engine.set_query("?compressFactor=0.5&ref.x=7");
        assert_eq!(engine.params().compress_factor, 0.79);
        assert_eq!(engine.calibration(CalibrationFamily::Reference).record().x, 0.0);

        let config = StripeConfig {
            compress_factor: None,
            allow_query_overrides: true,
            ..golden_config()
        };
        engine.set_config(config);
        assert_eq!(engine.params().compress_factor, 0.5);
        assert_eq!(engine.calibration(CalibrationFamily::Reference).record().x, 7.0);
    }

    #[test]
    fn test_observer_attachment() {
        let broadcaster = SizeBroadcaster::new();
        let engine = Rc::new(RefCell::new(StripeEngine::new(
            golden_config(),
            JsonRepository::new(MemoryStorage::new()),
        )));
        engine.borrow_mut().set_items(items(5));
        let attachment = attach(&engine, &broadcaster);

        broadcaster.notify(SizeTarget::Container, Size::new(900.0, 200.0));
        assert!(engine.borrow().layout().is_some());
        let computations = engine.borrow().layout_computations();
        broadcaster.notify(SizeTarget::Container, Size::new(900.0, 200.0));
        assert_eq!(engine.borrow().layout_computations(), computations);

        broadcaster.notify(SizeTarget::Tile, Size::new(178.0, 160.0));
        assert_eq!(
            engine.borrow().calibration(CalibrationFamily::Overlay).tile_size(),
            Some(Size::new(178.0, 160.0))
        );

        attachment.detach(&broadcaster);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_engine_ignores_notifications() {
        let broadcaster = SizeBroadcaster::new();
        let engine = Rc::new(RefCell::new(StripeEngine::new(
            golden_config(),
            JsonRepository::new(MemoryStorage::new()),
        )));
        let _attachment = attach(&engine, &broadcaster);
        drop(engine);
        broadcaster.notify(SizeTarget::Container, Size::new(900.0, 200.0));
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[test]
    fn test_debug_overlay_follows_flags() {
        let mut engine = engine();
        assert!(engine.debug_overlay().is_none());
        engine.set_config(StripeConfig {
            debug: DebugFlags {
                hud: true,
                guides: true,
                outlines: false,
            },
            ..golden_config()
        });
        let overlay = engine.debug_overlay().unwrap();
        assert!(overlay.outlines.is_empty());
        assert!(!overlay.guides.is_empty());
        assert!(overlay.hud.iter().any(|l| l.label == "signature"));
    }

    #[test]
    fn test_selected_flag_in_views() {
        let mut engine = engine();
        engine.set_selected(Some("color-3"));
        let selected: Vec<usize> = engine
            .tiles()
            .iter()
            .filter(|t| t.selected)
            .map(|t| t.index)
            .collect();
        assert_eq!(selected, vec![3]);
    }
}
