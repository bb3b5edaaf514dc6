//! The stripe component: hosts a [`StripeEngine`] and renders what it derives.

use std::cell::Cell;
use std::rc::Rc;

use swatch_core::debug::{DebugOverlay, GuideKind, OutlineKind};
use swatch_core::{
    CalibrationFamily, Item, JsonRepository, KeyPress, Point, Size, SizeBroadcaster, SizeObserver,
    SizeTarget, StripeConfig, StripeEngine, TileView, TrackLayout, attach,
};
use web_sys::MouseEvent;
use yew::prelude::*;

use crate::components::DebugHud;
use crate::hooks::{use_calibration_keys, use_element_size, use_query_search};
use crate::storage::SessionStorage;

type Engine = StripeEngine<JsonRepository<SessionStorage>>;

#[derive(Properties, PartialEq)]
pub struct SwatchStripeProps {
    pub items: Vec<Item>,
    #[prop_or_default]
    pub selected: Option<String>,
    #[prop_or_default]
    pub config: StripeConfig,
    /// Runs a keyboard calibration session while true.
    #[prop_or_default]
    pub calibrate: bool,
    pub on_select: Callback<Item>,
}

// ============================================================================
// Styles
// ============================================================================

fn track_style(layout: &TrackLayout) -> String {
    let mut style = format!("width: {}px;", layout.effective_width);
    match layout.transform {
        Some(t) => style.push_str(&format!(
            " transform: translateX({}px) scale({}); transform-origin: {}px {}px;",
            layout.viewport_left, t.scale, t.anchor.x, t.anchor.y
        )),
        None => style.push_str(&format!(" transform: translateX({}px);", layout.viewport_left)),
    }
    style
}

fn tile_style(tile: &TileView<'_>) -> String {
    let mut style = format!(
        "left: {}px; width: {}px; height: {}px; z-index: {};",
        tile.left_px, tile.width_px, tile.height_px, tile.z_order
    );
    if tile.clip_right_px > 0.0 {
        style.push_str(&format!(" clip-path: inset(0 {}px 0 0);", tile.clip_right_px));
    }
    style
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn outline_class(kind: OutlineKind) -> &'static str {
    match kind {
        OutlineKind::TileBounds => "debug-bounds",
        OutlineKind::Piece => "debug-piece",
        OutlineKind::Silhouette => "debug-silhouette",
    }
}

fn guide_class(kind: GuideKind) -> &'static str {
    match kind {
        GuideKind::TileLeft => "guide-left",
        GuideKind::OverlapBoundary => "guide-overlap",
        GuideKind::Anchor => "guide-anchor",
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render_calibration_layers(engine: &Engine, tile: &TileView<'_>) -> Html {
    let layers = CalibrationFamily::ALL.into_iter().filter_map(|family| {
        let store = engine.calibration(family);
        let key = store.key()?;
        let item = tile.item;
        if !key.target.matches(tile.index, &item.slug, item.group.as_deref()) {
            return None;
        }
        let record = store.record();
        let style = format!(
            "transform: translate({}px, {}px) scale({});",
            record.x, record.y, record.scale
        );
        Some(html! {
            <div
                class={classes!("swatch-layer", format!("swatch-layer-{family}"))}
                data-slug={item.slug.clone()}
                {style}
            />
        })
    });
    html! { <>{ for layers }</> }
}

fn render_debug(overlay: &DebugOverlay) -> Html {
    html! {
        <>
            <svg class="swatch-debug" style="position: absolute; inset: 0; pointer-events: none; overflow: visible;">
                { for overlay.outlines.iter().map(|o| html! {
                    <polygon
                        class={outline_class(o.kind)}
                        data-tile={o.tile.to_string()}
                        points={points_attr(&o.points)}
                        fill="none"
                    />
                }) }
                { for overlay.guides.iter().map(|g| html! {
                    <line
                        class={guide_class(g.kind)}
                        x1={g.from.x.to_string()}
                        y1={g.from.y.to_string()}
                        x2={g.to.x.to_string()}
                        y2={g.to.y.to_string()}
                    />
                }) }
            </svg>
            <DebugHud lines={overlay.hud.clone()} />
        </>
    }
}

// ============================================================================
// Component
// ============================================================================

#[function_component(SwatchStripe)]
pub fn swatch_stripe(props: &SwatchStripeProps) -> Html {
    let container_ref = use_node_ref();
    let tile_ref = use_node_ref();
    let update = use_force_update();
    let search = use_query_search();

    // Selection made inside `engine.click`; emitted once the engine borrow ends.
    let pending = use_mut_ref(|| None::<Item>);
    let engine = {
        let pending = Rc::clone(&pending);
        let config = props.config.clone();
        use_mut_ref(move || {
            let mut engine = StripeEngine::new(config, JsonRepository::new(SessionStorage));
            engine.on_select(move |item| *pending.borrow_mut() = Some(item.clone()));
            engine
        })
    };
    let broadcaster = use_memo((), |_| SizeBroadcaster::new());

    {
        let engine = Rc::clone(&engine);
        let broadcaster = Rc::clone(&broadcaster);
        let update = update.clone();
        use_effect_with((), move |_| {
            let attachment = attach(&engine, &*broadcaster);

            // Re-render only when a measurement actually changed.
            let last = Rc::new(Cell::new([None::<Size>; 2]));
            let watch = |target: SizeTarget, slot: usize| {
                let last = Rc::clone(&last);
                let update = update.clone();
                broadcaster.subscribe(
                    &target,
                    Box::new(move |size: Size| {
                        let mut seen = last.get();
                        if seen[slot] != Some(size) {
                            seen[slot] = Some(size);
                            last.set(seen);
                            update.force_update();
                        }
                    }),
                )
            };
            let watchers = [watch(SizeTarget::Container, 0), watch(SizeTarget::Tile, 1)];

            move || {
                for id in watchers {
                    broadcaster.unsubscribe(id);
                }
                attachment.detach(&*broadcaster);
            }
        });
    }

    use_element_size(container_ref.clone(), SizeTarget::Container, Rc::clone(&broadcaster));
    use_element_size(tile_ref.clone(), SizeTarget::Tile, Rc::clone(&broadcaster));

    {
        let mut engine = engine.borrow_mut();
        engine.set_config(props.config.clone());
        engine.set_query(&search);
        engine.set_items(props.items.clone());
        engine.set_selected(props.selected.as_deref());
        if props.calibrate != engine.session().is_active() {
            if props.calibrate {
                engine.start_session();
            } else {
                engine.stop_session();
            }
        }
    }

    let on_key = {
        let engine = Rc::clone(&engine);
        let update = update.clone();
        use_callback((), move |press: KeyPress, _| {
            let command = engine.borrow_mut().handle_key(press);
            if let Some(command) = command {
                tracing::debug!(?command, "calibration command");
                update.force_update();
            }
        })
    };
    use_calibration_keys(props.calibrate, on_key);

    let onclick = {
        let engine = Rc::clone(&engine);
        let container_ref = container_ref.clone();
        let on_select = props.on_select.clone();
        Callback::from(move |event: MouseEvent| {
            let Some(element) = container_ref.cast::<web_sys::Element>() else {
                return;
            };
            let rect = element.get_bounding_client_rect();
            let point = Point::new(
                f64::from(event.client_x()) - rect.left(),
                f64::from(event.client_y()) - rect.top(),
            );
            engine.borrow_mut().click(point);
            let picked = pending.borrow_mut().take();
            if let Some(item) = picked {
                on_select.emit(item);
            }
        })
    };

    let engine = engine.borrow();
    let Some(layout) = engine.layout() else {
        return html! {
            <div ref={container_ref} class="swatch-stripe" style="position: relative;" />
        };
    };

    let tiles = engine.tiles().into_iter().map(|tile| {
        let class = classes!("swatch-tile", tile.selected.then_some("selected"));
        let node = if tile.index == 0 { tile_ref.clone() } else { NodeRef::default() };
        html! {
            <div
                key={tile.item.slug.clone()}
                ref={node}
                {class}
                data-slug={tile.item.slug.clone()}
                style={tile_style(&tile)}
            >
                { render_calibration_layers(&engine, &tile) }
                <span class="swatch-label">{ tile.item.slug.clone() }</span>
            </div>
        }
    });

    html! {
        <div ref={container_ref} class="swatch-stripe" style="position: relative;" {onclick}>
            <div class="swatch-track" style={track_style(layout)}>
                { for tiles }
            </div>
            if let Some(mode) = engine.active_mode() {
                <div class="swatch-mode">{ format!("calibrating: {}", mode.as_str()) }</div>
            }
            if let Some(overlay) = engine.debug_overlay() {
                { render_debug(&overlay) }
            }
        </div>
    }
}
