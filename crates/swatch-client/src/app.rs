//! Main application component.

use serde::{Deserialize, Serialize};
use swatch_core::{DebugFlags, Item, StripeConfig};
use yew::prelude::*;

use crate::components::SwatchStripe;
use crate::hooks::use_localstorage;

const STRIPE_CONFIG: &str = include_str!("../config/stripe.json");

/// Toggles kept across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UiState {
    calibrate: bool,
    debug: DebugFlags,
}

fn load_config() -> StripeConfig {
    StripeConfig::from_json(STRIPE_CONFIG).unwrap_or_else(|e| {
        tracing::error!(error = %e, "invalid stripe config; using defaults");
        StripeConfig::default()
    })
}

fn demo_items() -> Vec<Item> {
    [
        ("vermilion", "warm"),
        ("saffron", "warm"),
        ("ochre", "warm"),
        ("amber", "warm"),
        ("chartreuse", "green"),
        ("viridian", "green"),
        ("jade", "green"),
        ("teal", "cool"),
        ("cerulean", "cool"),
        ("ultramarine", "cool"),
        ("indigo", "cool"),
        ("amethyst", "violet"),
        ("magenta", "violet"),
        ("ncc-1701", "artwork"),
    ]
    .into_iter()
    .map(|(slug, group)| Item::new(slug).with_group(group))
    .collect()
}

#[function_component(App)]
pub fn app() -> Html {
    let base_config = use_memo((), |_| load_config());
    let items = use_memo((), |_| demo_items());
    let selected = use_state(|| None::<String>);
    let ui = use_localstorage("swatch-ui", UiState::default);

    let config = StripeConfig {
        debug: ui.debug,
        ..(*base_config).clone()
    };

    let on_select = {
        let selected = selected.clone();
        Callback::from(move |item: Item| {
            tracing::info!(slug = %item.slug, "selected");
            selected.set(Some(item.slug));
        })
    };

    let toggle = |update: fn(&mut UiState)| {
        let ui = ui.clone();
        Callback::from(move |_: MouseEvent| {
            let mut next = *ui;
            update(&mut next);
            ui.set(next);
        })
    };

    html! {
        <main class="app">
            <SwatchStripe
                items={(*items).clone()}
                selected={(*selected).clone()}
                {config}
                calibrate={ui.calibrate}
                {on_select}
            />
            <p class="selection">
                { selected.as_deref().map_or_else(|| "Nothing selected".to_owned(), |slug| format!("Selected: {slug}")) }
            </p>
            <div class="toolbar">
                <button onclick={toggle(|s| s.calibrate = !s.calibrate)}>
                    { if ui.calibrate { "Stop calibrating" } else { "Calibrate" } }
                </button>
                <button onclick={toggle(|s| s.debug.outlines = !s.debug.outlines)}>{ "Outlines" }</button>
                <button onclick={toggle(|s| s.debug.guides = !s.debug.guides)}>{ "Guides" }</button>
                <button onclick={toggle(|s| s.debug.hud = !s.debug.hud)}>{ "HUD" }</button>
            </div>
        </main>
    }
}
