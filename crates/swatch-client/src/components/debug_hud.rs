//! Heads-up readout for the stripe's debug overlay.

use swatch_core::debug::HudLine;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct DebugHudProps {
    pub lines: Vec<HudLine>,
}

#[function_component(DebugHud)]
pub fn debug_hud(props: &DebugHudProps) -> Html {
    if props.lines.is_empty() {
        return html! {};
    }

    html! {
        <div class="debug-panel swatch-hud">
            { for props.lines.iter().map(|line| html! {
                <div class="debug-row" key={line.label}>
                    <span class="debug-label">{ format!("{}:", line.label) }</span>
                    <span class="debug-value">{ line.value.clone() }</span>
                </div>
            }) }
        </div>
    }
}
