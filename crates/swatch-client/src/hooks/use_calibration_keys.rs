//! Document-level key listener feeding the calibration session.

use gloo::events::{EventListener, EventListenerOptions};
use swatch_core::{KeyPress, SessionKey};
use wasm_bindgen::JsCast;
use web_sys::KeyboardEvent;
use yew::prelude::*;

/// Check if the event target is a text-entry element.
fn is_input_element(event: &KeyboardEvent) -> bool {
    if let Some(target) = event.target() {
        if let Some(element) = target.dyn_ref::<web_sys::HtmlElement>() {
            if element.is_content_editable() {
                return true;
            }
            let tag_name = element.tag_name().to_lowercase();
            return matches!(tag_name.as_str(), "input" | "textarea" | "select");
        }
    }
    false
}

/// Forwards recognized calibration keys to `on_key` while `enabled`.
///
/// Shift selects the large step. Presses from text inputs are still
/// forwarded, flagged, so the session can ignore them; their default
/// action is left alone.
#[hook]
pub fn use_calibration_keys(enabled: bool, on_key: Callback<KeyPress>) {
    let listener_ref = use_mut_ref(|| None::<EventListener>);

    use_effect_with((enabled, on_key), move |(enabled, on_key)| {
        *listener_ref.borrow_mut() = None;

        if !*enabled {
            return;
        }

        let on_key = on_key.clone();
        let document = gloo::utils::document();
        let options = EventListenerOptions::enable_prevent_default();

        let listener = EventListener::new_with_options(&document, "keydown", options, move |event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            let Some(key) = SessionKey::from_dom_key(&event.key()) else {
                return;
            };
            let from_text_input = is_input_element(event);
            if !from_text_input {
                event.prevent_default();
            }
            on_key.emit(KeyPress {
                key,
                large_step: event.shift_key(),
                from_text_input,
            });
        });

        *listener_ref.borrow_mut() = Some(listener);
    });
}
