//! Measures an element and pushes its size into a [`SizeBroadcaster`].

use std::rc::Rc;

use gloo::events::EventListener;
use swatch_core::{Size, SizeBroadcaster, SizeTarget};
use yew::prelude::*;

fn measure(node: &NodeRef) -> Option<Size> {
    let element = node.cast::<web_sys::Element>()?;
    let rect = element.get_bounding_client_rect();
    let size = Size::new(rect.width(), rect.height());
    size.is_measurable().then_some(size)
}

/// Re-measures `node` after every render and on window resize.
///
/// Unchanged sizes are still broadcast; the engine ignores repeats.
#[hook]
pub fn use_element_size(node: NodeRef, target: SizeTarget, broadcaster: Rc<SizeBroadcaster>) {
    let listener_ref = use_mut_ref(|| None::<EventListener>);

    {
        let node = node.clone();
        let broadcaster = Rc::clone(&broadcaster);
        use_effect(move || {
            if let Some(size) = measure(&node) {
                broadcaster.notify(target, size);
            }
        });
    }

    use_effect_with(node, move |node| {
        let node = node.clone();
        let listener = EventListener::new(&gloo::utils::window(), "resize", move |_| {
            if let Some(size) = measure(&node) {
                tracing::trace!(?target, width = size.width, height = size.height, "resized");
                broadcaster.notify(target, size);
            }
        });
        *listener_ref.borrow_mut() = Some(listener);
    });
}
