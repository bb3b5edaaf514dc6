use std::ops::Deref;

use yew::prelude::*;

/// State mirrored into `localStorage` under `key`.
#[hook]
pub fn use_localstorage<T, F>(key: &'static str, init_fn: F) -> UseStateHandle<T>
where
    T: 'static + Clone + serde::Serialize + serde::de::DeserializeOwned + PartialEq,
    F: Fn() -> T + 'static,
{
    let state = use_state(|| {
        let storage = web_sys::window().and_then(|win| win.local_storage().ok().flatten());

        if let Some(storage) = storage {
            if let Ok(Some(value)) = storage.get_item(key) {
                match serde_json::from_str::<T>(&value) {
                    Ok(deserialized) => return deserialized,
                    Err(e) => tracing::warn!(key, error = %e, "discarding stored UI state"),
                }
            }
        }
        init_fn()
    });
    {
        let state = state.clone();
        use_effect_with(state.clone(), move |state| {
            let storage = web_sys::window().and_then(|win| win.local_storage().ok().flatten());
            if let Some(storage) = storage {
                if let Ok(serialized) = serde_json::to_string(&state.deref()) {
                    if storage.set_item(key, &serialized).is_err() {
                        tracing::warn!(key, "failed to store UI state");
                    }
                }
            }
            || ()
        });
    }
    state
}
