use gloo::events::EventListener;
use yew::prelude::*;

fn current_search() -> String {
    web_sys::window()
        .and_then(|window| window.location().search().ok())
        .unwrap_or_default()
}

/// Raw `location.search`, refreshed on history navigation.
#[hook]
pub fn use_query_search() -> String {
    let search = use_state(current_search);

    {
        let search = search.clone();
        use_effect_with((), move |_| {
            let listener = EventListener::new(&gloo::utils::window(), "popstate", move |_| {
                search.set(current_search());
            });
            move || drop(listener)
        });
    }

    (*search).clone()
}
