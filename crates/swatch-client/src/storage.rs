//! Browser `sessionStorage` as a calibration backend.

use swatch_core::{RawStorage, RepositoryError};
use wasm_bindgen::JsValue;

/// Handle to `window.sessionStorage`, looked up on every call so a storage
/// that appears or disappears later is picked up.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStorage;

impl SessionStorage {
    fn storage() -> Result<web_sys::Storage, RepositoryError> {
        web_sys::window()
            .and_then(|win| win.session_storage().ok().flatten())
            .ok_or(RepositoryError::Unavailable)
    }
}

fn backend_error(key: &str, err: &JsValue) -> RepositoryError {
    let message = format!("{err:?}");
    if message.contains("QuotaExceeded") {
        RepositoryError::QuotaExceeded(key.to_owned())
    } else {
        RepositoryError::Backend(message)
    }
}

impl RawStorage for SessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| backend_error(key, &e))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| backend_error(key, &e))
    }
}
