mod use_calibration_keys;
mod use_element_size;
mod use_localstorage;
mod use_query_search;

pub use use_calibration_keys::use_calibration_keys;
pub use use_element_size::use_element_size;
pub use use_localstorage::use_localstorage;
pub use use_query_search::use_query_search;
