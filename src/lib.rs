//! Sooty core crate.
//!
//! State, decay and cross-context sync for the Sooty virtual desktop pet. The
//! same persisted snapshot (stats, age, appearance, timestamps) is shared by
//! the main pet window, the embedded companion and the extension popup; this
//! crate owns the decay math, the emotion classifier, the snapshot store and
//! the channels that keep every context converging on the same state.
//! Rendering, audio and theming live in the host page and are out of scope.
//!
//! Pure logic (`state`, `actions`, `params`, `messages`, plus the store over
//! an in-memory backend) runs under plain `cargo test`; browser glue
//! (`store`'s localStorage backend, `sync`, `controller`, `companion`) is
//! wasm-bindgen/web-sys and is exercised from JS via the exported
//! entrypoints.

use wasm_bindgen::prelude::*;

pub mod actions;
pub mod companion;
pub mod controller;
pub mod messages;
pub mod params;
pub mod state;
pub mod store;
pub mod sync;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    // Logger accepts up to debug; the global filter defaults to info and the
    // `debug` query flag raises it at entrypoint start.
    let _ = console_log::init_with_level(log::Level::Debug);
    log::set_max_level(log::LevelFilter::Info);
}

/// Current wall-clock time in epoch milliseconds. Browser contexts only;
/// pure modules take `now` as a parameter instead.
pub(crate) fn now_ms() -> f64 {
    js_sys::Date::now()
}
