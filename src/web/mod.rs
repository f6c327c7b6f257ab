//! Browser host: WebGL backend, DOM input and the exported app.

mod app;
mod context;
mod input;

pub use app::PlaygroundApp;
pub use context::WebGlContext;
pub use input::WebInputHandler;

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}
