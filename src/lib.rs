//! gangway - a host-side bridge for wasm-compiled CLI tools
//!
//! A compiled command-line image (an Emscripten-style wasm module) exposes
//! an entry point, an allocator, and a private filesystem namespace. This
//! crate is the host half of that contract: it marshals an argument vector
//! into the module's linear memory, stages file bytes in and out of the
//! module's filesystem, triggers execution, and delivers completion back to
//! the caller - without leaking a single allocation on any exit path.
//!
//! Platform support:
//! - Browser (wasm32-unknown-unknown): drives a loaded module object via
//!   js-sys; see `module::EmscriptenModule` and the JS facade in `bindings`.
//! - Native: `module::HostedModule` stands in for a compiled image so the
//!   whole bridge runs under plain `cargo test`.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod module;
pub mod sched;

#[cfg(target_arch = "wasm32")]
pub mod bindings;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Module load hook. Runs once when the host-side wasm loads.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
