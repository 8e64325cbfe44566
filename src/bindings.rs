//! JS-facing surface
//!
//! Lets a plain page drive the bridge without writing Rust: wrap a loaded
//! module object, stage files, execute, collect results.

use wasm_bindgen::prelude::*;

use crate::bridge::{BridgeConfig, BridgeError, ExecMode, ToolBridge};
use crate::module::EmscriptenModule;

fn to_js(err: BridgeError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// Execution bridge handle exported to JS
#[wasm_bindgen]
pub struct Bridge {
    inner: ToolBridge,
}

#[wasm_bindgen]
impl Bridge {
    /// Wrap a loaded Emscripten-style module object.
    ///
    /// `deferred` selects the completion shape the tool was compiled with.
    #[wasm_bindgen(constructor)]
    pub fn new(module: JsValue, program_name: &str, deferred: bool) -> Result<Bridge, JsValue> {
        let module = EmscriptenModule::new(module).map_err(to_js)?;
        let exec = if deferred {
            ExecMode::Deferred
        } else {
            ExecMode::Immediate
        };
        let inner =
            ToolBridge::new(module, BridgeConfig::new(program_name, exec)).map_err(to_js)?;
        Ok(Bridge { inner })
    }

    /// Register a callback for module readiness
    #[wasm_bindgen(js_name = onReady)]
    pub fn on_ready(&self, callback: js_sys::Function) {
        self.inner.on_ready(move || {
            let _ = callback.call0(&JsValue::NULL);
        });
    }

    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Stage bytes at a virtual path
    #[wasm_bindgen(js_name = writeFile)]
    pub fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), JsValue> {
        self.inner.fs().write(path, bytes).map_err(to_js)
    }

    /// Read the blob at a virtual path
    #[wasm_bindgen(js_name = readFile)]
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, JsValue> {
        self.inner.fs().read(path).map_err(to_js)
    }

    /// Remove the blob at a virtual path
    #[wasm_bindgen(js_name = deleteFile)]
    pub fn delete_file(&self, path: &str) -> Result<(), JsValue> {
        self.inner.fs().delete(path).map_err(to_js)
    }

    /// Run the tool. `done`, if given, receives the exit status once the
    /// run finishes.
    pub fn execute(
        &self,
        args: Vec<String>,
        done: Option<js_sys::Function>,
    ) -> Result<(), JsValue> {
        self.inner
            .invoke(&args, move |status| {
                if let Some(done) = done {
                    let _ = done.call1(&JsValue::NULL, &JsValue::from(status));
                }
            })
            .map_err(to_js)
    }

    /// Override the structured log line hook with a JS function
    #[wasm_bindgen(js_name = setLogHook)]
    pub fn set_log_hook(&self, hook: js_sys::Function) {
        self.inner
            .log()
            .set_line_hook(Some(Box::new(move |section, indent, message| {
                let _ = hook.call3(
                    &JsValue::NULL,
                    &JsValue::from_str(section),
                    &JsValue::from(indent),
                    &JsValue::from_str(message),
                );
            })));
    }

    /// Override the error message hook with a JS function
    #[wasm_bindgen(js_name = setErrorHook)]
    pub fn set_error_hook(&self, hook: js_sys::Function) {
        self.inner
            .log()
            .set_error_hook(Some(Box::new(move |message| {
                let _ = hook.call1(&JsValue::NULL, &JsValue::from_str(message));
            })));
    }
}
