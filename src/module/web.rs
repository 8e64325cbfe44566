//! Emscripten-style module driver
//!
//! Drives a loaded module object through js-sys: `_malloc`/`_free` for the
//! allocator, the `HEAPU8` view for linear memory, `_execute` for the
//! entry point, and the module's `FS` object for the filesystem namespace.
//! The heap view is re-fetched on every access because memory growth
//! replaces the underlying buffer.

use std::rc::Rc;

use js_sys::{Function, Object, Reflect, Uint8Array};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::bridge::{BridgeError, BridgeResult, exports, fs_calls, members};
use crate::sched;

use super::{ModuleHooks, ToolModule};

/// A loaded Emscripten-style module object
pub struct EmscriptenModule {
    object: Object,
    malloc: Function,
    free: Function,
    execute: Function,
    fs: Object,
}

impl EmscriptenModule {
    /// Wrap a loaded module object, checking the exports the bridge needs
    pub fn new(object: JsValue) -> BridgeResult<Rc<Self>> {
        let object: Object = object.dyn_into().map_err(|_| BridgeError::Module {
            detail: "module is not an object".to_string(),
        })?;
        let malloc = get_function(&object, exports::MALLOC)?;
        let free = get_function(&object, exports::FREE)?;
        let execute = get_function(&object, exports::EXECUTE)?;
        let fs = get_object(&object, exports::FS)?;
        Ok(Rc::new(Self {
            object,
            malloc,
            free,
            execute,
            fs,
        }))
    }

    fn heap(&self) -> BridgeResult<Uint8Array> {
        let heap = Reflect::get(&self.object, &JsValue::from_str(exports::HEAP))
            .map_err(|_| BridgeError::MissingExport { name: exports::HEAP })?;
        heap.dyn_into()
            .map_err(|_| BridgeError::MissingExport { name: exports::HEAP })
    }

    fn check_span(&self, heap: &Uint8Array, ptr: u32, len: u32) -> BridgeResult<()> {
        if (ptr as u64) + (len as u64) > heap.length() as u64 {
            return Err(BridgeError::MemoryAccessOutOfBounds {
                address: ptr,
                len,
                memory_size: heap.length(),
            });
        }
        Ok(())
    }

    fn fs_call(&self, name: &'static str) -> BridgeResult<Function> {
        get_function(&self.fs, name)
    }

    fn path_exists(&self, path: &str) -> BridgeResult<bool> {
        let analyze = self.fs_call(fs_calls::ANALYZE_PATH)?;
        let report = analyze
            .call1(&self.fs, &JsValue::from_str(path))
            .map_err(js_detail)?;
        let exists = Reflect::get(&report, &JsValue::from_str("exists")).map_err(js_detail)?;
        Ok(exists.is_truthy())
    }
}

fn get_function(object: &Object, name: &'static str) -> BridgeResult<Function> {
    let value = Reflect::get(object, &JsValue::from_str(name))
        .map_err(|_| BridgeError::MissingExport { name })?;
    value
        .dyn_into()
        .map_err(|_| BridgeError::MissingExport { name })
}

fn get_object(object: &Object, name: &'static str) -> BridgeResult<Object> {
    let value = Reflect::get(object, &JsValue::from_str(name))
        .map_err(|_| BridgeError::MissingExport { name })?;
    value
        .dyn_into()
        .map_err(|_| BridgeError::MissingExport { name })
}

fn js_detail(value: JsValue) -> BridgeError {
    BridgeError::Module {
        detail: value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value)),
    }
}

fn set_member(object: &Object, name: &str, value: &JsValue) -> BridgeResult<()> {
    Reflect::set(object, &JsValue::from_str(name), value).map_err(js_detail)?;
    Ok(())
}

/// Path of the directory containing `path`, if it names one
fn parent_of(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 { Some("/") } else { Some(&trimmed[..idx]) }
}

impl ToolModule for EmscriptenModule {
    fn install_hooks(&self, hooks: ModuleHooks) -> BridgeResult<()> {
        let ModuleHooks {
            on_ready,
            on_finished,
            log,
        } = hooks;
        let on_ready = Rc::new(on_ready);

        let ready_hook = Rc::clone(&on_ready);
        let ready = Closure::<dyn FnMut()>::new(move || (*ready_hook)());
        set_member(&self.object, members::ON_READY, ready.as_ref())?;
        ready.forget();

        let finished = Closure::<dyn FnMut(JsValue)>::new(move |status: JsValue| {
            let status = status.as_f64().map(|v| v as i32).unwrap_or(0);
            on_finished(status);
        });
        set_member(&self.object, members::ON_FINISHED, finished.as_ref())?;
        finished.forget();

        let line_sink = Rc::clone(&log);
        let line = Closure::<dyn FnMut(JsValue, JsValue, JsValue)>::new(
            move |section: JsValue, indent: JsValue, message: JsValue| {
                line_sink.line(
                    &section.as_string().unwrap_or_default(),
                    indent.as_f64().unwrap_or(0.0) as u32,
                    &message.as_string().unwrap_or_default(),
                );
            },
        );
        set_member(&self.object, members::LOG_LINE, line.as_ref())?;
        line.forget();

        let error_sink = log;
        let error = Closure::<dyn FnMut(JsValue)>::new(move |message: JsValue| {
            error_sink.error(&message.as_string().unwrap_or_default());
        });
        set_member(&self.object, members::LOG_ERROR, error.as_ref())?;
        error.forget();

        // The runtime may have started before the bridge attached; the
        // member hook would then never fire on its own.
        let called_run = Reflect::get(&self.object, &JsValue::from_str(members::CALLED_RUN));
        if called_run.map(|v| v.is_truthy()).unwrap_or(false) {
            let ready_hook = Rc::clone(&on_ready);
            sched::defer(move || (*ready_hook)());
        }

        Ok(())
    }

    fn alloc(&self, len: u32) -> BridgeResult<u32> {
        let result = self
            .malloc
            .call1(&self.object, &JsValue::from(len))
            .map_err(js_detail)?;
        let ptr = result.as_f64().unwrap_or(0.0) as u32;
        if ptr == 0 {
            return Err(BridgeError::OutOfMemory { requested: len });
        }
        Ok(ptr)
    }

    fn free(&self, ptr: u32) {
        let _ = self.free.call1(&self.object, &JsValue::from(ptr));
    }

    fn memory_write(&self, ptr: u32, bytes: &[u8]) -> BridgeResult<()> {
        let heap = self.heap()?;
        self.check_span(&heap, ptr, bytes.len() as u32)?;
        for (i, &byte) in bytes.iter().enumerate() {
            heap.set_index(ptr + i as u32, byte);
        }
        Ok(())
    }

    fn memory_read(&self, ptr: u32, len: u32) -> BridgeResult<Vec<u8>> {
        let heap = self.heap()?;
        self.check_span(&heap, ptr, len)?;
        let mut out = vec![0u8; len as usize];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = heap.get_index(ptr + i as u32);
        }
        Ok(out)
    }

    fn call_entry(&self, argc: i32, argv: u32) -> BridgeResult<i32> {
        let status = self
            .execute
            .call2(&self.object, &JsValue::from(argc), &JsValue::from(argv))
            .map_err(js_detail)?;
        Ok(status.as_f64().map(|v| v as i32).unwrap_or(0))
    }

    fn fs_write(&self, path: &str, bytes: &[u8]) -> BridgeResult<()> {
        if let Some(parent) = parent_of(path) {
            if parent != "/" && !self.path_exists(parent)? {
                return Err(BridgeError::ParentNotFound {
                    path: parent.to_string(),
                });
            }
        }
        let write = self.fs_call(fs_calls::WRITE_FILE)?;
        let data = Uint8Array::from(bytes);
        write
            .call2(&self.fs, &JsValue::from_str(path), &data)
            .map_err(js_detail)?;
        Ok(())
    }

    fn fs_read(&self, path: &str) -> BridgeResult<Vec<u8>> {
        if !self.path_exists(path)? {
            return Err(BridgeError::FileNotFound {
                path: path.to_string(),
            });
        }
        let read = self.fs_call(fs_calls::READ_FILE)?;
        let data = read
            .call1(&self.fs, &JsValue::from_str(path))
            .map_err(js_detail)?;
        let data: Uint8Array = data.dyn_into().map_err(|_| BridgeError::NotAFile {
            path: path.to_string(),
        })?;
        Ok(data.to_vec())
    }

    fn fs_remove(&self, path: &str) -> BridgeResult<()> {
        if !self.path_exists(path)? {
            return Err(BridgeError::FileNotFound {
                path: path.to_string(),
            });
        }
        let unlink = self.fs_call(fs_calls::UNLINK)?;
        unlink
            .call1(&self.fs, &JsValue::from_str(path))
            .map_err(js_detail)?;
        Ok(())
    }
}
