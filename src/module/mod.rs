//! Tool-module abstraction
//!
//! The bridge consumes a compiled command-line image through the
//! [`ToolModule`] trait: an allocator, bounds-checked linear-memory access,
//! a single entry point, and a private filesystem namespace.
//! [`EmscriptenModule`] drives a real module object in the browser;
//! [`HostedModule`] is the in-process stand-in that lets the whole bridge
//! run natively.

mod hosted;
mod memory;
mod store;
#[cfg(target_arch = "wasm32")]
mod web;

pub use hosted::*;
pub use memory::*;
pub use store::*;
#[cfg(target_arch = "wasm32")]
pub use web::*;

use std::rc::Rc;

use crate::bridge::{BridgeResult, LogSink};

/// Hooks the bridge installs on a module exactly once
pub struct ModuleHooks {
    /// Fired when the module runtime finishes initialization
    pub on_ready: Box<dyn Fn()>,
    /// Fired when a deferred execution finishes, with the exit status
    pub on_finished: Box<dyn Fn(i32)>,
    /// Sink for the module's own log traffic
    pub log: Rc<LogSink>,
}

/// The primitives a compiled command-line image exposes to its host
///
/// The module owns its addresses once allocated and its filesystem
/// namespace; the bridge only orchestrates allocate/fill/free sequences and
/// file staging around the entry call.
pub trait ToolModule {
    /// Wire the readiness/completion hooks and the log sink. Called once
    /// by the bridge constructor.
    fn install_hooks(&self, hooks: ModuleHooks) -> BridgeResult<()>;

    /// Allocate `len` bytes through the module's own allocator
    fn alloc(&self, len: u32) -> BridgeResult<u32>;

    /// Release an allocation
    fn free(&self, ptr: u32);

    /// Copy `bytes` into linear memory at `ptr`
    fn memory_write(&self, ptr: u32, bytes: &[u8]) -> BridgeResult<()>;

    /// Copy `len` bytes out of linear memory at `ptr`
    fn memory_read(&self, ptr: u32, len: u32) -> BridgeResult<Vec<u8>>;

    /// Call the module entry point with the marshaled vector
    fn call_entry(&self, argc: i32, argv: u32) -> BridgeResult<i32>;

    /// Write a blob into the module's filesystem namespace
    fn fs_write(&self, path: &str, bytes: &[u8]) -> BridgeResult<()>;

    /// Read a blob back out
    fn fs_read(&self, path: &str) -> BridgeResult<Vec<u8>>;

    /// Remove a blob
    fn fs_remove(&self, path: &str) -> BridgeResult<()>;
}
