//! Host-to-module execution bridge
//!
//! This module implements the host half of the contract between a web page
//! (or a native test harness) and a wasm-compiled command-line image. The
//! module is opaque beyond a small surface; the bridge orchestrates that
//! surface so callers can treat a compiled tool as a function call.
//!
//! # Module contract v1
//!
//! ## Required surface
//!
//! | Member      | Type                              | Description                     |
//! |-------------|-----------------------------------|---------------------------------|
//! | `_malloc`   | `(len: u32) -> ptr`               | Allocate in linear memory       |
//! | `_free`     | `(ptr: u32)`                      | Release an allocation           |
//! | `_execute`  | `(argc: i32, argv: u32) -> i32`   | Entry point, returns status     |
//! | `HEAPU8`    | byte view                         | Linear memory for data exchange |
//! | `FS`        | object                            | Private filesystem namespace    |
//!
//! Members the bridge installs:
//!
//! | Member                  | Fired by the module when                      |
//! |-------------------------|-----------------------------------------------|
//! | `onRuntimeInitialized`  | its runtime finished initializing             |
//! | `onExecuteFinished`     | a deferred execution finished (carries status)|
//! | `onLogLine`             | the tool emits a structured log line          |
//! | `onLogError`            | the tool emits an error message               |
//!
//! ## Argument passing
//!
//! The host encodes each argument as UTF-8 plus one NUL terminator in its
//! own allocation, then writes a table of little-endian addresses. The
//! program-name token is always argument 0:
//!
//! ```text
//! execute(2, T) with args ["report"]:
//!   A: "imgtool\0"        (allocation 1)
//!   B: "report\0"         (allocation 2)
//!   T: [A, B]             (pointer table, allocation 3)
//! ```
//!
//! ## Invocation lifecycle
//!
//! ```text
//! ready -> marshal -> _execute -> completion -> release -> continuation
//! ```
//!
//! Marshaling happens-before the entry call, the call happens-before
//! completion, and completion happens-before buffer release and the
//! caller's continuation. Every allocation made for an invocation is
//! released exactly once, whichever way the invocation ends: synchronous
//! return, completion signal, or failure partway through.
//!
//! ## One in flight
//!
//! A single completion slot holds at most one pending continuation, so at
//! most one deferred invocation may be in flight per bridge. A second is
//! rejected, never silently interleaved.

mod abi;
mod error;
mod logging;
mod marshal;
mod notify;
mod ready;
mod runner;
mod vfs;

pub use abi::*;
pub use error::*;
pub use logging::*;
pub use marshal::*;
pub use notify::*;
pub use ready::*;
pub use runner::*;
pub use vfs::*;
