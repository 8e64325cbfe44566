//! Error types for the bridge
//!
//! One enum covers the whole taxonomy: misuse (calling before readiness,
//! overlapping invocations, wrong call shape), resource exhaustion,
//! filesystem failures, and opaque module-side faults.

use std::fmt;

use super::runner::ExecMode;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while staging, invoking, or collecting results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Invocation-related call issued before the module signaled readiness
    NotReady,

    /// A deferred invocation is already in flight
    InvocationPending,

    /// Blocking call issued against a bridge configured for the other
    /// completion shape
    ModeMismatch { mode: ExecMode },

    /// The module's allocator could not satisfy a request
    OutOfMemory { requested: u32 },

    /// Linear-memory access outside the module's address space
    MemoryAccessOutOfBounds {
        address: u32,
        len: u32,
        memory_size: u32,
    },

    /// An argument cannot be marshaled
    InvalidArgument { reason: String },

    /// A write target's parent directory does not resolve
    ParentNotFound { path: String },

    /// No file at the given virtual path
    FileNotFound { path: String },

    /// The virtual path names a directory where a file was expected
    NotAFile { path: String },

    /// The module object lacks a required export
    MissingExport { name: &'static str },

    /// Opaque failure inside the module (e.g. the entry point trapped)
    Module { detail: String },
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => {
                write!(f, "module has not signaled readiness")
            }
            Self::InvocationPending => {
                write!(f, "an invocation is already in flight")
            }
            Self::ModeMismatch { mode } => {
                write!(f, "call shape not supported in {} mode", mode)
            }
            Self::OutOfMemory { requested } => {
                write!(f, "module allocator failed for {} bytes", requested)
            }
            Self::MemoryAccessOutOfBounds {
                address,
                len,
                memory_size,
            } => {
                write!(
                    f,
                    "memory access out of bounds: address {} + len {} > memory size {}",
                    address, len, memory_size
                )
            }
            Self::InvalidArgument { reason } => {
                write!(f, "invalid argument: {}", reason)
            }
            Self::ParentNotFound { path } => {
                write!(f, "parent directory not found: {}", path)
            }
            Self::FileNotFound { path } => {
                write!(f, "file not found: {}", path)
            }
            Self::NotAFile { path } => {
                write!(f, "not a file: {}", path)
            }
            Self::MissingExport { name } => {
                write!(f, "module is missing required export '{}'", name)
            }
            Self::Module { detail } => {
                write!(f, "module error: {}", detail)
            }
        }
    }
}

impl std::error::Error for BridgeError {}
