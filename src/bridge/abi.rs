//! Tool-module ABI names and argument encoding
//!
//! The stable surface the bridge expects from a compiled command-line image.

use super::error::{BridgeError, BridgeResult};

/// ABI version for the tool-module contract
pub const ABI_VERSION: u32 = 1;

/// Required exports on the module object
pub mod exports {
    /// Allocate bytes in linear memory, returns the address
    pub const MALLOC: &str = "_malloc";
    /// Release an address returned by the allocator
    pub const FREE: &str = "_free";
    /// Entry point: `_execute(argc, argv) -> status`
    pub const EXECUTE: &str = "_execute";
    /// Byte view over the module's linear memory
    pub const HEAP: &str = "HEAPU8";
    /// Filesystem namespace object
    pub const FS: &str = "FS";
}

/// Members the bridge installs on the module object
pub mod members {
    /// Fired once by the module runtime after initialization
    pub const ON_READY: &str = "onRuntimeInitialized";
    /// Fired by the module when a deferred execution finishes
    pub const ON_FINISHED: &str = "onExecuteFinished";
    /// Structured log line hook: `(section, indent, message)`
    pub const LOG_LINE: &str = "onLogLine";
    /// Error message hook
    pub const LOG_ERROR: &str = "onLogError";
    /// Truthy once the module runtime has already started
    pub const CALLED_RUN: &str = "calledRun";
}

/// Filesystem helpers on the module's `FS` object
pub mod fs_calls {
    pub const WRITE_FILE: &str = "writeFile";
    pub const READ_FILE: &str = "readFile";
    pub const UNLINK: &str = "unlink";
    pub const ANALYZE_PATH: &str = "analyzePath";
}

/// Width of a pointer in the module's 32-bit address space
pub const POINTER_SIZE: u32 = 4;

/// Encode a host string as the NUL-terminated byte sequence the tool's CLI
/// parser expects.
///
/// An interior NUL cannot survive the terminator convention, so it is
/// rejected up front rather than silently truncating the argument.
pub fn encode_cstring(s: &str) -> BridgeResult<Vec<u8>> {
    if s.as_bytes().contains(&0) {
        return Err(BridgeError::InvalidArgument {
            reason: format!("argument contains interior NUL: {:?}", s),
        });
    }
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_version() {
        assert_eq!(ABI_VERSION, 1);
    }

    #[test]
    fn test_export_names() {
        assert_eq!(exports::MALLOC, "_malloc");
        assert_eq!(exports::FREE, "_free");
        assert_eq!(exports::EXECUTE, "_execute");
    }

    #[test]
    fn test_pointer_size_is_wasm32() {
        assert_eq!(POINTER_SIZE, 4);
    }

    #[test]
    fn test_encode_appends_single_nul() {
        let bytes = encode_cstring("report").unwrap();
        assert_eq!(bytes, b"report\0");
    }

    #[test]
    fn test_encode_empty_string() {
        assert_eq!(encode_cstring("").unwrap(), vec![0]);
    }

    #[test]
    fn test_encode_preserves_utf8() {
        let bytes = encode_cstring("café").unwrap();
        assert_eq!(&bytes[..bytes.len() - 1], "café".as_bytes());
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn test_encode_rejects_interior_nul() {
        let result = encode_cstring("a\0b");
        assert!(matches!(result, Err(BridgeError::InvalidArgument { .. })));
    }
}
