//! Argument marshaling into module linear memory
//!
//! One allocation per argument string (UTF-8 plus a NUL terminator) and one
//! pointer-table allocation, all owned by a single [`ArgvBlock`] so that
//! every byte is released exactly once no matter how the invocation ends.

use std::rc::Rc;

use super::abi::{self, POINTER_SIZE};
use super::error::BridgeResult;
use crate::module::ToolModule;

/// The marshaled buffer set for one invocation
///
/// Owns the pointer table and one allocation per argument. Dropping the
/// block frees them all through the module's allocator, and dropping is the
/// only way they are freed, so the exactly-once guarantee falls out of
/// ownership: the block is either dropped right after a synchronous entry
/// call or moved into the completion slot and dropped when the module
/// signals.
pub struct ArgvBlock {
    module: Rc<dyn ToolModule>,
    table: u32,
    strings: Vec<u32>,
    argc: i32,
}

impl ArgvBlock {
    /// Number of arguments the module will observe, program token included
    pub fn argc(&self) -> i32 {
        self.argc
    }

    /// Address of the pointer table, usable as `argv`
    pub fn argv(&self) -> u32 {
        self.table
    }
}

impl Drop for ArgvBlock {
    fn drop(&mut self) {
        for &ptr in &self.strings {
            self.module.free(ptr);
        }
        self.module.free(self.table);
    }
}

/// Marshal `program` plus `args` into module memory.
///
/// The program token is inserted as argument 0 unconditionally: the tool's
/// CLI parser treats argv[0] as the invocation name, so the token is part
/// of the wire protocol rather than a default the caller could override.
///
/// The pointer table is allocated first, then each string in order; the
/// table of little-endian addresses is written in one pass at the end. Any
/// failure returns early and the partially-built block is dropped on the
/// way out, releasing whatever was already allocated.
pub fn marshal_args(
    module: &Rc<dyn ToolModule>,
    program: &str,
    args: &[String],
) -> BridgeResult<ArgvBlock> {
    let argc = args.len() + 1;

    let table = module.alloc(argc as u32 * POINTER_SIZE)?;
    let mut block = ArgvBlock {
        module: Rc::clone(module),
        table,
        strings: Vec::with_capacity(argc),
        argc: argc as i32,
    };

    let mut table_bytes = Vec::with_capacity(argc * POINTER_SIZE as usize);
    for arg in std::iter::once(program).chain(args.iter().map(String::as_str)) {
        let encoded = abi::encode_cstring(arg)?;
        let ptr = block.module.alloc(encoded.len() as u32)?;
        // Recorded before the copy so a failed write still gets freed.
        block.strings.push(ptr);
        block.module.memory_write(ptr, &encoded)?;
        table_bytes.extend_from_slice(&ptr.to_le_bytes());
    }
    block.module.memory_write(table, &table_bytes)?;

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeError;
    use crate::module::{CompletionStyle, HostedModule, HostedModuleBuilder};

    fn module() -> Rc<dyn ToolModule> {
        HostedModule::new(CompletionStyle::InEntry)
    }

    #[test]
    fn test_program_token_is_argument_zero() {
        let module = module();
        let block = marshal_args(&module, "imgtool", &[]).unwrap();
        assert_eq!(block.argc(), 1);

        let table = module.memory_read(block.argv(), POINTER_SIZE).unwrap();
        let ptr = u32::from_le_bytes([table[0], table[1], table[2], table[3]]);
        let bytes = module.memory_read(ptr, 8).unwrap();
        assert_eq!(&bytes, b"imgtool\0");
    }

    #[test]
    fn test_arguments_keep_their_order() {
        let module = module();
        let args = vec!["report".to_string(), "/in.jpg".to_string(), "/out.html".to_string()];
        let block = marshal_args(&module, "imgtool", &args).unwrap();
        assert_eq!(block.argc(), 4);

        let expected = ["imgtool", "report", "/in.jpg", "/out.html"];
        let table = module
            .memory_read(block.argv(), 4 * POINTER_SIZE)
            .unwrap();
        for (i, want) in expected.iter().enumerate() {
            let at = i * 4;
            let ptr = u32::from_le_bytes([
                table[at],
                table[at + 1],
                table[at + 2],
                table[at + 3],
            ]);
            let bytes = module.memory_read(ptr, want.len() as u32 + 1).unwrap();
            assert_eq!(&bytes[..want.len()], want.as_bytes());
            assert_eq!(bytes[want.len()], 0);
        }
    }

    #[test]
    fn test_drop_releases_every_allocation() {
        let hosted = HostedModule::new(CompletionStyle::InEntry);
        let module: Rc<dyn ToolModule> = hosted.clone();
        let args = vec!["a".to_string(), "b".to_string()];
        let block = marshal_args(&module, "imgtool", &args).unwrap();
        // Table plus three strings.
        assert_eq!(hosted.live_allocations(), 4);
        drop(block);
        assert_eq!(hosted.live_allocations(), 0);
        assert_eq!(hosted.double_frees(), 0);
    }

    #[test]
    fn test_allocation_failure_leaks_nothing() {
        // Room for the table and the program token, not for the rest.
        let hosted = HostedModuleBuilder::new(CompletionStyle::InEntry)
            .alloc_limit(crate::module::BumpAllocator::HEAP_BASE + 24)
            .build();
        let module: Rc<dyn ToolModule> = hosted.clone();
        let args = vec!["x".repeat(64)];
        let result = marshal_args(&module, "imgtool", &args);
        assert!(matches!(result, Err(BridgeError::OutOfMemory { .. })));
        assert_eq!(hosted.live_allocations(), 0);
        assert_eq!(hosted.double_frees(), 0);
    }

    #[test]
    fn test_nul_in_argument_leaks_nothing() {
        let hosted = HostedModule::new(CompletionStyle::InEntry);
        let module: Rc<dyn ToolModule> = hosted.clone();
        let args = vec!["bad\0arg".to_string()];
        let result = marshal_args(&module, "imgtool", &args);
        assert!(matches!(result, Err(BridgeError::InvalidArgument { .. })));
        assert_eq!(hosted.live_allocations(), 0);
    }
}
