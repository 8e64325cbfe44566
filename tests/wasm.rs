//! Browser smoke tests
//!
//! The full lifecycle suite lives in `tests/bridge.rs` and pumps the native
//! scheduler queue; here we only exercise the pure pieces that behave
//! identically under wasm.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use std::rc::Rc;

use gangway::bridge::{POINTER_SIZE, encode_cstring, marshal_args};
use gangway::module::{CompletionStyle, HostedModule, ToolModule};

#[wasm_bindgen_test]
fn cstring_encoding_terminates() {
    assert_eq!(encode_cstring("report").unwrap(), b"report\0");
    assert!(encode_cstring("a\0b").is_err());
}

#[wasm_bindgen_test]
fn marshaled_vector_lands_in_linear_memory() {
    let hosted = HostedModule::new(CompletionStyle::InEntry);
    let module: Rc<dyn ToolModule> = hosted.clone();
    let args = vec!["report".to_string()];
    let block = marshal_args(&module, "imgtool", &args).unwrap();

    assert_eq!(block.argc(), 2);
    let table = module.memory_read(block.argv(), 2 * POINTER_SIZE).unwrap();
    let first = u32::from_le_bytes([table[0], table[1], table[2], table[3]]);
    assert_eq!(module.memory_read(first, 8).unwrap(), b"imgtool\0");

    drop(block);
    assert_eq!(hosted.live_allocations(), 0);
}
