//! Virtual filesystem bridge
//!
//! Write/read/delete of named byte blobs in the module's private
//! filesystem namespace. These calls bracket an invocation - stage inputs
//! before, collect outputs after - but the bridge never infers which files
//! a run touches; that information lives only in the argument vector the
//! tool itself interprets. Nothing is cleaned up automatically: staged
//! files persist until deleted.

use std::rc::Rc;

use super::error::{BridgeError, BridgeResult};
use super::ready::ReadyGate;
use crate::module::ToolModule;

/// Handle on the module's filesystem namespace. Cheap to clone.
#[derive(Clone)]
pub struct VirtualFs {
    module: Rc<dyn ToolModule>,
    gate: Rc<ReadyGate>,
}

impl VirtualFs {
    pub(crate) fn new(module: Rc<dyn ToolModule>, gate: Rc<ReadyGate>) -> Self {
        Self { module, gate }
    }

    fn check_ready(&self) -> BridgeResult<()> {
        if self.gate.is_ready() {
            Ok(())
        } else {
            Err(BridgeError::NotReady)
        }
    }

    /// Stage `bytes` at `path`. Fails if the path's parent directory does
    /// not resolve inside the module namespace.
    pub fn write(&self, path: &str, bytes: &[u8]) -> BridgeResult<()> {
        self.check_ready()?;
        self.module.fs_write(path, bytes)
    }

    /// Read the blob at `path`
    pub fn read(&self, path: &str) -> BridgeResult<Vec<u8>> {
        self.check_ready()?;
        self.module.fs_read(path)
    }

    /// Remove the blob at `path`. Removing a missing path is an error, not
    /// a silent success.
    pub fn delete(&self, path: &str) -> BridgeResult<()> {
        self.check_ready()?;
        self.module.fs_remove(path)
    }
}
