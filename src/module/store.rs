//! Blob store backing the hosted module's filesystem namespace
//!
//! Path-keyed files and directories, the same shape the in-module
//! filesystem of a compiled image presents: writes require a resolvable
//! parent, reads and removals of missing paths fail loudly.

use std::collections::HashMap;

use crate::bridge::{BridgeError, BridgeResult};

#[derive(Clone)]
enum Node {
    File(Vec<u8>),
    Directory,
}

/// In-memory blob namespace
pub struct BlobStore {
    nodes: HashMap<String, Node>,
}

impl BlobStore {
    pub fn new() -> Self {
        let mut store = Self {
            nodes: HashMap::new(),
        };
        // Root directory always exists
        store.nodes.insert("/".to_string(), Node::Directory);
        store
    }

    /// Normalize a path (ensure leading slash, no trailing slash except root)
    fn normalize(path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if path.len() > 1 && path.ends_with('/') {
            path[..path.len() - 1].to_string()
        } else {
            path
        }
    }

    /// Get parent directory of a path
    fn parent(path: &str) -> Option<String> {
        if path == "/" {
            return None;
        }
        let idx = path.rfind('/')?;
        if idx == 0 {
            Some("/".to_string())
        } else {
            Some(path[..idx].to_string())
        }
    }

    fn ensure_parent(&self, path: &str) -> BridgeResult<()> {
        if let Some(parent) = Self::parent(path) {
            match self.nodes.get(&parent) {
                Some(Node::Directory) => Ok(()),
                _ => Err(BridgeError::ParentNotFound { path: parent }),
            }
        } else {
            Ok(())
        }
    }

    /// Create a directory. Its own parent must already exist.
    pub fn add_dir(&mut self, path: &str) -> BridgeResult<()> {
        let path = Self::normalize(path);
        self.ensure_parent(&path)?;
        self.nodes.insert(path, Node::Directory);
        Ok(())
    }

    pub fn write(&mut self, path: &str, bytes: &[u8]) -> BridgeResult<()> {
        let path = Self::normalize(path);
        self.ensure_parent(&path)?;
        if matches!(self.nodes.get(&path), Some(Node::Directory)) {
            return Err(BridgeError::NotAFile { path });
        }
        self.nodes.insert(path, Node::File(bytes.to_vec()));
        Ok(())
    }

    pub fn read(&self, path: &str) -> BridgeResult<Vec<u8>> {
        let path = Self::normalize(path);
        match self.nodes.get(&path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            Some(Node::Directory) => Err(BridgeError::NotAFile { path }),
            None => Err(BridgeError::FileNotFound { path }),
        }
    }

    pub fn remove(&mut self, path: &str) -> BridgeResult<()> {
        let path = Self::normalize(path);
        match self.nodes.get(&path) {
            Some(Node::File(_)) => {
                self.nodes.remove(&path);
                Ok(())
            }
            Some(Node::Directory) => Err(BridgeError::NotAFile { path }),
            None => Err(BridgeError::FileNotFound { path }),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(&Self::normalize(path))
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new()
    }
}
