//! In-process tool module
//!
//! A stand-in for a compiled command-line image, faithful enough to
//! exercise the whole bridge natively: real linear memory behind the
//! allocator, the argument vector parsed back out of that memory, a
//! blob-store filesystem, and both completion styles. The "tool" itself is
//! a handler closure the embedder provides.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bridge::{BridgeError, BridgeResult, POINTER_SIZE};
use crate::sched;

use super::memory::{BumpAllocator, LinearMemory};
use super::store::BlobStore;
use super::{ModuleHooks, ToolModule};

/// How the stand-in delivers completion, mirroring how a real tool would
/// have been compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStyle {
    /// The entry call returns the final status; the completion hook never
    /// fires
    InEntry,
    /// The entry call returns early; the status arrives through the
    /// completion hook on a later tick
    Deferred,
}

/// The tool body: receives the parsed argument vector and the filesystem
pub type ToolHandler = Box<dyn Fn(&[String], &mut BlobStore) -> i32>;

/// Builder for a [`HostedModule`]
pub struct HostedModuleBuilder {
    style: CompletionStyle,
    pages: u32,
    manual_ready: bool,
    alloc_limit: Option<u32>,
}

impl HostedModuleBuilder {
    pub fn new(style: CompletionStyle) -> Self {
        Self {
            style,
            pages: HostedModule::DEFAULT_PAGES,
            manual_ready: false,
            alloc_limit: None,
        }
    }

    /// Linear memory size in 64KB pages
    pub fn pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    /// Keep the module un-ready until `signal_ready` is called
    pub fn manual_ready(mut self) -> Self {
        self.manual_ready = true;
        self
    }

    /// Cap the allocator below memory size, to force exhaustion mid-run
    pub fn alloc_limit(mut self, bytes: u32) -> Self {
        self.alloc_limit = Some(bytes);
        self
    }

    pub fn build(self) -> Rc<HostedModule> {
        let memory = LinearMemory::new(self.pages);
        let limit = self.alloc_limit.unwrap_or_else(|| memory.size()).min(memory.size());
        Rc::new(HostedModule {
            memory: RefCell::new(memory),
            allocator: RefCell::new(BumpAllocator::new(limit)),
            store: RefCell::new(BlobStore::new()),
            handler: RefCell::new(Box::new(|_, _| 0)),
            hooks: RefCell::new(None),
            style: self.style,
            ready_at_install: !self.manual_ready,
            entry_failure: RefCell::new(None),
            last_argv: RefCell::new(Vec::new()),
        })
    }
}

/// In-process module implementing the full [`ToolModule`] contract
pub struct HostedModule {
    memory: RefCell<LinearMemory>,
    allocator: RefCell<BumpAllocator>,
    store: RefCell<BlobStore>,
    handler: RefCell<ToolHandler>,
    hooks: RefCell<Option<Rc<ModuleHooks>>>,
    style: CompletionStyle,
    ready_at_install: bool,
    entry_failure: RefCell<Option<String>>,
    last_argv: RefCell<Vec<String>>,
}

impl HostedModule {
    /// Default linear memory size (4 pages = 256KB)
    pub const DEFAULT_PAGES: u32 = 4;

    /// A module with default memory that signals readiness on the first
    /// tick after the bridge attaches
    pub fn new(style: CompletionStyle) -> Rc<Self> {
        HostedModuleBuilder::new(style).build()
    }

    /// Replace the tool body
    pub fn set_handler(&self, handler: impl Fn(&[String], &mut BlobStore) -> i32 + 'static) {
        *self.handler.borrow_mut() = Box::new(handler);
    }

    /// Fire the readiness hook (for modules built with `manual_ready`).
    pub fn signal_ready(&self) {
        if let Some(hooks) = self.hooks.borrow().clone() {
            sched::defer(move || (hooks.on_ready)());
        }
    }

    /// Make the next entry calls trap with the given detail
    pub fn set_entry_failure(&self, detail: &str) {
        *self.entry_failure.borrow_mut() = Some(detail.to_string());
    }

    pub fn clear_entry_failure(&self) {
        *self.entry_failure.borrow_mut() = None;
    }

    /// Create a directory inside the module namespace
    pub fn add_dir(&self, path: &str) -> BridgeResult<()> {
        self.store.borrow_mut().add_dir(path)
    }

    /// Live allocation count, for leak assertions
    pub fn live_allocations(&self) -> usize {
        self.allocator.borrow().live_allocations()
    }

    pub fn total_allocations(&self) -> u64 {
        self.allocator.borrow().total_allocations()
    }

    pub fn double_frees(&self) -> u64 {
        self.allocator.borrow().double_frees()
    }

    /// The argument vector observed by the most recent entry call
    pub fn last_argv(&self) -> Vec<String> {
        self.last_argv.borrow().clone()
    }

    /// Emit a structured line through the installed log sink, the way a
    /// running tool would
    pub fn emit_log(&self, section: &str, indent: u32, message: &str) {
        if let Some(hooks) = &*self.hooks.borrow() {
            hooks.log.line(section, indent, message);
        }
    }

    fn parse_argv(&self, argc: i32, argv: u32) -> BridgeResult<Vec<String>> {
        let memory = self.memory.borrow();
        let mut args = Vec::with_capacity(argc as usize);
        for i in 0..argc as u32 {
            let ptr = memory.read_ptr(argv + i * POINTER_SIZE)?;
            args.push(memory.read_cstring(ptr)?);
        }
        Ok(args)
    }
}

impl ToolModule for HostedModule {
    fn install_hooks(&self, hooks: ModuleHooks) -> BridgeResult<()> {
        let hooks = Rc::new(hooks);
        if self.ready_at_install {
            let ready = Rc::clone(&hooks);
            sched::defer(move || (ready.on_ready)());
        }
        *self.hooks.borrow_mut() = Some(hooks);
        Ok(())
    }

    fn alloc(&self, len: u32) -> BridgeResult<u32> {
        self.allocator.borrow_mut().alloc(len)
    }

    fn free(&self, ptr: u32) {
        self.allocator.borrow_mut().free(ptr);
    }

    fn memory_write(&self, ptr: u32, bytes: &[u8]) -> BridgeResult<()> {
        self.memory.borrow_mut().write(ptr, bytes)
    }

    fn memory_read(&self, ptr: u32, len: u32) -> BridgeResult<Vec<u8>> {
        self.memory.borrow().read(ptr, len)
    }

    fn call_entry(&self, argc: i32, argv: u32) -> BridgeResult<i32> {
        if let Some(detail) = self.entry_failure.borrow().clone() {
            return Err(BridgeError::Module { detail });
        }

        let args = self.parse_argv(argc, argv)?;
        *self.last_argv.borrow_mut() = args.clone();

        let status = {
            let handler = self.handler.borrow();
            let mut store = self.store.borrow_mut();
            handler(&args, &mut store)
        };

        match self.style {
            CompletionStyle::InEntry => Ok(status),
            CompletionStyle::Deferred => {
                let hooks = self.hooks.borrow().clone();
                let Some(hooks) = hooks else {
                    return Err(BridgeError::Module {
                        detail: "completion hook not installed".to_string(),
                    });
                };
                // The "work" finishes on a later tick; the entry returns
                // before it, the way a tool with scheduled continuations does.
                sched::defer(move || (hooks.on_finished)(status));
                Ok(0)
            }
        }
    }

    fn fs_write(&self, path: &str, bytes: &[u8]) -> BridgeResult<()> {
        self.store.borrow_mut().write(path, bytes)
    }

    fn fs_read(&self, path: &str) -> BridgeResult<Vec<u8>> {
        self.store.borrow().read(path)
    }

    fn fs_remove(&self, path: &str) -> BridgeResult<()> {
        self.store.borrow_mut().remove(path)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::bridge::LogSink;

    fn install(module: &Rc<HostedModule>) -> Rc<RefCell<Vec<i32>>> {
        let finished = Rc::new(RefCell::new(Vec::new()));
        let capture = Rc::clone(&finished);
        module
            .install_hooks(ModuleHooks {
                on_ready: Box::new(|| {}),
                on_finished: Box::new(move |status| capture.borrow_mut().push(status)),
                log: LogSink::new(),
            })
            .unwrap();
        finished
    }

    fn write_argv(module: &HostedModule, args: &[&str]) -> (i32, u32) {
        let mut ptrs = Vec::new();
        for arg in args {
            let mut bytes = arg.as_bytes().to_vec();
            bytes.push(0);
            let ptr = module.alloc(bytes.len() as u32).unwrap();
            module.memory_write(ptr, &bytes).unwrap();
            ptrs.push(ptr);
        }
        let table = module.alloc(args.len() as u32 * POINTER_SIZE).unwrap();
        let mut table_bytes = Vec::new();
        for ptr in &ptrs {
            table_bytes.extend_from_slice(&ptr.to_le_bytes());
        }
        module.memory_write(table, &table_bytes).unwrap();
        (args.len() as i32, table)
    }

    #[test]
    fn test_entry_parses_argv_from_memory() {
        let module = HostedModule::new(CompletionStyle::InEntry);
        install(&module);
        let (argc, argv) = write_argv(&module, &["imgtool", "report", "/in.jpg"]);
        module.call_entry(argc, argv).unwrap();
        assert_eq!(module.last_argv(), vec!["imgtool", "report", "/in.jpg"]);
    }

    #[test]
    fn test_in_entry_style_returns_handler_status() {
        let module = HostedModule::new(CompletionStyle::InEntry);
        install(&module);
        module.set_handler(|_, _| 42);
        let (argc, argv) = write_argv(&module, &["imgtool"]);
        assert_eq!(module.call_entry(argc, argv).unwrap(), 42);
    }

    #[test]
    fn test_deferred_style_signals_on_later_tick() {
        let module = HostedModule::new(CompletionStyle::Deferred);
        let finished = install(&module);
        sched::run_pending();

        module.set_handler(|_, _| 5);
        let (argc, argv) = write_argv(&module, &["imgtool"]);
        // Entry returns early, no signal yet.
        assert_eq!(module.call_entry(argc, argv).unwrap(), 0);
        assert!(finished.borrow().is_empty());

        sched::run_pending();
        assert_eq!(*finished.borrow(), vec![5]);
    }

    #[test]
    fn test_handler_sees_the_filesystem() {
        let module = HostedModule::new(CompletionStyle::InEntry);
        install(&module);
        module.fs_write("/in.txt", b"abc").unwrap();
        module.set_handler(|args, store| {
            let bytes = match store.read(&args[1]) {
                Ok(bytes) => bytes,
                Err(_) => return 1,
            };
            if store.write(&args[2], &bytes).is_err() {
                return 1;
            }
            0
        });
        let (argc, argv) = write_argv(&module, &["imgtool", "/in.txt", "/out.txt"]);
        assert_eq!(module.call_entry(argc, argv).unwrap(), 0);
        assert_eq!(module.fs_read("/out.txt").unwrap(), b"abc");
    }

    #[test]
    fn test_entry_failure_injection() {
        let module = HostedModule::new(CompletionStyle::InEntry);
        install(&module);
        module.set_entry_failure("trap");
        let (argc, argv) = write_argv(&module, &["imgtool"]);
        assert!(matches!(
            module.call_entry(argc, argv),
            Err(BridgeError::Module { .. })
        ));
        module.clear_entry_failure();
        assert!(module.call_entry(argc, argv).is_ok());
    }
}
