//! Log hooks
//!
//! Two host-overridable hooks are the bridge's only textual output: a
//! structured line `(section, indent, message)` and an error message. The
//! module's own log traffic is wired into the same sink at construction, so
//! tool output and bridge misuse reports share one channel. Unset hooks
//! fall back to the console.

use std::cell::RefCell;
use std::rc::Rc;

/// Structured log line hook
pub type LineHook = Box<dyn Fn(&str, u32, &str)>;

/// Error message hook
pub type ErrorHook = Box<dyn Fn(&str)>;

/// Shared sink for bridge and module log traffic
#[derive(Default)]
pub struct LogSink {
    line: RefCell<Option<LineHook>>,
    error: RefCell<Option<ErrorHook>>,
}

impl LogSink {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Replace the line hook. `None` restores the console default.
    pub fn set_line_hook(&self, hook: Option<LineHook>) {
        *self.line.borrow_mut() = hook;
    }

    /// Replace the error hook. `None` restores the console default.
    pub fn set_error_hook(&self, hook: Option<ErrorHook>) {
        *self.error.borrow_mut() = hook;
    }

    /// Emit a structured line
    pub fn line(&self, section: &str, indent: u32, message: &str) {
        match &*self.line.borrow() {
            Some(hook) => hook(section, indent, message),
            None => crate::console_log!("[{}:{}] {}", section, indent, message),
        }
    }

    /// Emit an error message
    pub fn error(&self, message: &str) {
        match &*self.error.borrow() {
            Some(hook) => hook(message),
            None => crate::console_log!("ERROR: {}", message),
        }
    }
}
