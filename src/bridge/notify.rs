//! Completion notification
//!
//! A deferred execution parks its marshaled buffers and continuation in a
//! single slot until the module fires the completion hook. The slot is a
//! two-state machine: idle -> armed when an invocation is issued, armed ->
//! idle when the hook fires. One slot, one invocation in flight.

use std::cell::RefCell;
use std::rc::Rc;

use super::error::{BridgeError, BridgeResult};
use super::logging::LogSink;
use super::marshal::ArgvBlock;
use crate::sched;

/// Continuation invoked with the tool's exit status
pub type Continuation = Box<dyn FnOnce(i32)>;

/// An armed invocation: the buffers kept alive for the module plus the
/// caller's continuation
pub struct Pending {
    pub block: ArgvBlock,
    pub on_done: Continuation,
}

/// Single-slot completion state machine
pub struct CompletionSlot {
    slot: RefCell<Option<Pending>>,
    log: Rc<LogSink>,
}

impl CompletionSlot {
    pub fn new(log: Rc<LogSink>) -> Rc<Self> {
        Rc::new(Self {
            slot: RefCell::new(None),
            log,
        })
    }

    /// Whether an invocation is in flight
    pub fn is_armed(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Park an invocation in the slot.
    ///
    /// Rejected while armed: the in-flight state is left untouched and the
    /// rejected pending's buffers are released by its drop.
    pub fn arm(&self, pending: Pending) -> BridgeResult<()> {
        let mut slot = self.slot.borrow_mut();
        if slot.is_some() {
            return Err(BridgeError::InvocationPending);
        }
        *slot = Some(pending);
        Ok(())
    }

    /// Completion hook: release the buffer set, clear the slot, then hand
    /// the status to the continuation on the next tick so the module's own
    /// call stack unwinds first.
    ///
    /// Firing while idle is reported and otherwise ignored; with nothing
    /// armed there is nothing to free twice.
    pub fn fire(&self, status: i32) {
        let pending = self.slot.borrow_mut().take();
        match pending {
            Some(Pending { block, on_done }) => {
                drop(block);
                sched::defer(move || on_done(status));
            }
            None => self
                .log
                .error("completion signaled with no invocation in flight"),
        }
    }

    /// Cancel an armed invocation without running its continuation.
    ///
    /// Used when the entry call itself fails after arming; the buffers are
    /// released by the pending's drop.
    pub fn disarm(&self) {
        let _ = self.slot.borrow_mut().take();
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::bridge::marshal::marshal_args;
    use crate::module::{CompletionStyle, HostedModule, ToolModule};

    fn pending(module: &Rc<dyn ToolModule>, on_done: impl FnOnce(i32) + 'static) -> Pending {
        Pending {
            block: marshal_args(module, "imgtool", &[]).unwrap(),
            on_done: Box::new(on_done),
        }
    }

    #[test]
    fn test_arm_fire_transitions_once() {
        let hosted = HostedModule::new(CompletionStyle::InEntry);
        let module: Rc<dyn ToolModule> = hosted.clone();
        let slot = CompletionSlot::new(LogSink::new());

        let seen = Rc::new(RefCell::new(None));
        let capture = Rc::clone(&seen);
        slot.arm(pending(&module, move |status| {
            *capture.borrow_mut() = Some(status)
        }))
        .unwrap();
        assert!(slot.is_armed());

        slot.fire(3);
        assert!(!slot.is_armed());
        // Buffers released on fire, continuation deferred to the next tick.
        assert_eq!(hosted.live_allocations(), 0);
        assert_eq!(*seen.borrow(), None);
        crate::sched::run_pending();
        assert_eq!(*seen.borrow(), Some(3));
    }

    #[test]
    fn test_second_arm_rejected_without_corruption() {
        let hosted = HostedModule::new(CompletionStyle::InEntry);
        let module: Rc<dyn ToolModule> = hosted.clone();
        let slot = CompletionSlot::new(LogSink::new());

        let first_done = Rc::new(RefCell::new(false));
        let capture = Rc::clone(&first_done);
        slot.arm(pending(&module, move |_| *capture.borrow_mut() = true))
            .unwrap();
        let first_live = hosted.live_allocations();

        let result = slot.arm(pending(&module, |_| {}));
        assert!(matches!(result, Err(BridgeError::InvocationPending)));
        // The rejected pending freed its own buffers; the armed one is intact.
        assert_eq!(hosted.live_allocations(), first_live);
        assert!(slot.is_armed());

        slot.fire(0);
        crate::sched::run_pending();
        assert!(*first_done.borrow());
        assert_eq!(hosted.live_allocations(), 0);
        assert_eq!(hosted.double_frees(), 0);
    }

    #[test]
    fn test_fire_while_idle_reports_not_frees() {
        let log = LogSink::new();
        let reports = Rc::new(RefCell::new(0));
        let capture = Rc::clone(&reports);
        log.set_error_hook(Some(Box::new(move |_| *capture.borrow_mut() += 1)));

        let slot = CompletionSlot::new(log);
        slot.fire(0);
        slot.fire(1);
        assert_eq!(*reports.borrow(), 2);
        assert_eq!(crate::sched::run_pending(), 0);
    }

    #[test]
    fn test_disarm_drops_continuation() {
        let hosted = HostedModule::new(CompletionStyle::InEntry);
        let module: Rc<dyn ToolModule> = hosted.clone();
        let slot = CompletionSlot::new(LogSink::new());

        let called = Rc::new(RefCell::new(false));
        let capture = Rc::clone(&called);
        slot.arm(pending(&module, move |_| *capture.borrow_mut() = true))
            .unwrap();
        slot.disarm();

        assert!(!slot.is_armed());
        assert_eq!(hosted.live_allocations(), 0);
        crate::sched::run_pending();
        assert!(!*called.borrow());
    }
}
