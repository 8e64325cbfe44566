//! Readiness gate
//!
//! The module may not be invoked until its runtime has initialized. The
//! gate is a one-shot latch: callbacks registered before the signal are
//! queued and fired on the tick after it arrives; callbacks registered
//! after readiness still fire, on the next tick. The latch never resets.

use std::cell::RefCell;
use std::rc::Rc;

use crate::sched;

enum GateState {
    Waiting(Vec<Box<dyn FnOnce()>>),
    Ready,
}

/// One-shot readiness latch
pub struct ReadyGate {
    state: RefCell<GateState>,
}

impl ReadyGate {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(GateState::Waiting(Vec::new())),
        })
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), GateState::Ready)
    }

    /// Register a callback for readiness. Never dropped, never invoked
    /// synchronously: a late registration fires on the next tick.
    pub fn on_ready(&self, f: impl FnOnce() + 'static) {
        match &mut *self.state.borrow_mut() {
            GateState::Waiting(waiters) => waiters.push(Box::new(f)),
            GateState::Ready => sched::defer(f),
        }
    }

    /// Flip the latch. The first signal defers every queued waiter; repeat
    /// signals are no-ops.
    pub fn signal(&self) {
        let prev = std::mem::replace(&mut *self.state.borrow_mut(), GateState::Ready);
        if let GateState::Waiting(waiters) = prev {
            for f in waiters {
                sched::defer(f);
            }
        }
    }
}
