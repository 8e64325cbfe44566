//! Next-tick dispatch
//!
//! Readiness and completion callbacks are never invoked inline: they run on
//! the next scheduler tick, after the triggering call stack (usually the
//! module's own) has unwound.
//!
//! On wasm32 a zero-delay `setTimeout` provides the tick. Natively the
//! deferred work lands in a thread-local FIFO that callers drain with
//! [`run_pending`], which is what keeps the test suite deterministic.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;

/// Schedule `f` to run on the next tick
#[cfg(target_arch = "wasm32")]
pub fn defer(f: impl FnOnce() + 'static) {
    let callback = Closure::once_into_js(f);
    let Some(window) = web_sys::window() else {
        return;
    };
    let _ = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0);
}

#[cfg(not(target_arch = "wasm32"))]
mod queue {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    thread_local! {
        static PENDING: RefCell<VecDeque<Box<dyn FnOnce()>>> =
            RefCell::new(VecDeque::new());
    }

    pub fn push(f: Box<dyn FnOnce()>) {
        PENDING.with(|q| q.borrow_mut().push_back(f));
    }

    pub fn pop() -> Option<Box<dyn FnOnce()>> {
        PENDING.with(|q| q.borrow_mut().pop_front())
    }
}

/// Schedule `f` to run on the next [`run_pending`] pump
#[cfg(not(target_arch = "wasm32"))]
pub fn defer(f: impl FnOnce() + 'static) {
    queue::push(Box::new(f));
}

/// Drain the deferred queue in FIFO order, including work queued while
/// draining. Returns the number of callbacks run.
#[cfg(not(target_arch = "wasm32"))]
pub fn run_pending() -> usize {
    let mut ran = 0;
    // Pop one at a time so a callback may defer more work without holding
    // the queue borrow.
    while let Some(f) = queue::pop() {
        f();
        ran += 1;
    }
    ran
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn runs_in_fifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            defer(move || order.borrow_mut().push(i));
        }
        assert_eq!(run_pending(), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn nested_defer_runs_in_same_pump() {
        let hits = Rc::new(RefCell::new(0));
        let inner = Rc::clone(&hits);
        defer(move || {
            let inner2 = Rc::clone(&inner);
            defer(move || *inner2.borrow_mut() += 1);
        });
        assert_eq!(run_pending(), 2);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn empty_queue_is_a_noop() {
        assert_eq!(run_pending(), 0);
    }
}
