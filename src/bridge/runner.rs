//! Execution invoker
//!
//! [`ToolBridge`] ties the pieces together: readiness gating, argument
//! marshaling, the entry call, and completion delivery. The call shape is
//! fixed per bridge by [`ExecMode`] because it reflects how the tool was
//! compiled - whether its entry point finishes the work before returning -
//! not how a call site would prefer to wait.

use std::fmt;
use std::rc::Rc;

use futures::channel::oneshot;

use super::error::{BridgeError, BridgeResult};
use super::logging::LogSink;
use super::marshal::{self, ArgvBlock};
use super::notify::{CompletionSlot, Pending};
use super::ready::ReadyGate;
use super::vfs::VirtualFs;
use crate::module::{ModuleHooks, ToolModule};
use crate::sched;

/// How the module delivers completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// The entry point returns only after the tool has finished; buffers
    /// are released as soon as the call returns.
    Immediate,
    /// The entry point may return while work is still scheduled inside the
    /// module; buffers are held until the completion hook fires.
    Deferred,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Deferred => write!(f, "deferred"),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Fixed argv[0] token the tool's CLI parser expects
    pub program_name: String,
    /// Completion shape the tool was compiled with
    pub exec: ExecMode,
}

impl BridgeConfig {
    pub fn new(program_name: &str, exec: ExecMode) -> Self {
        Self {
            program_name: program_name.to_string(),
            exec,
        }
    }
}

/// Host-to-module execution bridge
pub struct ToolBridge {
    module: Rc<dyn ToolModule>,
    config: BridgeConfig,
    gate: Rc<ReadyGate>,
    slot: Rc<CompletionSlot>,
    log: Rc<LogSink>,
}

impl ToolBridge {
    /// Wrap a module. Installs the readiness and completion hooks once; the
    /// module signals through them from here on.
    pub fn new(module: Rc<dyn ToolModule>, config: BridgeConfig) -> BridgeResult<Self> {
        let log = LogSink::new();
        let gate = ReadyGate::new();
        let slot = CompletionSlot::new(Rc::clone(&log));

        let hooks = ModuleHooks {
            on_ready: {
                let gate = Rc::clone(&gate);
                Box::new(move || gate.signal())
            },
            on_finished: {
                let slot = Rc::clone(&slot);
                Box::new(move |status| slot.fire(status))
            },
            log: Rc::clone(&log),
        };
        module.install_hooks(hooks)?;

        Ok(Self {
            module,
            config,
            gate,
            slot,
            log,
        })
    }

    /// The shared log sink; hosts override the line/error hooks through it
    pub fn log(&self) -> &Rc<LogSink> {
        &self.log
    }

    /// Register a callback for module readiness
    pub fn on_ready(&self, f: impl FnOnce() + 'static) {
        self.gate.on_ready(f);
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Handle on the module's filesystem namespace
    pub fn fs(&self) -> VirtualFs {
        VirtualFs::new(Rc::clone(&self.module), Rc::clone(&self.gate))
    }

    fn check_ready(&self) -> BridgeResult<()> {
        if self.gate.is_ready() {
            Ok(())
        } else {
            Err(BridgeError::NotReady)
        }
    }

    fn marshal(&self, args: &[String]) -> BridgeResult<ArgvBlock> {
        marshal::marshal_args(&self.module, &self.config.program_name, args)
    }

    /// Run the tool and block until its entry point returns the status.
    ///
    /// Only valid in [`ExecMode::Immediate`]: a deferred-completion tool
    /// may still have work scheduled when the entry returns, so there is no
    /// status to hand back yet.
    pub fn invoke_blocking(&self, args: &[String]) -> BridgeResult<i32> {
        if self.config.exec != ExecMode::Immediate {
            return Err(BridgeError::ModeMismatch {
                mode: self.config.exec,
            });
        }
        self.check_ready()?;
        let block = self.marshal(args)?;
        let status = self.module.call_entry(block.argc(), block.argv())?;
        drop(block);
        Ok(status)
    }

    /// Run the tool; `on_done` receives the exit status on a later tick.
    ///
    /// In deferred mode the marshaled buffers move into the completion slot
    /// and stay alive until the module signals, and at most one such
    /// invocation may be in flight.
    pub fn invoke(
        &self,
        args: &[String],
        on_done: impl FnOnce(i32) + 'static,
    ) -> BridgeResult<()> {
        self.check_ready()?;
        match self.config.exec {
            ExecMode::Immediate => {
                let block = self.marshal(args)?;
                let status = self.module.call_entry(block.argc(), block.argv())?;
                drop(block);
                sched::defer(move || on_done(status));
                Ok(())
            }
            ExecMode::Deferred => {
                // Checked before marshaling so a doomed call allocates nothing.
                if self.slot.is_armed() {
                    return Err(BridgeError::InvocationPending);
                }
                let block = self.marshal(args)?;
                let (argc, argv) = (block.argc(), block.argv());
                self.slot.arm(Pending {
                    block,
                    on_done: Box::new(on_done),
                })?;
                if let Err(err) = self.module.call_entry(argc, argv) {
                    // The module may have signaled completion from inside
                    // the entry before trapping; roll back only if it did not.
                    if self.slot.is_armed() {
                        self.slot.disarm();
                        return Err(err);
                    }
                }
                Ok(())
            }
        }
    }

    /// Future-shaped variant of [`invoke`]. The receiver resolves with the
    /// exit status once completion has been delivered.
    pub fn invoke_future(&self, args: &[String]) -> BridgeResult<oneshot::Receiver<i32>> {
        let (tx, rx) = oneshot::channel();
        self.invoke(args, move |status| {
            let _ = tx.send(status);
        })?;
        Ok(rx)
    }
}
