//! Process-level fault and interrupt hooks.
//!
//! # Responsibilities
//! - Translate Ctrl-C into a shutdown trigger (when configured)
//! - Translate an escaped panic anywhere in the process into a shutdown
//!   trigger (when configured)
//! - Tear both down with the owning server instance
//!
//! # Design Decisions
//! - Hooks are owned per server instance: the panic hook chains to the
//!   previously installed one and is disarmed (not unhooked) at teardown,
//!   so multiple instances in one process never clobber each other
//! - Panics are logged and shut the server down; no restart is attempted

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownSignal;

/// Installed process-level hooks, removed by the shutdown sequence.
pub struct SignalHooks {
    interrupt_task: Option<JoinHandle<()>>,
    panic_armed: Option<Arc<AtomicBool>>,
}

impl SignalHooks {
    pub fn install(
        close_on_interrupt: bool,
        close_on_fault: bool,
        shutdown: &Arc<ShutdownSignal>,
    ) -> Self {
        let interrupt_task = close_on_interrupt.then(|| {
            let shutdown = Arc::clone(shutdown);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, terminating...");
                    shutdown.trigger();
                }
            })
        });

        let panic_armed = close_on_fault.then(|| {
            let armed = Arc::new(AtomicBool::new(true));
            let hook_armed = Arc::clone(&armed);
            let shutdown = Arc::clone(shutdown);
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                if hook_armed.load(Ordering::SeqCst) {
                    tracing::error!(panic = %info, "uncaught fault, shutting down");
                    shutdown.trigger();
                }
                previous(info);
            }));
            armed
        });

        Self {
            interrupt_task,
            panic_armed,
        }
    }

    /// Release the interrupt listener and disarm the panic hook.
    pub fn remove(self) {
        drop(self);
    }
}

impl Drop for SignalHooks {
    fn drop(&mut self) {
        if let Some(task) = self.interrupt_task.take() {
            task.abort();
        }
        if let Some(armed) = self.panic_armed.take() {
            armed.store(false, Ordering::SeqCst);
        }
    }
}
