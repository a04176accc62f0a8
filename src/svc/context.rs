/*!
 * Call Dispatch
 * Entry point the CPU core invokes on an SVC instruction
 */

use std::sync::Arc;

use log::{debug, error};
use parking_lot::Mutex as SyncMutex;

use crate::kernel::Kernel;
use crate::objects::ThreadStatus;

use super::cpu::GuestCpu;
use super::{table, Svc};

/// Shared dispatch state. One instance serves every core; a single lock
/// serializes all HLE kernel work.
pub struct SvcContext {
    kernel: Arc<SyncMutex<Kernel>>,
}

impl SvcContext {
    #[must_use]
    pub fn new(kernel: Arc<SyncMutex<Kernel>>) -> Self {
        Self { kernel }
    }

    #[must_use]
    pub fn kernel(&self) -> &Arc<SyncMutex<Kernel>> {
        &self.kernel
    }

    /// Dispatches the call encoded by `immediate` on behalf of the current
    /// thread. Unknown and unimplemented calls leave the registers untouched.
    pub fn call_svc(&self, cpu: &mut dyn GuestCpu, immediate: u32) {
        let mut kernel = self.kernel.lock();

        let Some(thread) = kernel.current_thread() else {
            error!("SVC {immediate:#04x} issued with no current thread");
            return;
        };

        let Some(def) = table::lookup(immediate) else {
            error!("unknown SVC {immediate:#04x} called at {:#010x}", cpu.pc());
            return;
        };

        let Some(handler) = def.handler else {
            error!(
                "unimplemented SVC {:#04x} ({}) called at {:#010x}",
                immediate,
                def.name,
                cpu.pc()
            );
            return;
        };

        debug!("SVC {:#04x} ({})", immediate, def.name);
        {
            let mut svc = Svc {
                kernel: &mut kernel,
                cpu,
                thread: Arc::clone(&thread),
            };
            handler(&mut svc);
        }

        // If the call blocked or killed the thread, snapshot the registers so
        // wakeup callbacks can patch the return values before it resumes.
        if thread.status() != ThreadStatus::Running {
            let mut regs = [0u32; 16];
            for (i, reg) in regs.iter_mut().enumerate() {
                *reg = cpu.reg(i);
            }
            thread.save_context(regs);
        }
    }
}
