/*!
 * Supervisor Calls
 * Dispatch table, register marshaling, and the call handlers
 */

mod context;
mod cpu;
mod debug;
mod info;
mod ipc;
mod memory;
mod process;
mod sync;
mod table;
mod thread;
mod wrap;

pub use context::SvcContext;
pub use cpu::{GuestCpu, RegisterFile};
pub use table::{lookup, SvcDef, SVC_TABLE};

use std::sync::Arc;

use crate::core::result::{ResultCode, ERR_INVALID_HANDLE};
use crate::kernel::Kernel;
use crate::objects::{Process, Thread};

/// Execution context of a single supervisor call. Handlers are methods on
/// this; `wrap` pulls arguments out of the registers and writes results back.
pub struct Svc<'a> {
    pub(crate) kernel: &'a mut Kernel,
    pub(crate) cpu: &'a mut dyn GuestCpu,
    /// The thread that issued the call.
    pub(crate) thread: Arc<Thread>,
}

impl Svc<'_> {
    fn current_process(&self) -> Result<Arc<Process>, ResultCode> {
        self.thread.owner.upgrade().ok_or(ERR_INVALID_HANDLE)
    }
}
