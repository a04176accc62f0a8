/*!
 * HLE Kernel Library
 * In-process model of a handheld console microkernel's supervisor-call surface
 */

pub mod core;
pub mod ipc;
pub mod kernel;
pub mod memory;
pub mod objects;
pub mod svc;

// Re-exports
pub use crate::core::config::KernelConfig;
pub use crate::core::result::{ResultCode, RESULT_SUCCESS, RESULT_TIMEOUT};
pub use crate::core::types::{Handle, Priority, ProcessId, ThreadId, VAddr};
pub use kernel::Kernel;
pub use memory::{GuestMemory, MemoryPermission};
pub use objects::{AnyObject, HandleType, Process, ResetType, Thread, ThreadStatus};
pub use svc::{GuestCpu, RegisterFile, SvcContext};

/// Initialize logging from the environment.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
