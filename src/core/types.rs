/*!
 * Core Types
 * Common types used across the kernel model
 */

/// Opaque per-process capability referencing a kernel object
pub type Handle = u32;

/// Guest virtual address
pub type VAddr = u32;

/// Process ID type
pub type ProcessId = u32;

/// Thread ID type
pub type ThreadId = u32;

/// Thread priority (0 = highest, 63 = lowest)
pub type Priority = u32;

/// Time in nanoseconds of emulated time
pub type Nanoseconds = i64;

/// Highest (most privileged) thread priority
pub const THREAD_PRIO_HIGHEST: Priority = 0;

/// Lowest thread priority accepted by thread operations
pub const THREAD_PRIO_LOWEST: Priority = 63;

/// Pseudo-handle resolving to the calling thread
pub const CURRENT_THREAD: Handle = 0xFFFF_8000;

/// Pseudo-handle resolving to the calling process
pub const CURRENT_PROCESS: Handle = 0xFFFF_8001;

/// Processor id meaning "use the owning process's ideal processor"
pub const PROCESSOR_ID_DEFAULT: i32 = -2;

/// Processor id meaning "any core"
pub const PROCESSOR_ID_ALL: i32 = -1;
