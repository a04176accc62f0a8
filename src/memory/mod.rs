/*!
 * Guest Memory
 * Physical memory regions, per-process address spaces, and typed access
 */

pub mod guest;
pub mod layout;
pub mod region;
pub mod vma;

pub use guest::GuestMemory;
pub use region::{MemoryRegion, MemoryRegionKind};
pub use vma::{MemoryInfo, MemoryState, VirtualMemoryArea, VmManager};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Guest-visible page permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MemoryPermission: u32 {
        const READ = 1;
        const WRITE = 2;
        const READ_WRITE = 3;
        const EXECUTE = 4;
        const READ_EXECUTE = 5;
        /// Caller defers to the kernel's choice of permissions.
        const DONT_CARE = 0x1000_0000;
    }
}

impl MemoryPermission {
    pub const NONE: MemoryPermission = MemoryPermission::empty();
}
