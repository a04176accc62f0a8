/*!
 * Shared Memory
 * FCRAM blocks mappable into multiple address spaces
 */

use parking_lot::Mutex as SyncMutex;

use crate::core::result::{ResultCode, ERR_INVALID_COMBINATION};
use crate::core::types::{ProcessId, VAddr};
use crate::memory::MemoryPermission;

/// A block of physical memory that processes map on demand.
pub struct SharedMemory {
    pub name: String,
    /// FCRAM offset of the backing block.
    pub backing_offset: u32,
    pub size: u32,
    /// Permissions the creating process maps with.
    pub owner_permissions: MemoryPermission,
    /// Permissions any other process maps with.
    pub other_permissions: MemoryPermission,
    pub owner_process_id: ProcessId,
    /// Mappings currently live, for unmap bookkeeping.
    mappings: SyncMutex<Vec<(ProcessId, VAddr)>>,
}

impl SharedMemory {
    pub fn new(
        name: String,
        backing_offset: u32,
        size: u32,
        owner_permissions: MemoryPermission,
        other_permissions: MemoryPermission,
        owner_process_id: ProcessId,
    ) -> Self {
        Self {
            name,
            backing_offset,
            size,
            owner_permissions,
            other_permissions,
            owner_process_id,
            mappings: SyncMutex::new(Vec::new()),
        }
    }

    /// Permissions `process_id` is allowed to map with. A request of
    /// DONT_CARE takes the allowed set as-is.
    pub fn effective_permissions(
        &self,
        process_id: ProcessId,
        requested: MemoryPermission,
    ) -> Result<MemoryPermission, ResultCode> {
        let allowed = if process_id == self.owner_process_id {
            self.owner_permissions
        } else {
            self.other_permissions
        };
        if requested.contains(MemoryPermission::DONT_CARE) {
            return Ok(allowed);
        }
        if allowed.contains(requested) {
            Ok(requested)
        } else {
            Err(ERR_INVALID_COMBINATION)
        }
    }

    pub fn record_mapping(&self, process_id: ProcessId, addr: VAddr) {
        self.mappings.lock().push((process_id, addr));
    }

    /// Removes a recorded mapping, returning whether it existed.
    pub fn remove_mapping(&self, process_id: ProcessId, addr: VAddr) -> bool {
        let mut mappings = self.mappings.lock();
        let before = mappings.len();
        mappings.retain(|&(pid, a)| !(pid == process_id && a == addr));
        mappings.len() != before
    }
}
