/*!
 * Memory Calls
 * Heap control, shared memory blocks, queries, and cross-process maps
 */

use std::sync::Arc;

use log::{debug, error, warn};

use crate::core::result::{
    ResultCode, ERR_INVALID_ADDRESS, ERR_INVALID_ADDRESS_STATE, ERR_INVALID_COMBINATION,
    ERR_INVALID_HANDLE, ERR_MISALIGNED_ADDRESS, ERR_MISALIGNED_SIZE, ERR_OUT_OF_MEMORY,
};
use crate::core::types::{Handle, VAddr, CURRENT_PROCESS};
use crate::memory::layout::{
    FCRAM_PADDR, HEAP_VADDR, HEAP_VADDR_END, LINEAR_HEAP_VADDR, LINEAR_HEAP_VADDR_END, PAGE_MASK,
    PAGE_SIZE, PROCESS_IMAGE_VADDR, SHARED_MEMORY_VADDR_END,
};
use crate::memory::{MemoryInfo, MemoryPermission, MemoryRegionKind, MemoryState};
use crate::objects::{AnyObject, ResourceLimitType, SharedMemory};

use super::Svc;

const MEMOP_FREE: u32 = 1;
const MEMOP_COMMIT: u32 = 3;
const MEMOP_MAP: u32 = 4;
const MEMOP_UNMAP: u32 = 5;
const MEMOP_PROTECT: u32 = 6;
const MEMOP_OPERATION_MASK: u32 = 0xFF;
const MEMOP_REGION_MASK: u32 = 0xF00;
const MEMOP_LINEAR: u32 = 0x10000;

const CONTROL_PERM_MASK: u32 = MemoryPermission::READ_WRITE.bits();

impl Svc<'_> {
    pub(super) fn op_control_memory(
        &mut self,
        operation: u32,
        addr0: VAddr,
        addr1: VAddr,
        size: u32,
        permissions: u32,
    ) -> Result<u32, ResultCode> {
        debug!(
            "ControlMemory op={operation:#x} addr0={addr0:#010x} addr1={addr1:#010x} \
             size={size:#x} permissions={permissions:#x}"
        );
        let process = self.current_process()?;

        if addr0 & PAGE_MASK != 0 || addr1 & PAGE_MASK != 0 {
            return Err(ERR_MISALIGNED_ADDRESS);
        }
        if size & PAGE_MASK != 0 {
            return Err(ERR_MISALIGNED_SIZE);
        }

        let region = operation & MEMOP_REGION_MASK;
        if region != 0 {
            warn!("ControlMemory region flags {region:#x} ignored");
        }

        if permissions & CONTROL_PERM_MASK != permissions {
            return Err(ERR_INVALID_COMBINATION);
        }
        let vma_permissions =
            MemoryPermission::from_bits(permissions).ok_or(ERR_INVALID_COMBINATION)?;

        match operation & MEMOP_OPERATION_MASK {
            MEMOP_FREE => {
                if addr0 >= HEAP_VADDR && addr0 < HEAP_VADDR_END {
                    self.kernel.heap_free(&process, addr0, size)?;
                } else if addr0 >= LINEAR_HEAP_VADDR && addr0 < LINEAR_HEAP_VADDR_END {
                    self.kernel.linear_free(&process, addr0, size)?;
                } else {
                    return Err(ERR_INVALID_ADDRESS);
                }
                Ok(addr0)
            }
            MEMOP_COMMIT => {
                if operation & MEMOP_LINEAR != 0 {
                    self.kernel
                        .linear_allocate(&process, addr0, size, vma_permissions)
                } else {
                    self.kernel
                        .heap_allocate(&process, addr0, size, vma_permissions)
                }
            }
            MEMOP_MAP => {
                self.kernel
                    .map_alias(&process, addr0, addr1, size, vma_permissions)?;
                Ok(addr0)
            }
            MEMOP_UNMAP => {
                self.kernel.unmap_alias(&process, addr0, addr1, size)?;
                Ok(addr0)
            }
            MEMOP_PROTECT => {
                process
                    .vm_manager
                    .lock()
                    .reprotect(addr0, size, vma_permissions)?;
                Ok(addr0)
            }
            op => {
                error!("ControlMemory unknown operation {op:#x}");
                Err(ERR_INVALID_COMBINATION)
            }
        }
    }

    pub(super) fn op_query_memory(&mut self, addr: VAddr) -> Result<MemoryInfo, ResultCode> {
        self.op_query_process_memory(CURRENT_PROCESS, addr)
    }

    pub(super) fn op_query_process_memory(
        &mut self,
        process_handle: Handle,
        addr: VAddr,
    ) -> Result<MemoryInfo, ResultCode> {
        let process = self
            .kernel
            .object_for_handle(process_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        let vm = process.vm_manager.lock();
        vm.query(addr).ok_or(ERR_INVALID_ADDRESS)
    }

    pub(super) fn op_create_memory_block(
        &mut self,
        addr: VAddr,
        size: u32,
        my_permission: u32,
        other_permission: u32,
    ) -> Result<Handle, ResultCode> {
        if size & PAGE_MASK != 0 {
            return Err(ERR_MISALIGNED_SIZE);
        }

        // Executable shared memory is never allowed.
        let verify = |raw: u32| -> Result<MemoryPermission, ResultCode> {
            match raw {
                0 | 1 | 2 | 3 => MemoryPermission::from_bits(raw).ok_or(ERR_INVALID_COMBINATION),
                raw if raw == MemoryPermission::DONT_CARE.bits() => {
                    Ok(MemoryPermission::DONT_CARE)
                }
                _ => Err(ERR_INVALID_COMBINATION),
            }
        };
        let owner_permissions = verify(my_permission)?;
        let other_permissions = verify(other_permission)?;

        if addr != 0 && !(PROCESS_IMAGE_VADDR..SHARED_MEMORY_VADDR_END).contains(&addr) {
            return Err(ERR_INVALID_ADDRESS);
        }

        let process = self.current_process()?;
        let backing_offset = if addr == 0 {
            self.kernel
                .region_mut(MemoryRegionKind::Application)
                .allocate(size)
                .ok_or(ERR_OUT_OF_MEMORY)?
        } else {
            // Backed by memory the process already committed at addr.
            process
                .vm_manager
                .lock()
                .translate(addr)
                .map_err(|_| ERR_INVALID_ADDRESS)?
        };

        let block = Arc::new(SharedMemory::new(
            format!("shmem-{addr:#x}"),
            backing_offset,
            size,
            owner_permissions,
            other_permissions,
            process.process_id,
        ));
        process
            .resource_limit
            .add_used(ResourceLimitType::SharedMemory, 1);
        process.handle_table.create(AnyObject::SharedMemory(block))
    }

    pub(super) fn op_map_memory_block(
        &mut self,
        handle: Handle,
        addr: VAddr,
        permissions: u32,
        _other_permissions: u32,
    ) -> Result<(), ResultCode> {
        let block = match self.kernel.object_for_handle(handle)? {
            AnyObject::SharedMemory(block) => block,
            _ => return Err(ERR_INVALID_HANDLE),
        };

        let requested = match permissions {
            1..=7 => MemoryPermission::from_bits(permissions).ok_or(ERR_INVALID_COMBINATION)?,
            raw if raw == MemoryPermission::DONT_CARE.bits() => MemoryPermission::DONT_CARE,
            _ => return Err(ERR_INVALID_COMBINATION),
        };

        if addr == 0 {
            warn!("MapMemoryBlock to address 0 is not supported");
            return Err(ERR_INVALID_ADDRESS);
        }

        let process = self.current_process()?;
        let effective = block.effective_permissions(process.process_id, requested)?;
        process.vm_manager.lock().map_backed(
            addr,
            block.size,
            block.backing_offset,
            MemoryState::Shared,
            effective,
        )?;
        block.record_mapping(process.process_id, addr);
        Ok(())
    }

    pub(super) fn op_unmap_memory_block(
        &mut self,
        handle: Handle,
        addr: VAddr,
    ) -> Result<(), ResultCode> {
        let block = match self.kernel.object_for_handle(handle)? {
            AnyObject::SharedMemory(block) => block,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        let process = self.current_process()?;
        if !block.remove_mapping(process.process_id, addr) {
            return Err(ERR_INVALID_ADDRESS);
        }
        let mut vm = process.vm_manager.lock();
        if !vm.range_has_state(addr, block.size, &[MemoryState::Shared]) {
            return Err(ERR_INVALID_ADDRESS);
        }
        // The backing stays with the block object.
        let _ = vm.unmap(addr, block.size);
        Ok(())
    }

    pub(super) fn op_convert_va_to_pa(&mut self, addr: VAddr) -> u32 {
        let Ok(process) = self.current_process() else {
            return 0;
        };
        let translated = process.vm_manager.lock().translate(addr);
        match translated {
            Ok(offset) => FCRAM_PADDR + offset,
            Err(_) => {
                warn!("ConvertVaToPa on unmapped address {addr:#010x}");
                0
            }
        }
    }

    pub(super) fn op_map_process_memory_ex(
        &mut self,
        dst_handle: Handle,
        dst_addr: VAddr,
        src_handle: Handle,
        src_addr: VAddr,
        size: u32,
    ) -> Result<(), ResultCode> {
        let dst_process = self
            .kernel
            .object_for_handle(dst_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        let src_process = self
            .kernel
            .object_for_handle(src_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;

        let size = round_up_to_page(size);

        let (backing_offset, length_ok) = {
            let vm = src_process.vm_manager.lock();
            let Some(vma) = vm.find_vma(src_addr) else {
                return Err(ERR_INVALID_ADDRESS);
            };
            if vma.state != MemoryState::Continuous {
                return Err(ERR_INVALID_ADDRESS);
            }
            let Some(offset) = vma.backing_offset else {
                return Err(ERR_INVALID_ADDRESS);
            };
            (
                offset + (src_addr - vma.base),
                src_addr.saturating_add(size) <= vma.end(),
            )
        };
        if !length_ok {
            return Err(ERR_INVALID_ADDRESS);
        }

        let mut vm = dst_process.vm_manager.lock();
        vm.map_backed(
            dst_addr,
            size,
            backing_offset,
            MemoryState::Continuous,
            MemoryPermission::READ_WRITE,
        )
        .map_err(|_| ERR_INVALID_ADDRESS_STATE)?;
        vm.reprotect(
            dst_addr,
            size,
            MemoryPermission::READ_WRITE | MemoryPermission::EXECUTE,
        )?;
        Ok(())
    }

    pub(super) fn op_unmap_process_memory_ex(
        &mut self,
        process_handle: Handle,
        addr: VAddr,
        size: u32,
    ) -> Result<(), ResultCode> {
        let process = self
            .kernel
            .object_for_handle(process_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        let size = round_up_to_page(size);
        let mut vm = process.vm_manager.lock();
        if !vm.range_has_state(addr, size, &[MemoryState::Continuous]) {
            return Err(ERR_INVALID_ADDRESS);
        }
        // Shared backing; the source mapping keeps it allocated.
        let _ = vm.unmap(addr, size);
        Ok(())
    }
}

#[inline]
#[must_use]
fn round_up_to_page(size: u32) -> u32 {
    if size & PAGE_MASK != 0 {
        (size & !PAGE_MASK) + PAGE_SIZE
    } else {
        size
    }
}
