/*!
 * Process Calls
 * Exit, lookup, resource limits, and the extended process controls
 */

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::core::result::{
    ResultCode, ERR_INVALID_HANDLE, ERR_INVALID_POINTER, ERR_NOT_FOUND, ERR_NOT_IMPLEMENTED,
    ERR_OUT_OF_RANGE, ERR_PROCESS_NOT_FOUND,
};
use crate::core::types::{Handle, ProcessId, VAddr};
use crate::memory::{MemoryPermission, MemoryState};
use crate::objects::{AnyObject, ProcessStatus, ResourceLimitType, ThreadStatus};

use super::Svc;

const KERNEL_STATE_SHUTDOWN: u32 = 7;

// ControlProcess operations.
const PROCESSOP_SET_MMU_TO_RWX: u32 = 1;
const PROCESSOP_GET_ON_MEMORY_CHANGE_EVENT: u32 = 2;
const PROCESSOP_SCHEDULE_THREADS_WITHOUT_TLS_MAGIC: u32 = 6;
const PROCESSOP_DISABLE_CREATE_THREAD_RESTRICTIONS: u32 = 7;

impl Svc<'_> {
    pub(super) fn op_exit_process(&mut self) {
        let Ok(process) = self.current_process() else {
            error!("ExitProcess with no owning process");
            return;
        };
        info!("process {} exiting", process.process_id);

        if process.status() != ProcessStatus::Running {
            error!(
                "process {} exited while in state {:?}",
                process.process_id,
                process.status()
            );
        }
        process.set_status(ProcessStatus::Exited);

        // Stop every sibling thread, then the caller itself.
        for thread in process.threads() {
            if Arc::ptr_eq(&thread, &self.thread) {
                continue;
            }
            let status = thread.status();
            if !matches!(status, ThreadStatus::WaitSynchAny | ThreadStatus::WaitSynchAll) {
                error!(
                    "thread {} still active ({status:?}) during process exit",
                    thread.thread_id
                );
            }
            self.kernel.stop_thread(&thread);
        }
        self.kernel.stop_thread(&self.thread);
        self.kernel.set_current_thread(None);
        self.kernel.remove_process(&process);
    }

    pub(super) fn op_open_process(&mut self, process_id: ProcessId) -> Result<Handle, ResultCode> {
        let target = self
            .kernel
            .process_by_id(process_id)
            .ok_or(ERR_PROCESS_NOT_FOUND)?;
        let process = self.current_process()?;
        process.handle_table.create(AnyObject::Process(target))
    }

    pub(super) fn op_get_process_id(&mut self, handle: Handle) -> Result<u32, ResultCode> {
        let process = self
            .kernel
            .object_for_handle(handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        Ok(process.process_id)
    }

    pub(super) fn op_get_process_id_of_thread(
        &mut self,
        handle: Handle,
    ) -> Result<u32, ResultCode> {
        let thread = self
            .kernel
            .object_for_handle(handle)?
            .as_thread()
            .ok_or(ERR_INVALID_HANDLE)?;
        let owner = thread.owner.upgrade().ok_or(ERR_PROCESS_NOT_FOUND)?;
        Ok(owner.process_id)
    }

    pub(super) fn op_get_resource_limit(
        &mut self,
        process_handle: Handle,
    ) -> Result<Handle, ResultCode> {
        let target = self
            .kernel
            .object_for_handle(process_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        let process = self.current_process()?;
        process
            .handle_table
            .create(AnyObject::ResourceLimit(target.resource_limit.clone()))
    }

    pub(super) fn op_get_resource_limit_limit_values(
        &mut self,
        values_addr: VAddr,
        limit_handle: Handle,
        names_addr: VAddr,
        name_count: i32,
    ) -> Result<(), ResultCode> {
        self.read_resource_values(values_addr, limit_handle, names_addr, name_count, false)
    }

    pub(super) fn op_get_resource_limit_current_values(
        &mut self,
        values_addr: VAddr,
        limit_handle: Handle,
        names_addr: VAddr,
        name_count: i32,
    ) -> Result<(), ResultCode> {
        self.read_resource_values(values_addr, limit_handle, names_addr, name_count, true)
    }

    fn read_resource_values(
        &mut self,
        values_addr: VAddr,
        limit_handle: Handle,
        names_addr: VAddr,
        name_count: i32,
        current: bool,
    ) -> Result<(), ResultCode> {
        if name_count < 0 {
            return Err(ERR_OUT_OF_RANGE);
        }
        let limit = match self.kernel.object_for_handle(limit_handle)? {
            AnyObject::ResourceLimit(limit) => limit,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        let process = self.current_process()?;
        let memory = self.kernel.memory.clone();

        for i in 0..name_count as u32 {
            let name = memory.read_u32(&process, names_addr + i * 4)?;
            let value = match ResourceLimitType::from_u32(name) {
                Some(resource) if current => limit.current_value(resource),
                Some(resource) => limit.limit_value(resource),
                None => {
                    warn!("resource limit query for unknown resource {name}");
                    0
                }
            };
            memory.write_u64(&process, values_addr + i * 8, value as u64)?;
        }
        Ok(())
    }

    pub(super) fn op_get_process_list(
        &mut self,
        out_addr: VAddr,
        max_count: i32,
    ) -> Result<i32, ResultCode> {
        let process = self.current_process()?;
        let memory = self.kernel.memory.clone();
        if max_count < 0 || !memory.is_valid_virtual_address(&process, out_addr) {
            return Err(ERR_INVALID_POINTER);
        }

        let ids: Vec<ProcessId> = self
            .kernel
            .processes()
            .iter()
            .take(max_count as usize)
            .map(|p| p.process_id)
            .collect();
        for (i, id) in ids.iter().enumerate() {
            memory.write_u32(&process, out_addr + (i as u32) * 4, *id)?;
        }
        Ok(ids.len() as i32)
    }

    pub(super) fn op_kernel_set_state(
        &mut self,
        state: u32,
        varg1: u32,
        varg2: u32,
    ) -> Result<(), ResultCode> {
        match state {
            KERNEL_STATE_SHUTDOWN => self.kernel.request_shutdown(),
            _ => {
                error!("KernelSetState state {state} (args {varg1:#x}, {varg2:#x}) ignored");
            }
        }
        Ok(())
    }

    pub(super) fn op_control_process(
        &mut self,
        process_handle: Handle,
        op: u32,
        varg2: u32,
        varg3: u32,
    ) -> Result<(), ResultCode> {
        let process = self
            .kernel
            .object_for_handle(process_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        debug!(
            "ControlProcess pid={} op={op} varg2={varg2:#x} varg3={varg3:#x}",
            process.process_id
        );

        match op {
            PROCESSOP_SET_MMU_TO_RWX => {
                let mut vm = process.vm_manager.lock();
                let mapped: Vec<(VAddr, u32)> = vm
                    .range_vmas(0, crate::memory::layout::USER_SPACE_END)
                    .into_iter()
                    .filter(|vma| vma.state != MemoryState::Free)
                    .map(|vma| (vma.base, vma.size))
                    .collect();
                for (base, size) in mapped {
                    vm.reprotect(
                        base,
                        size,
                        MemoryPermission::READ_WRITE | MemoryPermission::EXECUTE,
                    )?;
                }
                Ok(())
            }
            PROCESSOP_GET_ON_MEMORY_CHANGE_EVENT => Err(ERR_NOT_FOUND),
            PROCESSOP_SCHEDULE_THREADS_WITHOUT_TLS_MAGIC => {
                let memory = self.kernel.memory.clone();
                for thread in process.threads() {
                    if Arc::ptr_eq(&thread, &self.thread) {
                        continue;
                    }
                    let magic = memory.read_u32(&process, thread.tls_address).unwrap_or(0);
                    if magic == varg3 {
                        continue;
                    }
                    thread.set_can_schedule(varg2 == 0);
                }
                self.kernel.reschedule_needed = true;
                Ok(())
            }
            PROCESSOP_DISABLE_CREATE_THREAD_RESTRICTIONS => {
                process.set_thread_restrictions_disabled(varg2 == 1);
                Ok(())
            }
            _ => {
                error!("ControlProcess operation {op} not implemented");
                Err(ERR_NOT_IMPLEMENTED)
            }
        }
    }
}
