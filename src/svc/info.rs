/*!
 * Introspection Calls
 * Tick counter and the handle, system, process, and thread info queries
 */

use log::{debug, error};

use crate::core::result::{
    ResultCode, ERR_INVALID_ENUM_VALUE, ERR_INVALID_HANDLE, ERR_MISALIGNED_SIZE,
    ERR_NOT_IMPLEMENTED,
};
use crate::core::types::Handle;
use crate::memory::layout::{FCRAM_PADDR, LINEAR_HEAP_VADDR, PAGE_MASK, PROCESS_IMAGE_VADDR};
use crate::memory::MemoryRegionKind;

use super::Svc;

// GetHandleInfo queries.
const HANDLE_INFO_PROCESS_CREATION_TIME: u32 = 0;
const HANDLE_INFO_REFERENCE_COUNT: u32 = 1;

// GetSystemInfo queries.
const SYSTEM_INFO_REGION_MEMORY_USAGE: u32 = 0;
const SYSTEM_INFO_KERNEL_ALLOCATED_PAGES: u32 = 2;
const SYSTEM_INFO_SPAWNED_PROCESS_COUNT: u32 = 26;
const SYSTEM_INFO_NEW_HARDWARE_INFO: u32 = 0x10001;
const SYSTEM_INFO_EMULATOR_INFO: u32 = 0x20000;

// GetThreadInfo queries.
const THREAD_INFO_TLS_ADDRESS: u32 = 0x10000;

/// First eight bytes of `s`, NUL padded, as userland reads info strings.
#[must_use]
fn pack_info_string(s: &str) -> i64 {
    let mut bytes = [0u8; 8];
    for (dst, src) in bytes.iter_mut().take(7).zip(s.bytes()) {
        *dst = src;
    }
    i64::from_le_bytes(bytes)
}

impl Svc<'_> {
    pub(super) fn op_get_system_tick(&mut self) -> u64 {
        self.kernel.read_system_tick()
    }

    pub(super) fn op_get_handle_info(
        &mut self,
        handle: Handle,
        info_type: u32,
    ) -> Result<i64, ResultCode> {
        let object = self.kernel.object_for_handle(handle)?;
        match info_type {
            HANDLE_INFO_PROCESS_CREATION_TIME => Ok(object
                .as_process()
                .map(|p| p.creation_time_ticks as i64)
                .unwrap_or(0)),
            // Has to exclude the handle table's own reference.
            HANDLE_INFO_REFERENCE_COUNT => Ok(object.strong_count() as i64 - 1),
            2 | 0x32107 => Ok(0),
            _ => {
                error!("GetHandleInfo unknown type {info_type}");
                Err(ERR_INVALID_ENUM_VALUE)
            }
        }
    }

    pub(super) fn op_get_system_info(
        &mut self,
        info_type: u32,
        param: i32,
    ) -> Result<i64, ResultCode> {
        debug!("GetSystemInfo type={info_type:#x} param={param}");
        match info_type {
            SYSTEM_INFO_REGION_MEMORY_USAGE => Ok(match param {
                0 => self.kernel.total_region_used() as i64,
                1 => self.kernel.region(MemoryRegionKind::Application).used as i64,
                2 => self.kernel.region(MemoryRegionKind::System).used as i64,
                3 => self.kernel.region(MemoryRegionKind::Base).used as i64,
                _ => {
                    error!("GetSystemInfo memory usage for unknown region {param}");
                    0
                }
            }),
            SYSTEM_INFO_KERNEL_ALLOCATED_PAGES => {
                error!("GetSystemInfo kernel allocated pages not tracked");
                Ok(0)
            }
            // Number of processes the loader spawns before the application.
            SYSTEM_INFO_SPAWNED_PROCESS_COUNT => Ok(5),
            SYSTEM_INFO_NEW_HARDWARE_INFO => {
                if self.kernel.config.core_count == 4 {
                    Ok(0)
                } else {
                    Err(ERR_INVALID_ENUM_VALUE)
                }
            }
            SYSTEM_INFO_EMULATOR_INFO => Ok(self.emulator_info(param)),
            _ => {
                error!("GetSystemInfo unknown type {info_type:#x}");
                Ok(0)
            }
        }
    }

    fn emulator_info(&self, param: i32) -> i64 {
        let version = env!("CARGO_PKG_VERSION");
        match param {
            // Lets homebrew detect it is not on hardware.
            0 => 1,
            10 => pack_info_string(env!("CARGO_PKG_NAME")),
            11 => pack_info_string(version),
            20 => pack_info_string("2026"),
            21 => pack_info_string("08"),
            22 => pack_info_string("30"),
            23 => 0,
            30 | 31 => pack_info_string("main"),
            40 => pack_info_string(version),
            41 => pack_info_string(version.get(7..).unwrap_or("")),
            _ => {
                error!("GetSystemInfo emulator info for unknown param {param}");
                0
            }
        }
    }

    pub(super) fn op_get_process_info(
        &mut self,
        process_handle: Handle,
        info_type: u32,
    ) -> Result<i64, ResultCode> {
        let process = self
            .kernel
            .object_for_handle(process_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;

        match info_type {
            0 | 2 => {
                let used = process.memory_used();
                if used & PAGE_MASK != 0 {
                    return Err(ERR_MISALIGNED_SIZE);
                }
                Ok(used as i64)
            }
            1 | 3 | 4 | 5 | 6 | 7 | 8 => {
                error!("GetProcessInfo type {info_type} not implemented");
                Ok(0)
            }
            20 => Ok(i64::from(FCRAM_PADDR - LINEAR_HEAP_VADDR)),
            21 | 22 | 23 => Err(ERR_NOT_IMPLEMENTED),
            0x10000 => Ok(pack_info_string(&process.name)),
            0x10001 => Ok(process.program_id as i64),
            // Segment sizes are not tracked for HLE-loaded processes.
            0x10002..=0x10004 => Ok(0),
            0x10005..=0x10007 => Ok(i64::from(PROCESS_IMAGE_VADDR)),
            _ => {
                error!("GetProcessInfo unknown type {info_type:#x}");
                Err(ERR_INVALID_ENUM_VALUE)
            }
        }
    }

    pub(super) fn op_get_thread_info(
        &mut self,
        thread_handle: Handle,
        info_type: u32,
    ) -> Result<i64, ResultCode> {
        let thread = self
            .kernel
            .object_for_handle(thread_handle)?
            .as_thread()
            .ok_or(ERR_INVALID_HANDLE)?;
        match info_type {
            THREAD_INFO_TLS_ADDRESS => Ok(i64::from(thread.tls_address)),
            _ => {
                error!("GetThreadInfo unknown type {info_type:#x}");
                Err(ERR_INVALID_ENUM_VALUE)
            }
        }
    }
}
