/*!
 * Register Marshaling
 * Pulls arguments from guest registers and writes results back
 */

use crate::core::result::{ResultCode, RESULT_SUCCESS};
use crate::core::types::Handle;

use super::Svc;

#[inline]
fn reg(svc: &Svc<'_>, index: usize) -> u32 {
    svc.cpu.reg(index)
}

#[inline]
fn set_result(svc: &mut Svc<'_>, code: ResultCode) {
    svc.cpu.set_reg(0, code.raw());
}

/// Result plus one 32-bit output in r1.
fn write_out1(svc: &mut Svc<'_>, result: Result<u32, ResultCode>) {
    match result {
        Ok(value) => {
            svc.cpu.set_reg(0, RESULT_SUCCESS.raw());
            svc.cpu.set_reg(1, value);
        }
        Err(code) => {
            svc.cpu.set_reg(0, code.raw());
            svc.cpu.set_reg(1, 0);
        }
    }
}

/// Result plus a 64-bit output split across r1 (low) and r2 (high).
fn write_out64(svc: &mut Svc<'_>, result: Result<i64, ResultCode>) {
    match result {
        Ok(value) => {
            svc.cpu.set_reg(0, RESULT_SUCCESS.raw());
            svc.cpu.set_reg(1, value as u32);
            svc.cpu.set_reg(2, (value as u64 >> 32) as u32);
        }
        Err(code) => {
            svc.cpu.set_reg(0, code.raw());
            svc.cpu.set_reg(1, 0);
            svc.cpu.set_reg(2, 0);
        }
    }
}

fn write_plain(svc: &mut Svc<'_>, result: Result<(), ResultCode>) {
    match result {
        Ok(()) => set_result(svc, RESULT_SUCCESS),
        Err(code) => set_result(svc, code),
    }
}

#[inline]
fn pair64(low: u32, high: u32) -> i64 {
    (u64::from(low) | (u64::from(high) << 32)) as i64
}

// Memory

pub(super) fn control_memory(svc: &mut Svc<'_>) {
    let op = reg(svc, 0);
    let addr0 = reg(svc, 1);
    let addr1 = reg(svc, 2);
    let size = reg(svc, 3);
    let permissions = reg(svc, 4);
    let result = svc.op_control_memory(op, addr0, addr1, size, permissions);
    write_out1(svc, result);
}

pub(super) fn query_memory(svc: &mut Svc<'_>) {
    let addr = reg(svc, 2);
    let result = svc.op_query_memory(addr);
    write_memory_info(svc, result);
}

pub(super) fn query_process_memory(svc: &mut Svc<'_>) {
    let process_handle = reg(svc, 2);
    let addr = reg(svc, 3);
    let result = svc.op_query_process_memory(process_handle, addr);
    write_memory_info(svc, result);
}

fn write_memory_info(
    svc: &mut Svc<'_>,
    result: Result<crate::memory::MemoryInfo, ResultCode>,
) {
    match result {
        Ok(info) => {
            svc.cpu.set_reg(0, RESULT_SUCCESS.raw());
            svc.cpu.set_reg(1, info.base_address);
            svc.cpu.set_reg(2, info.size);
            svc.cpu.set_reg(3, info.permission);
            svc.cpu.set_reg(4, info.state);
            // Page flags are always zero here.
            svc.cpu.set_reg(5, 0);
        }
        Err(code) => set_result(svc, code),
    }
}

pub(super) fn create_memory_block(svc: &mut Svc<'_>) {
    let addr = reg(svc, 1);
    let size = reg(svc, 2);
    let my_permission = reg(svc, 3);
    let other_permission = reg(svc, 0);
    let result = svc.op_create_memory_block(addr, size, my_permission, other_permission);
    write_out1(svc, result);
}

pub(super) fn map_memory_block(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let addr = reg(svc, 1);
    let permissions = reg(svc, 2);
    let other_permissions = reg(svc, 3);
    let result = svc.op_map_memory_block(handle, addr, permissions, other_permissions);
    write_plain(svc, result);
}

pub(super) fn unmap_memory_block(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let addr = reg(svc, 1);
    let result = svc.op_unmap_memory_block(handle, addr);
    write_plain(svc, result);
}

pub(super) fn convert_va_to_pa(svc: &mut Svc<'_>) {
    let addr = reg(svc, 0);
    let pa = svc.op_convert_va_to_pa(addr);
    svc.cpu.set_reg(0, pa);
}

pub(super) fn map_process_memory_ex(svc: &mut Svc<'_>) {
    let dst_handle = reg(svc, 0);
    let dst_addr = reg(svc, 1);
    let src_handle = reg(svc, 2);
    let src_addr = reg(svc, 3);
    let size = reg(svc, 4);
    let result = svc.op_map_process_memory_ex(dst_handle, dst_addr, src_handle, src_addr, size);
    write_plain(svc, result);
}

pub(super) fn unmap_process_memory_ex(svc: &mut Svc<'_>) {
    let process_handle = reg(svc, 0);
    let addr = reg(svc, 1);
    let size = reg(svc, 2);
    let result = svc.op_unmap_process_memory_ex(process_handle, addr, size);
    write_plain(svc, result);
}

pub(super) fn invalidate_instruction_cache_range(svc: &mut Svc<'_>) {
    let addr = reg(svc, 0);
    let size = reg(svc, 1);
    svc.cpu.invalidate_cache_range(addr, size);
    set_result(svc, RESULT_SUCCESS);
}

pub(super) fn invalidate_entire_instruction_cache(svc: &mut Svc<'_>) {
    svc.cpu.invalidate_entire_cache();
    set_result(svc, RESULT_SUCCESS);
}

// Process

pub(super) fn exit_process(svc: &mut Svc<'_>) {
    svc.op_exit_process();
}

pub(super) fn open_process(svc: &mut Svc<'_>) {
    let process_id = reg(svc, 1);
    let result = svc.op_open_process(process_id);
    write_out1(svc, result);
}

pub(super) fn get_process_id(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let result = svc.op_get_process_id(handle);
    write_out1(svc, result);
}

pub(super) fn get_process_id_of_thread(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let result = svc.op_get_process_id_of_thread(handle);
    write_out1(svc, result);
}

pub(super) fn get_resource_limit(svc: &mut Svc<'_>) {
    let process_handle = reg(svc, 1);
    let result = svc.op_get_resource_limit(process_handle);
    write_out1(svc, result);
}

pub(super) fn get_resource_limit_limit_values(svc: &mut Svc<'_>) {
    let values_addr = reg(svc, 0);
    let limit_handle = reg(svc, 1);
    let names_addr = reg(svc, 2);
    let name_count = reg(svc, 3) as i32;
    let result =
        svc.op_get_resource_limit_limit_values(values_addr, limit_handle, names_addr, name_count);
    write_plain(svc, result);
}

pub(super) fn get_resource_limit_current_values(svc: &mut Svc<'_>) {
    let values_addr = reg(svc, 0);
    let limit_handle = reg(svc, 1);
    let names_addr = reg(svc, 2);
    let name_count = reg(svc, 3) as i32;
    let result =
        svc.op_get_resource_limit_current_values(values_addr, limit_handle, names_addr, name_count);
    write_plain(svc, result);
}

pub(super) fn get_process_list(svc: &mut Svc<'_>) {
    let out_addr = reg(svc, 1);
    let max_count = reg(svc, 2) as i32;
    let result = svc.op_get_process_list(out_addr, max_count);
    write_out1(svc, result.map(|count| count as u32));
}

pub(super) fn kernel_set_state(svc: &mut Svc<'_>) {
    let state = reg(svc, 0);
    let varg1 = reg(svc, 1);
    let varg2 = reg(svc, 2);
    let result = svc.op_kernel_set_state(state, varg1, varg2);
    write_plain(svc, result);
}

pub(super) fn control_process(svc: &mut Svc<'_>) {
    let process_handle = reg(svc, 0);
    let op = reg(svc, 1);
    let varg2 = reg(svc, 2);
    let varg3 = reg(svc, 3);
    let result = svc.op_control_process(process_handle, op, varg2, varg3);
    write_plain(svc, result);
}

// Threads

pub(super) fn create_thread(svc: &mut Svc<'_>) {
    let priority = reg(svc, 0);
    let entry_point = reg(svc, 1);
    let arg = reg(svc, 2);
    let stack_top = reg(svc, 3);
    let processor_id = reg(svc, 4) as i32;
    let result = svc.op_create_thread(priority, entry_point, arg, stack_top, processor_id);
    write_out1(svc, result);
}

pub(super) fn exit_thread(svc: &mut Svc<'_>) {
    svc.op_exit_thread();
}

pub(super) fn sleep_thread(svc: &mut Svc<'_>) {
    let nanoseconds = pair64(reg(svc, 0), reg(svc, 1));
    svc.op_sleep_thread(nanoseconds);
}

pub(super) fn get_thread_priority(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let result = svc.op_get_thread_priority(handle);
    write_out1(svc, result);
}

pub(super) fn set_thread_priority(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let priority = reg(svc, 1);
    let result = svc.op_set_thread_priority(handle, priority);
    write_plain(svc, result);
}

pub(super) fn get_thread_id(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let result = svc.op_get_thread_id(handle);
    write_out1(svc, result);
}

pub(super) fn open_thread(svc: &mut Svc<'_>) {
    let process_handle = reg(svc, 1);
    let thread_id = reg(svc, 2);
    let result = svc.op_open_thread(process_handle, thread_id);
    write_out1(svc, result);
}

// Synchronization

pub(super) fn create_mutex(svc: &mut Svc<'_>) {
    let initial_locked = reg(svc, 1) != 0;
    let result = svc.op_create_mutex(initial_locked);
    write_out1(svc, result);
}

pub(super) fn release_mutex(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_release_mutex(handle);
    write_plain(svc, result);
}

pub(super) fn create_semaphore(svc: &mut Svc<'_>) {
    let initial_count = reg(svc, 1) as i32;
    let max_count = reg(svc, 2) as i32;
    let result = svc.op_create_semaphore(initial_count, max_count);
    write_out1(svc, result);
}

pub(super) fn release_semaphore(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let release_count = reg(svc, 2) as i32;
    let result = svc.op_release_semaphore(handle, release_count);
    write_out1(svc, result.map(|count| count as u32));
}

pub(super) fn create_event(svc: &mut Svc<'_>) {
    let reset_type = reg(svc, 1);
    let result = svc.op_create_event(reset_type);
    write_out1(svc, result);
}

pub(super) fn signal_event(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_signal_event(handle);
    write_plain(svc, result);
}

pub(super) fn clear_event(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_clear_event(handle);
    write_plain(svc, result);
}

pub(super) fn create_timer(svc: &mut Svc<'_>) {
    let reset_type = reg(svc, 1);
    let result = svc.op_create_timer(reset_type);
    write_out1(svc, result);
}

pub(super) fn set_timer(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let initial = pair64(reg(svc, 2), reg(svc, 3));
    let interval = pair64(reg(svc, 1), reg(svc, 4));
    let result = svc.op_set_timer(handle, initial, interval);
    write_plain(svc, result);
}

pub(super) fn cancel_timer(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_cancel_timer(handle);
    write_plain(svc, result);
}

pub(super) fn clear_timer(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_clear_timer(handle);
    write_plain(svc, result);
}

pub(super) fn create_address_arbiter(svc: &mut Svc<'_>) {
    let result = svc.op_create_address_arbiter();
    write_out1(svc, result);
}

pub(super) fn arbitrate_address(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let addr = reg(svc, 1);
    let arbitration_type = reg(svc, 2);
    let value = reg(svc, 3) as i32;
    let nanoseconds = pair64(reg(svc, 4), reg(svc, 5));
    let code = svc.op_arbitrate_address(handle, addr, arbitration_type, value, nanoseconds);
    set_result(svc, code);
}

pub(super) fn close_handle(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_close_handle(handle);
    write_plain(svc, result);
}

pub(super) fn duplicate_handle(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let result = svc.op_duplicate_handle(handle);
    write_out1(svc, result);
}

pub(super) fn wait_synchronization1(svc: &mut Svc<'_>) {
    let handle: Handle = reg(svc, 0);
    let nanoseconds = pair64(reg(svc, 2), reg(svc, 3));
    let code = svc.op_wait_synchronization1(handle, nanoseconds);
    set_result(svc, code);
}

pub(super) fn wait_synchronization_n(svc: &mut Svc<'_>) {
    let handles_address = reg(svc, 1);
    let handle_count = reg(svc, 2) as i32;
    let wait_all = reg(svc, 3) != 0;
    let nanoseconds = pair64(reg(svc, 0), reg(svc, 4));
    let (code, out) =
        svc.op_wait_synchronization_n(handles_address, handle_count, wait_all, nanoseconds);
    svc.cpu.set_reg(0, code.raw());
    svc.cpu.set_reg(1, out as u32);
}

// IPC

pub(super) fn connect_to_port(svc: &mut Svc<'_>) {
    let name_address = reg(svc, 1);
    let result = svc.op_connect_to_port(name_address);
    write_out1(svc, result);
}

pub(super) fn send_sync_request(svc: &mut Svc<'_>) {
    let handle = reg(svc, 0);
    let result = svc.op_send_sync_request(handle);
    write_plain(svc, result);
}

pub(super) fn create_port(svc: &mut Svc<'_>) {
    let name_address = reg(svc, 2);
    let max_sessions = reg(svc, 3);
    match svc.op_create_port(name_address, max_sessions) {
        Ok((server, client)) => {
            svc.cpu.set_reg(0, RESULT_SUCCESS.raw());
            svc.cpu.set_reg(1, server);
            svc.cpu.set_reg(2, client);
        }
        Err(code) => {
            svc.cpu.set_reg(0, code.raw());
            svc.cpu.set_reg(1, 0);
            svc.cpu.set_reg(2, 0);
        }
    }
}

pub(super) fn create_session_to_port(svc: &mut Svc<'_>) {
    let client_port_handle = reg(svc, 1);
    let result = svc.op_create_session_to_port(client_port_handle);
    write_out1(svc, result);
}

pub(super) fn create_session(svc: &mut Svc<'_>) {
    match svc.op_create_session() {
        Ok((server, client)) => {
            svc.cpu.set_reg(0, RESULT_SUCCESS.raw());
            svc.cpu.set_reg(1, server);
            svc.cpu.set_reg(2, client);
        }
        Err(code) => {
            svc.cpu.set_reg(0, code.raw());
            svc.cpu.set_reg(1, 0);
            svc.cpu.set_reg(2, 0);
        }
    }
}

pub(super) fn accept_session(svc: &mut Svc<'_>) {
    let server_port_handle = reg(svc, 1);
    let result = svc.op_accept_session(server_port_handle);
    write_out1(svc, result);
}

pub(super) fn reply_and_receive(svc: &mut Svc<'_>) {
    let handles_address = reg(svc, 1);
    let handle_count = reg(svc, 2) as i32;
    let reply_target = reg(svc, 3);
    let (code, index) = svc.op_reply_and_receive(handles_address, handle_count, reply_target);
    svc.cpu.set_reg(0, code.raw());
    svc.cpu.set_reg(1, index as u32);
}

// Introspection

pub(super) fn get_system_tick(svc: &mut Svc<'_>) {
    let tick = svc.op_get_system_tick();
    svc.cpu.set_reg(0, tick as u32);
    svc.cpu.set_reg(1, (tick >> 32) as u32);
}

pub(super) fn get_handle_info(svc: &mut Svc<'_>) {
    let handle = reg(svc, 1);
    let info_type = reg(svc, 2);
    let result = svc.op_get_handle_info(handle, info_type);
    write_out64(svc, result);
}

pub(super) fn get_system_info(svc: &mut Svc<'_>) {
    let info_type = reg(svc, 1);
    let param = reg(svc, 2) as i32;
    let result = svc.op_get_system_info(info_type, param);
    write_out64(svc, result);
}

pub(super) fn get_process_info(svc: &mut Svc<'_>) {
    let process_handle = reg(svc, 1);
    let info_type = reg(svc, 2);
    let result = svc.op_get_process_info(process_handle, info_type);
    write_out64(svc, result);
}

pub(super) fn get_thread_info(svc: &mut Svc<'_>) {
    let thread_handle = reg(svc, 1);
    let info_type = reg(svc, 2);
    let result = svc.op_get_thread_info(thread_handle, info_type);
    write_out64(svc, result);
}

// Debug

pub(super) fn break_(svc: &mut Svc<'_>) {
    let reason = reg(svc, 0);
    svc.op_break(reason);
}

pub(super) fn output_debug_string(svc: &mut Svc<'_>) {
    let address = reg(svc, 0);
    let length = reg(svc, 1) as i32;
    svc.op_output_debug_string(address, length);
}
