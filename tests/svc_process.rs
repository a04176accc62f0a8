//! Process and thread lifecycle calls, resource limits, and the info
//! queries.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use hle_kernel::core::result::{
    ERR_INVALID_ENUM_VALUE, ERR_NOT_AUTHORIZED, ERR_OUT_OF_RANGE, ERR_PROCESS_NOT_FOUND,
    RESULT_SUCCESS,
};
use hle_kernel::objects::ThreadStatus;

#[test]
fn process_id_via_pseudo_handle() {
    let mut h = boot();
    h.call(SVC_GET_PROCESS_ID, &[0, CURRENT_PROCESS]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), h.process.process_id);
}

#[test]
fn open_process_by_id() {
    let mut h = boot();

    h.call(SVC_OPEN_PROCESS, &[0, 9999]);
    assert_eq!(h.r(0), ERR_PROCESS_NOT_FOUND.raw());

    h.call(SVC_OPEN_PROCESS, &[0, h.process.process_id]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let handle = h.r(1);

    h.call(SVC_GET_PROCESS_ID, &[0, handle]);
    assert_eq!(h.r(1), h.process.process_id);
}

#[test]
fn process_list_reports_running_processes() {
    let mut h = boot();
    let buffer = h.alloc_guest(0x1000);

    h.call(SVC_GET_PROCESS_LIST, &[0, buffer, 8]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), 1);
    assert_eq!(h.read_u32(buffer), h.process.process_id);
}

#[test]
fn create_thread_validates_priority() {
    let mut h = boot();

    // Above the supported range.
    h.call(SVC_CREATE_THREAD, &[64, 0x0010_0000, 0, 0x0900_0000, 0]);
    assert_eq!(h.r(0), ERR_OUT_OF_RANGE.raw());

    // Higher priority than the process resource limit allows.
    h.call(SVC_CREATE_THREAD, &[0x10, 0x0010_0000, 0, 0x0900_0000, 0]);
    assert_eq!(h.r(0), ERR_NOT_AUTHORIZED.raw());

    h.call(SVC_CREATE_THREAD, &[0x30, 0x0010_0000, 0, 0x0900_0000, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_ne!(h.r(1), 0);
}

#[test]
fn control_process_lifts_thread_restrictions() {
    let mut h = boot();

    h.call(SVC_CREATE_THREAD, &[0x10, 0x0010_0000, 0, 0x0900_0000, 0]);
    assert_eq!(h.r(0), ERR_NOT_AUTHORIZED.raw());

    h.call(SVC_CONTROL_PROCESS, &[CURRENT_PROCESS, 7, 1, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    h.call(SVC_CREATE_THREAD, &[0x10, 0x0010_0000, 0, 0x0900_0000, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
}

#[test]
fn set_priority_allowed_once_restrictions_lifted() {
    let mut h = boot();

    h.call(SVC_SET_THREAD_PRIORITY, &[CURRENT_THREAD, 0x10]);
    assert_eq!(h.r(0), ERR_NOT_AUTHORIZED.raw());

    h.call(SVC_CONTROL_PROCESS, &[CURRENT_PROCESS, 7, 1, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    h.call(SVC_SET_THREAD_PRIORITY, &[CURRENT_THREAD, 0x10]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    h.call(SVC_GET_THREAD_PRIORITY, &[0, CURRENT_THREAD]);
    assert_eq!(h.r(1), 0x10);
}

#[test]
fn thread_priority_get_and_set() {
    let mut h = boot();

    h.call(SVC_GET_THREAD_PRIORITY, &[0, CURRENT_THREAD]);
    assert_eq!(h.r(1), 0x30);

    h.call(SVC_SET_THREAD_PRIORITY, &[CURRENT_THREAD, 80]);
    assert_eq!(h.r(0), ERR_OUT_OF_RANGE.raw());

    h.call(SVC_SET_THREAD_PRIORITY, &[CURRENT_THREAD, 0x10]);
    assert_eq!(h.r(0), ERR_NOT_AUTHORIZED.raw());

    h.call(SVC_SET_THREAD_PRIORITY, &[CURRENT_THREAD, 0x2C]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    h.call(SVC_GET_THREAD_PRIORITY, &[0, CURRENT_THREAD]);
    assert_eq!(h.r(1), 0x2C);
}

#[test]
fn exit_process_tears_everything_down() {
    let mut h = boot();
    let pid = h.process.process_id;

    h.call(SVC_EXIT_PROCESS, &[]);

    assert_eq!(h.thread.status(), ThreadStatus::Dead);
    let k = h.ctx.kernel().lock();
    assert!(k.process_by_id(pid).is_none());
    assert!(k.current_thread().is_none());
}

#[test]
fn resource_limit_values_round_trip() {
    let mut h = boot();

    h.call(SVC_GET_RESOURCE_LIMIT, &[0, CURRENT_PROCESS]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let limit = h.r(1);

    let names = h.alloc_guest(0x1000);
    let values = h.alloc_guest(0x1000);
    h.write_u32(names, 1); // threads
    h.write_u32(names + 4, 9); // priority

    h.call(SVC_GET_RESOURCE_LIMIT_LIMIT_VALUES, &[values, limit, names, 2]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.read_u64(values), 0x20);
    assert_eq!(h.read_u64(values + 8), 0x18);

    // One thread exists after boot.
    h.call(SVC_GET_RESOURCE_LIMIT_CURRENT_VALUES, &[values, limit, names, 1]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.read_u64(values), 1);
}

#[test]
fn kernel_set_state_shutdown() {
    let mut h = boot();
    h.call(SVC_KERNEL_SET_STATE, &[7, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert!(h.ctx.kernel().lock().shutdown_requested());
}

#[test]
fn system_info_identifies_the_emulator() {
    let mut h = boot();

    h.call(SVC_GET_SYSTEM_INFO, &[0, 0x20000, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), 1);
    assert_eq!(h.r(2), 0);

    // Only a four-core configuration reports new hardware capabilities.
    h.call(SVC_GET_SYSTEM_INFO, &[0, 0x10001, 0]);
    assert_eq!(h.r(0), ERR_INVALID_ENUM_VALUE.raw());
}

#[test]
fn handle_info_queries() {
    let mut h = boot();

    h.call(SVC_GET_HANDLE_INFO, &[0, CURRENT_PROCESS, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    h.call(SVC_GET_HANDLE_INFO, &[0, CURRENT_PROCESS, 99]);
    assert_eq!(h.r(0), ERR_INVALID_ENUM_VALUE.raw());
}

#[test]
fn thread_info_reports_tls() {
    let mut h = boot();
    h.call(SVC_GET_THREAD_INFO, &[0, CURRENT_THREAD, 0x10000]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), h.thread.tls_address);
}

#[test]
fn process_info_reports_program_id() {
    let mut h = boot();
    h.call(SVC_GET_PROCESS_INFO, &[0, CURRENT_PROCESS, 0x10001]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), 0x1234_5678);
    assert_eq!(h.r(2), 0x0004_0000);
}
