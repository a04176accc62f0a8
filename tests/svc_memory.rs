//! Memory management calls: ControlMemory, queries, shared memory blocks,
//! and physical address translation.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use hle_kernel::core::result::{
    ERR_INVALID_ADDRESS, ERR_INVALID_COMBINATION, ERR_MISALIGNED_ADDRESS, ERR_MISALIGNED_SIZE,
    RESULT_SUCCESS,
};
use hle_kernel::memory::layout::{FCRAM_PADDR, HEAP_VADDR, SHARED_MEMORY_VADDR};
use hle_kernel::memory::MemoryState;

const MEMOP_FREE: u32 = 1;
const MEMOP_COMMIT: u32 = 3;

#[test]
fn control_memory_rejects_misalignment() {
    let mut h = boot();

    h.call(SVC_CONTROL_MEMORY, &[MEMOP_COMMIT, 0x123, 0, 0x1000, 3]);
    assert_eq!(h.r(0), ERR_MISALIGNED_ADDRESS.raw());

    h.call(SVC_CONTROL_MEMORY, &[MEMOP_COMMIT, 0, 0, 0x123, 3]);
    assert_eq!(h.r(0), ERR_MISALIGNED_SIZE.raw());
}

#[test]
fn control_memory_rejects_execute_permission() {
    let mut h = boot();
    // Bit 2 (execute) is outside the read/write mask.
    h.call(SVC_CONTROL_MEMORY, &[MEMOP_COMMIT, 0, 0, 0x1000, 5]);
    assert_eq!(h.r(0), ERR_INVALID_COMBINATION.raw());
}

#[test]
fn commit_query_free_cycle() {
    let mut h = boot();

    h.call(SVC_CONTROL_MEMORY, &[MEMOP_COMMIT, 0, 0, 0x2000, 3]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let addr = h.r(1);
    assert!(addr >= HEAP_VADDR);

    h.call(SVC_QUERY_MEMORY, &[0, 0, addr]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(3), 3); // read/write
    assert_eq!(h.r(4), MemoryState::Private as u32);

    h.call(SVC_CONTROL_MEMORY, &[MEMOP_FREE, addr, 0, 0x2000, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), addr);

    h.call(SVC_QUERY_MEMORY, &[0, 0, addr]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(4), MemoryState::Free as u32);
}

#[test]
fn free_outside_heap_windows_fails() {
    let mut h = boot();
    h.call(SVC_CONTROL_MEMORY, &[MEMOP_FREE, 0x0010_0000, 0, 0x1000, 0]);
    assert_eq!(h.r(0), ERR_INVALID_ADDRESS.raw());
}

#[test]
fn create_memory_block_validates_arguments() {
    let mut h = boot();

    // Misaligned size.
    h.call(SVC_CREATE_MEMORY_BLOCK, &[3, 0, 0x123, 3]);
    assert_eq!(h.r(0), ERR_MISALIGNED_SIZE.raw());

    // Executable owner permission.
    h.call(SVC_CREATE_MEMORY_BLOCK, &[3, 0, 0x1000, 7]);
    assert_eq!(h.r(0), ERR_INVALID_COMBINATION.raw());

    // Fixed address below the image region.
    h.call(SVC_CREATE_MEMORY_BLOCK, &[3, 0x1000, 0x1000, 3]);
    assert_eq!(h.r(0), ERR_INVALID_ADDRESS.raw());
}

#[test]
fn memory_block_map_unmap_cycle() {
    let mut h = boot();

    h.call(SVC_CREATE_MEMORY_BLOCK, &[3, 0, 0x1000, 3]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let block = h.r(1);

    let target = SHARED_MEMORY_VADDR;
    h.call(SVC_MAP_MEMORY_BLOCK, &[block, target, 3, 3]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    h.call(SVC_QUERY_MEMORY, &[0, 0, target]);
    assert_eq!(h.r(4), MemoryState::Shared as u32);
    assert_eq!(h.r(3), 3);

    // The mapping is real guest memory.
    h.write_u32(target, 0xCAFE_BABE);
    assert_eq!(h.read_u32(target), 0xCAFE_BABE);

    h.call(SVC_UNMAP_MEMORY_BLOCK, &[block, target]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    h.call(SVC_QUERY_MEMORY, &[0, 0, target]);
    assert_eq!(h.r(4), MemoryState::Free as u32);

    // A second unmap has nothing to remove.
    h.call(SVC_UNMAP_MEMORY_BLOCK, &[block, target]);
    assert_eq!(h.r(0), ERR_INVALID_ADDRESS.raw());
}

#[test]
fn convert_va_to_pa_translates_heap() {
    let mut h = boot();
    let addr = h.alloc_guest(0x1000);

    h.call(SVC_CONVERT_VA_TO_PA, &[addr]);
    assert!(h.r(0) >= FCRAM_PADDR);

    h.call(SVC_CONVERT_VA_TO_PA, &[0x3F00_0000]);
    assert_eq!(h.r(0), 0);
}

#[test]
fn system_tick_advances_per_read() {
    let mut h = boot();

    h.call(SVC_GET_SYSTEM_TICK, &[]);
    let first = u64::from(h.r(0)) | (u64::from(h.r(1)) << 32);
    h.call(SVC_GET_SYSTEM_TICK, &[]);
    let second = u64::from(h.r(0)) | (u64::from(h.r(1)) << 32);
    assert!(second > first);
}
