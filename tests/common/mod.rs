//! Shared harness: a booted kernel with one process and one running thread.

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;

use hle_kernel::memory::MemoryPermission;
use hle_kernel::objects::{Process, Thread};
use hle_kernel::svc::{GuestCpu, RegisterFile, SvcContext};
use hle_kernel::{Kernel, VAddr};

// Supervisor call immediates.
pub const SVC_CONTROL_MEMORY: u32 = 0x01;
pub const SVC_QUERY_MEMORY: u32 = 0x02;
pub const SVC_EXIT_PROCESS: u32 = 0x03;
pub const SVC_CREATE_THREAD: u32 = 0x08;
pub const SVC_SLEEP_THREAD: u32 = 0x0A;
pub const SVC_GET_THREAD_PRIORITY: u32 = 0x0B;
pub const SVC_SET_THREAD_PRIORITY: u32 = 0x0C;
pub const SVC_CREATE_MUTEX: u32 = 0x13;
pub const SVC_RELEASE_MUTEX: u32 = 0x14;
pub const SVC_CREATE_SEMAPHORE: u32 = 0x15;
pub const SVC_RELEASE_SEMAPHORE: u32 = 0x16;
pub const SVC_CREATE_EVENT: u32 = 0x17;
pub const SVC_SIGNAL_EVENT: u32 = 0x18;
pub const SVC_CREATE_TIMER: u32 = 0x1A;
pub const SVC_SET_TIMER: u32 = 0x1B;
pub const SVC_CANCEL_TIMER: u32 = 0x1C;
pub const SVC_CREATE_MEMORY_BLOCK: u32 = 0x1E;
pub const SVC_MAP_MEMORY_BLOCK: u32 = 0x1F;
pub const SVC_UNMAP_MEMORY_BLOCK: u32 = 0x20;
pub const SVC_CREATE_ADDRESS_ARBITER: u32 = 0x21;
pub const SVC_ARBITRATE_ADDRESS: u32 = 0x22;
pub const SVC_CLOSE_HANDLE: u32 = 0x23;
pub const SVC_WAIT_SYNCHRONIZATION1: u32 = 0x24;
pub const SVC_WAIT_SYNCHRONIZATION_N: u32 = 0x25;
pub const SVC_DUPLICATE_HANDLE: u32 = 0x27;
pub const SVC_GET_SYSTEM_TICK: u32 = 0x28;
pub const SVC_GET_HANDLE_INFO: u32 = 0x29;
pub const SVC_GET_SYSTEM_INFO: u32 = 0x2A;
pub const SVC_GET_PROCESS_INFO: u32 = 0x2B;
pub const SVC_GET_THREAD_INFO: u32 = 0x2C;
pub const SVC_CONNECT_TO_PORT: u32 = 0x2D;
pub const SVC_SEND_SYNC_REQUEST: u32 = 0x32;
pub const SVC_OPEN_PROCESS: u32 = 0x33;
pub const SVC_GET_PROCESS_ID: u32 = 0x35;
pub const SVC_GET_RESOURCE_LIMIT: u32 = 0x38;
pub const SVC_GET_RESOURCE_LIMIT_LIMIT_VALUES: u32 = 0x39;
pub const SVC_GET_RESOURCE_LIMIT_CURRENT_VALUES: u32 = 0x3A;
pub const SVC_CREATE_PORT: u32 = 0x47;
pub const SVC_CREATE_SESSION_TO_PORT: u32 = 0x48;
pub const SVC_ACCEPT_SESSION: u32 = 0x4A;
pub const SVC_REPLY_AND_RECEIVE: u32 = 0x4F;
pub const SVC_GET_PROCESS_LIST: u32 = 0x65;
pub const SVC_KERNEL_SET_STATE: u32 = 0x7C;
pub const SVC_CONVERT_VA_TO_PA: u32 = 0x90;
pub const SVC_CONTROL_PROCESS: u32 = 0xB3;

pub const CURRENT_THREAD: u32 = 0xFFFF_8000;
pub const CURRENT_PROCESS: u32 = 0xFFFF_8001;

pub struct Harness {
    pub ctx: SvcContext,
    pub cpu: RegisterFile,
    pub process: Arc<Process>,
    pub thread: Arc<Thread>,
}

pub fn boot() -> Harness {
    let kernel = Arc::new(SyncMutex::new(Kernel::default()));
    let (process, thread) = {
        let mut k = kernel.lock();
        let process = k.create_process("test-app", 0x0004_0000_1234_5678);
        let thread = k
            .create_thread(&process, 0x0010_0000, 0, 0x0800_0000, 0x30, 0)
            .unwrap();
        k.set_current_thread(Some(thread.clone()));
        (process, thread)
    };
    Harness {
        ctx: SvcContext::new(kernel),
        cpu: RegisterFile::new(),
        process,
        thread,
    }
}

impl Harness {
    /// Issues a call with r0.. set from `args`, returning nothing; results
    /// are read from `self.cpu`.
    pub fn call(&mut self, svc: u32, args: &[u32]) {
        self.cpu = RegisterFile::new();
        for (i, value) in args.iter().enumerate() {
            self.cpu.set_reg(i, *value);
        }
        self.ctx.call_svc(&mut self.cpu, svc);
    }

    pub fn r(&self, index: usize) -> u32 {
        self.cpu.reg(index)
    }

    /// Commits a fresh page-multiple buffer on the heap.
    pub fn alloc_guest(&self, size: u32) -> VAddr {
        let mut k = self.ctx.kernel().lock();
        let process = self.process.clone();
        k.heap_allocate(&process, 0, size, MemoryPermission::READ_WRITE)
            .unwrap()
    }

    pub fn write_u32(&self, addr: VAddr, value: u32) {
        let k = self.ctx.kernel().lock();
        k.memory.write_u32(&self.process, addr, value).unwrap();
    }

    pub fn read_u32(&self, addr: VAddr) -> u32 {
        let k = self.ctx.kernel().lock();
        k.memory.read_u32(&self.process, addr).unwrap()
    }

    pub fn read_u64(&self, addr: VAddr) -> u64 {
        let k = self.ctx.kernel().lock();
        k.memory.read_u64(&self.process, addr).unwrap()
    }

    pub fn write_bytes(&self, addr: VAddr, bytes: &[u8]) {
        let k = self.ctx.kernel().lock();
        k.memory.write_block(&self.process, addr, bytes).unwrap();
    }

    pub fn advance(&self, ns: u64) {
        self.ctx.kernel().lock().advance_ns(ns);
    }

    /// Spawns another thread in the test process and makes it current.
    pub fn switch_to_new_thread(&mut self) -> Arc<Thread> {
        let mut k = self.ctx.kernel().lock();
        let process = self.process.clone();
        let thread = k
            .create_thread(&process, 0x0010_0000, 0, 0x0840_0000, 0x30, 0)
            .unwrap();
        k.set_current_thread(Some(thread.clone()));
        thread
    }
}
