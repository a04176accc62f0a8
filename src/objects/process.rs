/*!
 * Processes
 * Per-process address space, handle table, and lifecycle
 */

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};

use crate::core::types::{ProcessId, VAddr};
use crate::memory::layout::{TLS_AREA_VADDR, TLS_ENTRY_SIZE};
use crate::memory::VmManager;

use super::handle_table::HandleTable;
use super::object::{WaitList, WaitObject};
use super::resource_limit::ResourceLimit;
use super::thread::Thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Created,
    Running,
    Exited,
}

pub struct Process {
    pub process_id: ProcessId,
    pub name: String,
    pub program_id: u64,
    pub vm_manager: SyncMutex<VmManager>,
    pub handle_table: HandleTable,
    pub resource_limit: Arc<ResourceLimit>,
    /// Kernel tick count at creation, for handle introspection.
    pub creation_time_ticks: u64,
    /// Core newly created threads land on when they ask for the default.
    pub ideal_processor: i32,
    /// Lifts the priority and core checks on thread creation.
    no_thread_restrictions: AtomicBool,
    status: SyncMutex<ProcessStatus>,
    /// Threads ever created in this process, pruned lazily.
    threads: SyncMutex<Vec<Weak<Thread>>>,
    next_tls_slot: AtomicU32,
    /// Bytes committed to the heap and linear heap.
    memory_used: AtomicU32,
    wait_list: WaitList,
}

impl Process {
    pub fn new(
        process_id: ProcessId,
        name: String,
        program_id: u64,
        resource_limit: Arc<ResourceLimit>,
        creation_time_ticks: u64,
    ) -> Self {
        Self {
            process_id,
            name,
            program_id,
            vm_manager: SyncMutex::new(VmManager::new()),
            handle_table: HandleTable::new(),
            resource_limit,
            creation_time_ticks,
            ideal_processor: 0,
            no_thread_restrictions: AtomicBool::new(false),
            status: SyncMutex::new(ProcessStatus::Created),
            threads: SyncMutex::new(Vec::new()),
            next_tls_slot: AtomicU32::new(0),
            memory_used: AtomicU32::new(0),
            wait_list: WaitList::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: ProcessStatus) {
        *self.status.lock() = status;
    }

    #[inline]
    #[must_use]
    pub fn thread_restrictions_disabled(&self) -> bool {
        self.no_thread_restrictions.load(Ordering::Acquire)
    }

    pub fn set_thread_restrictions_disabled(&self, disabled: bool) {
        self.no_thread_restrictions.store(disabled, Ordering::Release);
    }

    /// Reserves the next TLS slot address. The kernel backs the containing
    /// page before handing the slot to a thread.
    pub fn allocate_tls_slot(&self) -> VAddr {
        let slot = self.next_tls_slot.fetch_add(1, Ordering::Relaxed);
        TLS_AREA_VADDR + slot * TLS_ENTRY_SIZE
    }

    pub fn register_thread(&self, thread: &Arc<Thread>) {
        self.threads.lock().push(Arc::downgrade(thread));
    }

    /// Live threads of this process.
    #[must_use]
    pub fn threads(&self) -> Vec<Arc<Thread>> {
        let mut list = self.threads.lock();
        list.retain(|weak| weak.strong_count() > 0);
        list.iter().filter_map(Weak::upgrade).collect()
    }

    #[inline]
    #[must_use]
    pub fn memory_used(&self) -> u32 {
        self.memory_used.load(Ordering::Relaxed)
    }

    pub fn add_memory_used(&self, bytes: u32) {
        self.memory_used.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn sub_memory_used(&self, bytes: u32) {
        self.memory_used.fetch_sub(bytes, Ordering::Relaxed);
    }
}

impl WaitObject for Process {
    fn should_wait(&self, _thread: &Arc<Thread>) -> bool {
        self.status() != ProcessStatus::Exited
    }

    fn acquire(self: Arc<Self>, _thread: &Arc<Thread>) {}

    fn add_waiting_thread(self: Arc<Self>, thread: Arc<Thread>) {
        self.wait_list.add(thread);
    }

    fn remove_waiting_thread(self: Arc<Self>, thread: &Arc<Thread>) {
        self.wait_list.remove(thread);
    }

    fn waiting_threads(&self) -> Vec<Arc<Thread>> {
        self.wait_list.snapshot()
    }
}
