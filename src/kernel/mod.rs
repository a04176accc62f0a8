/*!
 * Kernel State
 * Global object registries, time base, and physical memory regions
 */

pub mod timing;
pub mod wait;

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use dashmap::DashMap;
use log::{error, info};

use crate::core::config::KernelConfig;
use crate::core::result::{
    ResultCode, ERR_INVALID_ADDRESS, ERR_INVALID_ADDRESS_STATE, ERR_INVALID_HANDLE,
    ERR_OUT_OF_MEMORY,
};
use crate::core::types::{
    Handle, Nanoseconds, ProcessId, ThreadId, VAddr, CURRENT_PROCESS, CURRENT_THREAD,
};
use crate::memory::layout::{
    HEAP_VADDR, HEAP_VADDR_END, LINEAR_HEAP_VADDR, LINEAR_HEAP_VADDR_END, PAGE_MASK, PAGE_SIZE,
};
use crate::memory::region::build_regions;
use crate::memory::{GuestMemory, MemoryPermission, MemoryRegion, MemoryRegionKind, MemoryState};
use crate::objects::{
    AnyObject, ClientPort, Process, ProcessStatus, ResourceLimit, ResourceLimitCategory,
    ResourceLimitType, Thread, ThreadStatus, Timer, WaitObject,
};

use timing::{TimeoutEntry, TimeoutTarget};

/// Reason code passed to the Break supervisor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    Panic,
    Assert,
    User,
    Unknown(u8),
}

impl From<u8> for BreakReason {
    fn from(value: u8) -> Self {
        match value {
            0 => BreakReason::Panic,
            1 => BreakReason::Assert,
            2 => BreakReason::User,
            other => BreakReason::Unknown(other),
        }
    }
}

/// The whole emulated kernel. Callers serialize access through one lock, so
/// supervisor calls execute atomically with respect to each other.
pub struct Kernel {
    pub config: KernelConfig,
    pub memory: Arc<GuestMemory>,
    regions: [MemoryRegion; 3],
    processes: Vec<Arc<Process>>,
    threads: Vec<Arc<Thread>>,
    pub named_ports: DashMap<String, Arc<ClientPort>>,
    current_thread: Option<Arc<Thread>>,
    next_process_id: ProcessId,
    next_thread_id: ThreadId,
    now_ns: u64,
    tick_count: u64,
    timeout_sequence: u64,
    timeouts: BinaryHeap<Reverse<TimeoutEntry>>,
    /// Set whenever a thread changed runnability during a call.
    pub reschedule_needed: bool,
    shutdown_requested: bool,
    break_reason: Option<BreakReason>,
    /// Address handed to a zero-length debug output, for a host debugger to
    /// service.
    pending_hio_address: Option<VAddr>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let memory = Arc::new(GuestMemory::new(config.fcram_size));
        let regions = build_regions(config.fcram_size);
        Self {
            config,
            memory,
            regions,
            processes: Vec::new(),
            threads: Vec::new(),
            named_ports: DashMap::new(),
            current_thread: None,
            next_process_id: 1,
            next_thread_id: 1,
            now_ns: 0,
            tick_count: 0,
            timeout_sequence: 0,
            timeouts: BinaryHeap::new(),
            reschedule_needed: false,
            shutdown_requested: false,
            break_reason: None,
            pending_hio_address: None,
        }
    }

    // Processes and threads

    pub fn create_process(&mut self, name: &str, program_id: u64) -> Arc<Process> {
        let limit = Arc::new(ResourceLimit::new(
            ResourceLimitCategory::Application,
            format!("res-limit-{name}"),
        ));
        let process = Arc::new(Process::new(
            self.next_process_id,
            name.to_string(),
            program_id,
            limit,
            self.tick_count,
        ));
        self.next_process_id += 1;
        process.set_status(ProcessStatus::Running);
        self.processes.push(process.clone());
        info!("created process {} ({})", process.process_id, name);
        process
    }

    pub fn create_thread(
        &mut self,
        process: &Arc<Process>,
        entry_point: VAddr,
        arg: u32,
        stack_top: VAddr,
        priority: u32,
        processor_id: i32,
    ) -> Result<Arc<Thread>, ResultCode> {
        let tls_address = process.allocate_tls_slot();
        self.back_tls_page(process, tls_address)?;

        let thread = Arc::new(Thread::new(
            self.next_thread_id,
            Arc::downgrade(process),
            entry_point,
            arg,
            stack_top,
            priority,
            processor_id,
            tls_address,
        ));
        self.next_thread_id += 1;
        thread.set_status(ThreadStatus::Ready);
        process.register_thread(&thread);
        process.resource_limit.add_used(ResourceLimitType::Thread, 1);
        self.threads.push(thread.clone());
        self.reschedule_needed = true;
        Ok(thread)
    }

    /// Backs the page containing a fresh TLS slot with base-region memory.
    fn back_tls_page(&mut self, process: &Arc<Process>, tls_address: VAddr) -> Result<(), ResultCode> {
        let page = tls_address & !PAGE_MASK;
        let mut vm = process.vm_manager.lock();
        if vm
            .find_vma(page)
            .map(|vma| vma.state != MemoryState::Free)
            .unwrap_or(false)
        {
            return Ok(());
        }
        let offset = self
            .region_mut(MemoryRegionKind::Base)
            .allocate(PAGE_SIZE)
            .ok_or(ERR_OUT_OF_MEMORY)?;
        vm.map_backed(
            page,
            PAGE_SIZE,
            offset,
            MemoryState::Locked,
            MemoryPermission::READ_WRITE,
        )?;
        Ok(())
    }

    pub fn set_current_thread(&mut self, thread: Option<Arc<Thread>>) {
        if let Some(thread) = &thread {
            thread.set_status(ThreadStatus::Running);
        }
        self.current_thread = thread;
    }

    #[must_use]
    pub fn current_thread(&self) -> Option<Arc<Thread>> {
        self.current_thread.clone()
    }

    #[must_use]
    pub fn current_process(&self) -> Option<Arc<Process>> {
        self.current_thread
            .as_ref()
            .and_then(|thread| thread.owner.upgrade())
    }

    #[must_use]
    pub fn process_by_id(&self, process_id: ProcessId) -> Option<Arc<Process>> {
        self.processes
            .iter()
            .find(|p| p.process_id == process_id)
            .cloned()
    }

    #[must_use]
    pub fn processes(&self) -> &[Arc<Process>] {
        &self.processes
    }

    #[must_use]
    pub fn threads(&self) -> &[Arc<Thread>] {
        &self.threads
    }

    pub fn remove_process(&mut self, process: &Arc<Process>) {
        self.processes.retain(|p| !Arc::ptr_eq(p, process));
    }

    /// Resolves a handle in the current process, honoring the pseudo-handle
    /// values for the calling thread and its process.
    pub fn object_for_handle(&self, handle: Handle) -> Result<AnyObject, ResultCode> {
        match handle {
            CURRENT_THREAD => self
                .current_thread()
                .map(AnyObject::Thread)
                .ok_or(ERR_INVALID_HANDLE),
            CURRENT_PROCESS => self
                .current_process()
                .map(AnyObject::Process)
                .ok_or(ERR_INVALID_HANDLE),
            _ => {
                let process = self.current_process().ok_or(ERR_INVALID_HANDLE)?;
                process.handle_table.get(handle).ok_or(ERR_INVALID_HANDLE)
            }
        }
    }

    /// Stops a thread, releasing its held mutexes and waking joiners.
    pub fn stop_thread(&mut self, thread: &Arc<Thread>) {
        for object in thread.wait_objects() {
            object.remove_waiting_thread(thread);
        }
        thread.stop();
        for mutex in thread.held_mutexes() {
            // Force the release even with a nonzero lock count.
            while mutex.holder().map(|h| Arc::ptr_eq(&h, thread)) == Some(true) {
                let _ = mutex.release(thread);
            }
            let as_wait: Arc<dyn WaitObject> = mutex.clone();
            wait::signal_all(self, &as_wait);
        }
        if let Some(process) = thread.owner.upgrade() {
            process
                .resource_limit
                .release(ResourceLimitType::Thread, 1);
        }
        let as_wait: Arc<dyn WaitObject> = thread.clone();
        wait::signal_all(self, &as_wait);
        self.threads.retain(|t| !Arc::ptr_eq(t, thread));
        self.reschedule_needed = true;
    }

    // Time

    #[inline]
    #[must_use]
    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    #[inline]
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the tick counter, then advances it by the configured trap
    /// cost so tight tick-polling loops observe time moving.
    pub fn read_system_tick(&mut self) -> u64 {
        let ticks = self.tick_count;
        self.tick_count += self.config.ticks_per_tick_read;
        ticks
    }

    /// Advances the clock and delivers every wakeup that came due.
    pub fn advance_ns(&mut self, delta: u64) {
        self.now_ns += delta;
        self.tick_count += delta;
        self.process_due_timeouts();
    }

    /// Arms a wake for a blocked thread. Negative durations wait forever.
    pub fn schedule_thread_wake(&mut self, thread: &Arc<Thread>, nanoseconds: Nanoseconds) {
        if nanoseconds < 0 {
            return;
        }
        let due_ns = self.now_ns + nanoseconds as u64;
        self.push_timeout(
            due_ns,
            TimeoutTarget::Thread {
                thread: Arc::downgrade(thread),
                token: thread.wake_token(),
            },
        );
    }

    /// Arms a timer expiration for the given arming generation.
    pub fn schedule_timer_fire(&mut self, timer: &Arc<Timer>, nanoseconds: Nanoseconds, generation: u64) {
        let due_ns = self.now_ns + nanoseconds.max(0) as u64;
        self.push_timeout(
            due_ns,
            TimeoutTarget::Timer {
                timer: Arc::downgrade(timer),
                generation,
            },
        );
    }

    fn push_timeout(&mut self, due_ns: u64, target: TimeoutTarget) {
        self.timeout_sequence += 1;
        self.timeouts.push(Reverse(TimeoutEntry {
            due_ns,
            sequence: self.timeout_sequence,
            target,
        }));
    }

    fn process_due_timeouts(&mut self) {
        loop {
            match self.timeouts.peek() {
                Some(Reverse(entry)) if entry.due_ns <= self.now_ns => {}
                _ => break,
            }
            let Some(Reverse(entry)) = self.timeouts.pop() else {
                break;
            };
            match entry.target {
                TimeoutTarget::Thread { thread, token } => {
                    if let Some(thread) = thread.upgrade() {
                        // A token mismatch means the thread woke since this
                        // entry was armed.
                        if thread.wake_token() == token {
                            wait::timeout_thread(self, &thread);
                        }
                    }
                }
                TimeoutTarget::Timer { timer, generation } => {
                    if let Some(timer) = timer.upgrade() {
                        if timer.generation() == generation {
                            self.fire_timer(&timer, generation);
                        }
                    }
                }
            }
        }
    }

    fn fire_timer(&mut self, timer: &Arc<Timer>, generation: u64) {
        timer.fire();
        let as_wait: Arc<dyn WaitObject> = timer.clone();
        wait::signal_all(self, &as_wait);
        let interval = timer.interval_delay();
        if interval > 0 {
            self.schedule_timer_fire(timer, interval, generation);
        }
    }

    /// Arms a timer per SetTimer: a zero initial delay fires immediately.
    pub fn set_timer(&mut self, timer: &Arc<Timer>, initial: Nanoseconds, interval: Nanoseconds) {
        let generation = timer.arm(initial, interval);
        if initial == 0 {
            self.fire_timer(timer, generation);
        } else {
            self.schedule_timer_fire(timer, initial, generation);
        }
    }

    // Physical memory regions

    #[must_use]
    pub fn region(&self, kind: MemoryRegionKind) -> &MemoryRegion {
        &self.regions[kind as usize]
    }

    pub fn region_mut(&mut self, kind: MemoryRegionKind) -> &mut MemoryRegion {
        &mut self.regions[kind as usize]
    }

    #[must_use]
    pub fn total_region_used(&self) -> u64 {
        self.regions.iter().map(|r| r.used as u64).sum()
    }

    /// Commits application-region memory into the process heap window.
    pub fn heap_allocate(
        &mut self,
        process: &Arc<Process>,
        addr: VAddr,
        size: u32,
        permissions: MemoryPermission,
    ) -> Result<VAddr, ResultCode> {
        let mut vm = process.vm_manager.lock();
        let target = if addr == 0 {
            vm.find_free_range(HEAP_VADDR, HEAP_VADDR_END, size)
                .ok_or(ERR_OUT_OF_MEMORY)?
        } else {
            if addr < HEAP_VADDR || addr.saturating_add(size) > HEAP_VADDR_END {
                return Err(ERR_INVALID_ADDRESS);
            }
            addr
        };
        let offset = self
            .region_mut(MemoryRegionKind::Application)
            .allocate(size)
            .ok_or(ERR_OUT_OF_MEMORY)?;
        if let Err(err) = vm.map_backed(target, size, offset, MemoryState::Private, permissions) {
            self.region_mut(MemoryRegionKind::Application).free(offset, size);
            return Err(err);
        }
        process.add_memory_used(size);
        Ok(target)
    }

    pub fn heap_free(
        &mut self,
        process: &Arc<Process>,
        addr: VAddr,
        size: u32,
    ) -> Result<(), ResultCode> {
        let mut vm = process.vm_manager.lock();
        if !vm.range_has_state(addr, size, &[MemoryState::Private]) {
            return Err(ERR_INVALID_ADDRESS_STATE);
        }
        let freed = vm.unmap(addr, size);
        drop(vm);
        for (offset, block_size) in freed {
            self.region_mut(MemoryRegionKind::Application)
                .free(offset, block_size);
        }
        process.sub_memory_used(size);
        Ok(())
    }

    /// Commits physically contiguous memory in the linear heap window,
    /// where the virtual offset mirrors the physical one.
    pub fn linear_allocate(
        &mut self,
        process: &Arc<Process>,
        addr: VAddr,
        size: u32,
        permissions: MemoryPermission,
    ) -> Result<VAddr, ResultCode> {
        let offset = if addr == 0 {
            self.region_mut(MemoryRegionKind::Application)
                .allocate(size)
                .ok_or(ERR_OUT_OF_MEMORY)?
        } else {
            if addr < LINEAR_HEAP_VADDR || addr.saturating_add(size) > LINEAR_HEAP_VADDR_END {
                return Err(ERR_INVALID_ADDRESS);
            }
            let offset = addr - LINEAR_HEAP_VADDR;
            if !self
                .region_mut(MemoryRegionKind::Application)
                .allocate_at(offset, size)
            {
                return Err(ERR_OUT_OF_MEMORY);
            }
            offset
        };
        let target = LINEAR_HEAP_VADDR + offset;
        let mut vm = process.vm_manager.lock();
        if let Err(err) = vm.map_backed(target, size, offset, MemoryState::Continuous, permissions)
        {
            self.region_mut(MemoryRegionKind::Application).free(offset, size);
            return Err(err);
        }
        process.add_memory_used(size);
        Ok(target)
    }

    pub fn linear_free(
        &mut self,
        process: &Arc<Process>,
        addr: VAddr,
        size: u32,
    ) -> Result<(), ResultCode> {
        let mut vm = process.vm_manager.lock();
        if !vm.range_has_state(addr, size, &[MemoryState::Continuous]) {
            return Err(ERR_INVALID_ADDRESS_STATE);
        }
        let freed = vm.unmap(addr, size);
        drop(vm);
        for (offset, block_size) in freed {
            self.region_mut(MemoryRegionKind::Application)
                .free(offset, block_size);
        }
        process.sub_memory_used(size);
        Ok(())
    }

    /// Mirrors heap memory at a second address without extra backing. The
    /// source range moves to the Aliased state, the target becomes an Alias.
    pub fn map_alias(
        &mut self,
        process: &Arc<Process>,
        target: VAddr,
        source: VAddr,
        size: u32,
        permissions: MemoryPermission,
    ) -> Result<(), ResultCode> {
        let mut vm = process.vm_manager.lock();
        if !vm.range_has_state(source, size, &[MemoryState::Private]) {
            return Err(ERR_INVALID_ADDRESS_STATE);
        }
        let source_vmas = vm.range_vmas(source, size);
        for vma in &source_vmas {
            let chunk_base = vma.base.max(source);
            let chunk_end = vma.end().min(source + size);
            let backing = vma
                .backing_offset
                .ok_or(ERR_INVALID_ADDRESS_STATE)?
                + (chunk_base - vma.base);
            vm.map_backed(
                target + (chunk_base - source),
                chunk_end - chunk_base,
                backing,
                MemoryState::Alias,
                permissions,
            )?;
        }
        vm.set_range_state(source, size, MemoryState::Aliased);
        Ok(())
    }

    /// Reverses a Map operation, returning the source range to Private.
    pub fn unmap_alias(
        &mut self,
        process: &Arc<Process>,
        target: VAddr,
        source: VAddr,
        size: u32,
    ) -> Result<(), ResultCode> {
        let mut vm = process.vm_manager.lock();
        if !vm.range_has_state(target, size, &[MemoryState::Alias])
            || !vm.range_has_state(source, size, &[MemoryState::Aliased])
        {
            return Err(ERR_INVALID_ADDRESS_STATE);
        }
        // The alias shares the source's backing, which stays allocated.
        let _ = vm.unmap(target, size);
        vm.set_range_state(source, size, MemoryState::Private);
        vm.reprotect(source, size, MemoryPermission::READ_WRITE)?;
        Ok(())
    }

    // Shutdown and debugging

    pub fn request_shutdown(&mut self) {
        info!("shutdown requested");
        self.shutdown_requested = true;
    }

    #[inline]
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn set_break_reason(&mut self, reason: BreakReason) {
        error!("emulated program broke execution, reason {:?}", reason);
        self.break_reason = Some(reason);
    }

    #[must_use]
    pub fn break_reason(&self) -> Option<BreakReason> {
        self.break_reason
    }

    pub fn set_pending_hio(&mut self, address: VAddr) {
        self.pending_hio_address = Some(address);
    }

    /// Takes the address of an outstanding debug I/O request, if any.
    pub fn take_pending_hio(&mut self) -> Option<VAddr> {
        self.pending_hio_address.take()
    }

    #[must_use]
    pub fn take_reschedule(&mut self) -> bool {
        std::mem::take(&mut self.reschedule_needed)
    }
}
