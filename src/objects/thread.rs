/*!
 * Threads
 * Guest thread state, wait bookkeeping, and priority inheritance
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};

use crate::core::types::{Priority, ThreadId, VAddr};

use super::mutex::Mutex;
use super::object::{same_wait_object, WaitList, WaitObject};
use super::process::Process;

/// Scheduling state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Currently executing on a core.
    Running,
    /// Runnable, waiting to be scheduled.
    Ready,
    /// Blocked on an address arbiter.
    WaitArb,
    /// Sleeping for a fixed duration.
    WaitSleep,
    /// Blocked on a synchronous request reply.
    WaitIpc,
    /// Blocked until any of its wait objects signals.
    WaitSynchAny,
    /// Blocked until all of its wait objects signal.
    WaitSynchAll,
    /// Created but never started.
    Dormant,
    /// Exited.
    Dead,
}

impl ThreadStatus {
    #[inline]
    #[must_use]
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            ThreadStatus::WaitArb
                | ThreadStatus::WaitSleep
                | ThreadStatus::WaitIpc
                | ThreadStatus::WaitSynchAny
                | ThreadStatus::WaitSynchAll
        )
    }
}

/// What to do with a blocked thread's registers when it wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupCallback {
    /// WaitSynchronization1/N: write the result, and the signaled index when
    /// `do_output` is set.
    Sync { do_output: bool },
    /// ReplyAndReceive: write result and index, pulling in the pending
    /// request when the signaled object is a server session.
    ReplyReceive,
    /// ArbitrateAddress: write the result only.
    Arbiter,
}

/// Mutable portion of a thread, guarded as one unit.
pub struct ThreadState {
    pub status: ThreadStatus,
    pub current_priority: Priority,
    pub nominal_priority: Priority,
    /// Objects this thread is blocked on, in the order the guest passed them.
    pub wait_objects: Vec<Arc<dyn WaitObject>>,
    pub wakeup_callback: Option<WakeupCallback>,
    /// Arbitration address while in WaitArb.
    pub wait_address: VAddr,
    pub held_mutexes: Vec<Arc<Mutex>>,
    pub pending_mutexes: Vec<Arc<Mutex>>,
}

pub struct Thread {
    pub thread_id: ThreadId,
    pub owner: Weak<Process>,
    pub entry_point: VAddr,
    pub stack_top: VAddr,
    pub arg: u32,
    pub tls_address: VAddr,
    pub processor_id: i32,
    /// r0-r15 as last saved. Only meaningful while the thread is not
    /// running on a core.
    pub context: SyncMutex<[u32; 16]>,
    state: SyncMutex<ThreadState>,
    /// Bumped on every wake so stale timeout entries become no-ops.
    wake_token: AtomicU64,
    /// Cleared to park a thread without changing its wait state.
    can_schedule: AtomicBool,
    /// Threads joined on this thread's exit.
    wait_list: WaitList,
}

impl Thread {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        thread_id: ThreadId,
        owner: Weak<Process>,
        entry_point: VAddr,
        arg: u32,
        stack_top: VAddr,
        priority: Priority,
        processor_id: i32,
        tls_address: VAddr,
    ) -> Self {
        let mut context = [0u32; 16];
        context[0] = arg;
        context[13] = stack_top;
        context[15] = entry_point;
        Self {
            thread_id,
            owner,
            entry_point,
            stack_top,
            arg,
            tls_address,
            processor_id,
            context: SyncMutex::new(context),
            state: SyncMutex::new(ThreadState {
                status: ThreadStatus::Dormant,
                current_priority: priority,
                nominal_priority: priority,
                wait_objects: Vec::new(),
                wakeup_callback: None,
                wait_address: 0,
                held_mutexes: Vec::new(),
                pending_mutexes: Vec::new(),
            }),
            wake_token: AtomicU64::new(0),
            can_schedule: AtomicBool::new(true),
            wait_list: WaitList::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn can_schedule(&self) -> bool {
        self.can_schedule.load(Ordering::Acquire)
    }

    pub fn set_can_schedule(&self, value: bool) {
        self.can_schedule.store(value, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        self.state.lock().status
    }

    pub fn set_status(&self, status: ThreadStatus) {
        self.state.lock().status = status;
    }

    #[inline]
    #[must_use]
    pub fn current_priority(&self) -> Priority {
        self.state.lock().current_priority
    }

    #[inline]
    #[must_use]
    pub fn nominal_priority(&self) -> Priority {
        self.state.lock().nominal_priority
    }

    /// Changes the base priority, keeping any inherited boost in effect.
    pub fn set_priority(&self, priority: Priority) {
        self.state.lock().nominal_priority = priority;
        self.update_priority();
    }

    /// Recomputes the effective priority from the base priority and the
    /// waiters of every held mutex, propagating through mutexes this thread
    /// is itself blocked on.
    pub fn update_priority(&self) {
        let (changed, pending) = {
            let mut state = self.state.lock();
            let mut best = state.nominal_priority;
            for mutex in &state.held_mutexes {
                best = best.min(mutex.waiter_priority());
            }
            let changed = best != state.current_priority;
            state.current_priority = best;
            (changed, state.pending_mutexes.clone())
        };
        if changed {
            for mutex in pending {
                mutex.update_priority();
            }
        }
    }

    pub fn add_held_mutex(&self, mutex: Arc<Mutex>) {
        let mut state = self.state.lock();
        if !state.held_mutexes.iter().any(|m| Arc::ptr_eq(m, &mutex)) {
            state.held_mutexes.push(mutex);
        }
    }

    pub fn remove_held_mutex(&self, mutex: &Arc<Mutex>) {
        self.state
            .lock()
            .held_mutexes
            .retain(|m| !Arc::ptr_eq(m, mutex));
    }

    pub fn add_pending_mutex(&self, mutex: Arc<Mutex>) {
        let mut state = self.state.lock();
        if !state.pending_mutexes.iter().any(|m| Arc::ptr_eq(m, &mutex)) {
            state.pending_mutexes.push(mutex);
        }
    }

    pub fn remove_pending_mutex(&self, mutex: &Arc<Mutex>) {
        self.state
            .lock()
            .pending_mutexes
            .retain(|m| !Arc::ptr_eq(m, mutex));
    }

    #[must_use]
    pub fn held_mutexes(&self) -> Vec<Arc<Mutex>> {
        self.state.lock().held_mutexes.clone()
    }

    /// Enters a wait, recording the objects and how to deliver the wakeup.
    pub fn begin_wait(
        &self,
        status: ThreadStatus,
        wait_objects: Vec<Arc<dyn WaitObject>>,
        callback: Option<WakeupCallback>,
    ) {
        debug_assert!(status.is_waiting());
        let mut state = self.state.lock();
        state.status = status;
        state.wait_objects = wait_objects;
        state.wakeup_callback = callback;
    }

    #[must_use]
    pub fn wait_objects(&self) -> Vec<Arc<dyn WaitObject>> {
        self.state.lock().wait_objects.clone()
    }

    #[must_use]
    pub fn wakeup_callback(&self) -> Option<WakeupCallback> {
        self.state.lock().wakeup_callback
    }

    pub fn set_wait_address(&self, addr: VAddr) {
        self.state.lock().wait_address = addr;
    }

    #[inline]
    #[must_use]
    pub fn wait_address(&self) -> VAddr {
        self.state.lock().wait_address
    }

    /// Index of `object` in the wait list as the guest sees it. The last
    /// occurrence wins when a handle was passed more than once.
    #[must_use]
    pub fn wait_object_index(&self, object: &Arc<dyn WaitObject>) -> Option<usize> {
        self.state
            .lock()
            .wait_objects
            .iter()
            .rposition(|o| same_wait_object(o, object))
    }

    #[inline]
    #[must_use]
    pub fn wake_token(&self) -> u64 {
        self.wake_token.load(Ordering::Acquire)
    }

    /// Makes the thread runnable again and invalidates any armed timeout.
    pub fn resume_from_wait(&self) {
        let mut state = self.state.lock();
        state.status = ThreadStatus::Ready;
        state.wait_objects.clear();
        state.wakeup_callback = None;
        state.wait_address = 0;
        drop(state);
        self.wake_token.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks the thread exited. Mutexes it still holds are released by the
    /// kernel, which also signals joiners.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.status = ThreadStatus::Dead;
        state.wait_objects.clear();
        state.wakeup_callback = None;
        drop(state);
        self.wake_token.fetch_add(1, Ordering::AcqRel);
    }

    pub fn set_context_reg(&self, index: usize, value: u32) {
        self.context.lock()[index] = value;
    }

    pub fn save_context(&self, regs: [u32; 16]) {
        *self.context.lock() = regs;
    }

    #[must_use]
    pub fn saved_context(&self) -> [u32; 16] {
        *self.context.lock()
    }

    #[must_use]
    pub fn context_reg(&self, index: usize) -> u32 {
        self.context.lock()[index]
    }
}

impl WaitObject for Thread {
    fn should_wait(&self, _thread: &Arc<Thread>) -> bool {
        self.status() != ThreadStatus::Dead
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
