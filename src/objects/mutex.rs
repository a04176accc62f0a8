/*!
 * Mutexes
 * Recursive guest mutex with priority inheritance
 */

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;

use crate::core::result::{ResultCode, ERR_WRONG_LOCKING_THREAD, RESULT_SUCCESS};
use crate::core::types::{Priority, THREAD_PRIO_LOWEST};

use super::object::{WaitList, WaitObject};
use super::thread::Thread;

struct MutexInner {
    lock_count: u32,
    holder: Option<Arc<Thread>>,
    /// Best priority among current waiters, cached for the holder's
    /// inheritance computation.
    waiter_priority: Priority,
}

pub struct Mutex {
    pub name: String,
    inner: SyncMutex<MutexInner>,
    wait_list: WaitList,
}

impl Mutex {
    pub fn new(name: String) -> Self {
        Self {
            name,
            inner: SyncMutex::new(MutexInner {
                lock_count: 0,
                holder: None,
                waiter_priority: THREAD_PRIO_LOWEST,
            }),
            wait_list: WaitList::new(),
        }
    }

    #[must_use]
    pub fn holder(&self) -> Option<Arc<Thread>> {
        self.inner.lock().holder.clone()
    }

    /// Cached best waiter priority, LOWEST when nobody waits.
    #[inline]
    #[must_use]
    pub fn waiter_priority(&self) -> Priority {
        self.inner.lock().waiter_priority
    }

    /// Recomputes the cached waiter priority and re-evaluates the holder's
    /// inherited priority when it changed.
    pub fn update_priority(self: &Arc<Self>) {
        let best = self
            .wait_list
            .snapshot()
            .iter()
            .map(|t| t.current_priority())
            .min()
            .unwrap_or(THREAD_PRIO_LOWEST);
        let holder = {
            let mut inner = self.inner.lock();
            if inner.waiter_priority == best {
                return;
            }
            inner.waiter_priority = best;
            inner.holder.clone()
        };
        if let Some(holder) = holder {
            holder.update_priority();
        }
    }

    /// Releases one lock level held by `thread`.
    pub fn release(self: &Arc<Self>, thread: &Arc<Thread>) -> ResultCode {
        let fully_released = {
            let mut inner = self.inner.lock();
            match &inner.holder {
                Some(holder) if Arc::ptr_eq(holder, thread) => {}
                _ => return ERR_WRONG_LOCKING_THREAD,
            }
            inner.lock_count -= 1;
            if inner.lock_count == 0 {
                inner.holder = None;
                true
            } else {
                false
            }
        };
        if fully_released {
            thread.remove_held_mutex(self);
            thread.update_priority();
        }
        RESULT_SUCCESS
    }
}

impl WaitObject for Mutex {
    fn should_wait(&self, thread: &Arc<Thread>) -> bool {
        let inner = self.inner.lock();
        match &inner.holder {
            Some(holder) => !Arc::ptr_eq(holder, thread),
            None => false,
        }
    }

    fn acquire(self: Arc<Self>, thread: &Arc<Thread>) {
        let first_acquire = {
            let mut inner = self.inner.lock();
            match &inner.holder {
                Some(holder) => {
                    debug_assert!(Arc::ptr_eq(holder, thread));
                    inner.lock_count += 1;
                    false
                }
                None => {
                    inner.holder = Some(thread.clone());
                    inner.lock_count = 1;
                    true
                }
            }
        };
        if first_acquire {
            thread.remove_pending_mutex(&self);
            thread.add_held_mutex(self.clone());
            self.update_priority();
            thread.update_priority();
        }
    }

    fn add_waiting_thread(self: Arc<Self>, thread: Arc<Thread>) {
        self.wait_list.add(thread.clone());
        thread.add_pending_mutex(self.clone());
        self.update_priority();
    }

    fn remove_waiting_thread(self: Arc<Self>, thread: &Arc<Thread>) {
        self.wait_list.remove(thread);
        thread.remove_pending_mutex(&self);
        self.update_priority();
    }

    fn waiting_threads(&self) -> Vec<Arc<Thread>> {
        self.wait_list.snapshot()
    }
}
