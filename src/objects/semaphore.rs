/*!
 * Semaphores
 * Counting semaphore with a fixed ceiling
 */

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;

use crate::core::result::{ResultCode, ERR_INVALID_COMBINATION, ERR_OUT_OF_RANGE_KERNEL};

use super::object::{WaitList, WaitObject};
use super::thread::Thread;

pub struct Semaphore {
    pub name: String,
    pub max_count: i32,
    available: SyncMutex<i32>,
    wait_list: WaitList,
}

impl Semaphore {
    pub fn new(initial_count: i32, max_count: i32, name: String) -> Result<Self, ResultCode> {
        if initial_count > max_count {
            return Err(ERR_INVALID_COMBINATION);
        }
        Ok(Self {
            name,
            max_count,
            available: SyncMutex::new(initial_count),
            wait_list: WaitList::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn available_count(&self) -> i32 {
        *self.available.lock()
    }

    /// Raises the count by `release_count`, returning the previous count.
    pub fn release(&self, release_count: i32) -> Result<i32, ResultCode> {
        let mut available = self.available.lock();
        if self.max_count - *available < release_count {
            return Err(ERR_OUT_OF_RANGE_KERNEL);
        }
        let previous = *available;
        *available += release_count;
        Ok(previous)
    }
}

impl WaitObject for Semaphore {
    fn should_wait(&self, _thread: &Arc<Thread>) -> bool {
        *self.available.lock() <= 0
    }

    fn acquire(self: Arc<Self>, _thread: &Arc<Thread>) {
        *self.available.lock() -= 1;
    }

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
