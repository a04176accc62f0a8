/*!
 * Events
 * Signalable events with one-shot or sticky reset behavior
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::object::{WaitList, WaitObject};
use super::thread::Thread;

/// How a signaled object resets once a waiter consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetType {
    /// Clears when one waiter acquires it.
    OneShot,
    /// Stays signaled until explicitly cleared.
    Sticky,
    /// Wakes waiters without latching; treated as one-shot here.
    Pulse,
}

impl ResetType {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::OneShot),
            1 => Some(Self::Sticky),
            2 => Some(Self::Pulse),
            _ => None,
        }
    }
}

pub struct Event {
    pub name: String,
    pub reset_type: ResetType,
    signaled: AtomicBool,
    wait_list: WaitList,
}

impl Event {
    pub fn new(reset_type: ResetType, name: String) -> Self {
        Self {
            name,
            reset_type,
            signaled: AtomicBool::new(false),
            wait_list: WaitList::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.signaled.store(false, Ordering::Release);
    }
}

impl WaitObject for Event {
    fn should_wait(&self, _thread: &Arc<Thread>) -> bool {
        !self.is_signaled()
    }

    fn acquire(self: Arc<Self>, _thread: &Arc<Thread>) {
        if matches!(self.reset_type, ResetType::OneShot | ResetType::Pulse) {
            self.clear();
        }
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
