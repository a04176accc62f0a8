/*!
 * Address Arbiters
 * Futex-style arbitration on guest addresses
 */

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};

use crate::core::types::VAddr;

use super::thread::{Thread, ThreadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationType {
    Signal,
    WaitIfLessThan,
    DecrementAndWaitIfLessThan,
    WaitIfLessThanWithTimeout,
    DecrementAndWaitIfLessThanWithTimeout,
}

impl ArbitrationType {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Signal),
            1 => Some(Self::WaitIfLessThan),
            2 => Some(Self::DecrementAndWaitIfLessThan),
            3 => Some(Self::WaitIfLessThanWithTimeout),
            4 => Some(Self::DecrementAndWaitIfLessThanWithTimeout),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn has_timeout(self) -> bool {
        matches!(
            self,
            Self::WaitIfLessThanWithTimeout | Self::DecrementAndWaitIfLessThanWithTimeout
        )
    }

    #[inline]
    #[must_use]
    pub fn decrements(self) -> bool {
        matches!(
            self,
            Self::DecrementAndWaitIfLessThan | Self::DecrementAndWaitIfLessThanWithTimeout
        )
    }
}

pub struct AddressArbiter {
    pub name: String,
    waiting_threads: SyncMutex<Vec<Arc<Thread>>>,
}

impl AddressArbiter {
    pub fn new(name: String) -> Self {
        Self {
            name,
            waiting_threads: SyncMutex::new(Vec::new()),
        }
    }

    pub fn add_waiter(&self, thread: Arc<Thread>) {
        self.waiting_threads.lock().push(thread);
    }

    /// Takes the threads to resume for a signal on `addr`. A negative
    /// `count` releases every eligible waiter, otherwise the `count` best
    /// priority ones. Entries that stopped arbitrating are pruned here
    /// rather than at wake time.
    pub fn take_resumable(&self, addr: VAddr, count: i32) -> Vec<Arc<Thread>> {
        let mut waiting = self.waiting_threads.lock();
        waiting.retain(|t| t.status() == ThreadStatus::WaitArb);

        let mut eligible: Vec<usize> = waiting
            .iter()
            .enumerate()
            .filter(|(_, t)| t.wait_address() == addr)
            .map(|(i, _)| i)
            .collect();
        eligible.sort_by_key(|&i| waiting[i].current_priority());
        if count >= 0 {
            eligible.truncate(count as usize);
        }

        let mut resumed = Vec::with_capacity(eligible.len());
        // Remove back-to-front so indices stay valid.
        eligible.sort_unstable_by(|a, b| b.cmp(a));
        for index in eligible {
            resumed.push(waiting.remove(index));
        }
        resumed.sort_by_key(|t| t.current_priority());
        resumed
    }
}
