/*!
 * Timers
 * One-shot and periodic timers driven by the kernel clock
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;

use crate::core::types::Nanoseconds;

use super::event::ResetType;
use super::object::{WaitList, WaitObject};
use super::thread::Thread;

struct TimerInner {
    signaled: bool,
    initial_delay: Nanoseconds,
    interval_delay: Nanoseconds,
}

pub struct Timer {
    pub name: String,
    pub reset_type: ResetType,
    inner: SyncMutex<TimerInner>,
    /// Bumped on Set and Cancel so in-flight expirations for an older
    /// arming become no-ops.
    generation: AtomicU64,
    wait_list: WaitList,
}

impl Timer {
    pub fn new(reset_type: ResetType, name: String) -> Self {
        Self {
            name,
            reset_type,
            inner: SyncMutex::new(TimerInner {
                signaled: false,
                initial_delay: 0,
                interval_delay: 0,
            }),
            generation: AtomicU64::new(0),
            wait_list: WaitList::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.inner.lock().signaled
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn interval_delay(&self) -> Nanoseconds {
        self.inner.lock().interval_delay
    }

    /// Arms the timer. Returns the generation the expiration must present.
    pub fn arm(&self, initial: Nanoseconds, interval: Nanoseconds) -> u64 {
        let mut inner = self.inner.lock();
        inner.signaled = false;
        inner.initial_delay = initial;
        inner.interval_delay = interval;
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Disarms without clearing the signaled state.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn clear(&self) {
        self.inner.lock().signaled = false;
    }

    /// Marks the timer expired. The kernel signals waiters and handles
    /// interval re-arming.
    pub fn fire(&self) {
        self.inner.lock().signaled = true;
    }
}

impl WaitObject for Timer {
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
