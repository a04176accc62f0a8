/*!
 * Timeout Queue
 * Ordered pending wakeups for sleeping threads and armed timers
 */

use std::cmp::Ordering;
use std::sync::Weak;

use crate::objects::{Thread, Timer};

/// What a due timeout entry acts on. Targets hold weak references and carry
/// the token or generation current at arming time, so an entry outlived by a
/// wake or re-arm simply does nothing.
pub enum TimeoutTarget {
    Thread { thread: Weak<Thread>, token: u64 },
    Timer { timer: Weak<Timer>, generation: u64 },
}

pub struct TimeoutEntry {
    pub due_ns: u64,
    /// Tie-breaker keeping equal deadlines in arming order.
    pub sequence: u64,
    pub target: TimeoutTarget,
}

impl PartialEq for TimeoutEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_ns == other.due_ns && self.sequence == other.sequence
    }
}

impl Eq for TimeoutEntry {}

impl PartialOrd for TimeoutEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeoutEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due_ns, self.sequence).cmp(&(other.due_ns, other.sequence))
    }
}
