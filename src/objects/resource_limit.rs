/*!
 * Resource Limits
 * Per-category caps on kernel resource consumption
 */

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};

/// Resource kinds addressable through the limit query calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum ResourceLimitType {
    Commit = 0,
    Thread = 1,
    Event = 2,
    Mutex = 3,
    Semaphore = 4,
    Timer = 5,
    SharedMemory = 6,
    AddressArbiter = 7,
    CpuTime = 8,
    Priority = 9,
}

impl ResourceLimitType {
    pub const COUNT: usize = 10;

    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Commit),
            1 => Some(Self::Thread),
            2 => Some(Self::Event),
            3 => Some(Self::Mutex),
            4 => Some(Self::Semaphore),
            5 => Some(Self::Timer),
            6 => Some(Self::SharedMemory),
            7 => Some(Self::AddressArbiter),
            8 => Some(Self::CpuTime),
            9 => Some(Self::Priority),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLimitCategory {
    Application,
    SysApplet,
    LibApplet,
    Other,
}

/// Caps and current usage for one process category.
pub struct ResourceLimit {
    pub name: String,
    pub category: ResourceLimitCategory,
    limits: [i64; ResourceLimitType::COUNT],
    current: SyncMutex<[i64; ResourceLimitType::COUNT]>,
}

impl ResourceLimit {
    pub fn new(category: ResourceLimitCategory, name: String) -> Self {
        let mut limits = [0i64; ResourceLimitType::COUNT];
        match category {
            ResourceLimitCategory::Application => {
                limits[ResourceLimitType::Commit as usize] = 0x0400_0000;
                limits[ResourceLimitType::Thread as usize] = 0x20;
                limits[ResourceLimitType::Event as usize] = 0x20;
                limits[ResourceLimitType::Mutex as usize] = 0x20;
                limits[ResourceLimitType::Semaphore as usize] = 0x08;
                limits[ResourceLimitType::Timer as usize] = 0x08;
                limits[ResourceLimitType::SharedMemory as usize] = 0x10;
                limits[ResourceLimitType::AddressArbiter as usize] = 0x02;
                limits[ResourceLimitType::CpuTime as usize] = 0x00;
                limits[ResourceLimitType::Priority as usize] = 0x18;
            }
            ResourceLimitCategory::SysApplet
            | ResourceLimitCategory::LibApplet
            | ResourceLimitCategory::Other => {
                limits[ResourceLimitType::Commit as usize] = 0x0260_0000;
                limits[ResourceLimitType::Thread as usize] = 0x1D;
                limits[ResourceLimitType::Event as usize] = 0x0B;
                limits[ResourceLimitType::Mutex as usize] = 0x08;
                limits[ResourceLimitType::Semaphore as usize] = 0x04;
                limits[ResourceLimitType::Timer as usize] = 0x04;
                limits[ResourceLimitType::SharedMemory as usize] = 0x08;
                limits[ResourceLimitType::AddressArbiter as usize] = 0x01;
                limits[ResourceLimitType::CpuTime as usize] = 0x2710;
                limits[ResourceLimitType::Priority as usize] = 0x04;
            }
        }
        Self {
            name,
            category,
            limits,
            current: SyncMutex::new([0; ResourceLimitType::COUNT]),
        }
    }

    #[must_use]
    pub fn limit_value(&self, resource: ResourceLimitType) -> i64 {
        self.limits[resource as usize]
    }

    #[must_use]
    pub fn current_value(&self, resource: ResourceLimitType) -> i64 {
        self.current.lock()[resource as usize]
    }

    /// Priority ceiling: lower numeric values are better priorities, so a
    /// thread priority below this value is out of reach for the category.
    #[inline]
    #[must_use]
    pub fn max_priority(&self) -> u32 {
        self.limits[ResourceLimitType::Priority as usize] as u32
    }

    pub fn add_used(&self, resource: ResourceLimitType, amount: i64) {
        self.current.lock()[resource as usize] += amount;
    }

    pub fn release(&self, resource: ResourceLimitType, amount: i64) {
        let mut current = self.current.lock();
        current[resource as usize] = (current[resource as usize] - amount).max(0);
    }
}
