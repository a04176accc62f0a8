/*!
 * Handle Table
 * Per-process mapping from guest handles to kernel objects
 */

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::core::result::{ResultCode, ERR_INVALID_HANDLE, ERR_OUT_OF_HANDLES};
use crate::core::types::Handle;

use super::object::AnyObject;

/// Handles a process may hold at once.
const MAX_HANDLES: usize = 4096;

/// First handle value ever issued. Values below it, including 0, are never
/// valid, and the pseudo-handle range at 0xFFFF8000 is resolved by the
/// kernel before reaching the table.
const FIRST_HANDLE: u32 = 0x100;

/// Maps guest handles to objects. Handle values are monotonic and never
/// reused, so a stale handle stays invalid after close instead of aliasing a
/// newer object.
pub struct HandleTable {
    objects: DashMap<Handle, AnyObject>,
    next_handle: AtomicU32,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            next_handle: AtomicU32::new(FIRST_HANDLE),
        }
    }

    /// Issues a new handle for `object`.
    pub fn create(&self, object: AnyObject) -> Result<Handle, ResultCode> {
        if self.objects.len() >= MAX_HANDLES {
            return Err(ERR_OUT_OF_HANDLES);
        }
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.objects.insert(handle, object);
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Option<AnyObject> {
        self.objects.get(&handle).map(|entry| entry.clone())
    }

    /// Issues a second handle to the object behind `handle`.
    pub fn duplicate(&self, handle: Handle) -> Result<Handle, ResultCode> {
        let object = self.get(handle).ok_or(ERR_INVALID_HANDLE)?;
        self.create(object)
    }

    /// Removes `handle`, returning the object it referred to.
    pub fn close(&self, handle: Handle) -> Result<AnyObject, ResultCode> {
        self.objects
            .remove(&handle)
            .map(|(_, object)| object)
            .ok_or(ERR_INVALID_HANDLE)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Event;
    use crate::objects::ResetType;
    use std::sync::Arc;

    #[test]
    fn test_handles_are_not_reused() {
        let table = HandleTable::new();
        let event = Arc::new(Event::new(ResetType::OneShot, "evt".into()));
        let a = table.create(AnyObject::Event(event.clone())).unwrap();
        table.close(a).unwrap();
        let b = table.create(AnyObject::Event(event)).unwrap();
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
        assert!(table.get(b).is_some());
    }

    #[test]
    fn test_close_invalid_handle() {
        let table = HandleTable::new();
        assert_eq!(table.close(0xDEAD).err(), Some(ERR_INVALID_HANDLE));
    }
}
