/*!
 * Virtual Memory Areas
 * Interval map of one process address space
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::MemoryError;
use crate::core::result::{ResultCode, ERR_INVALID_ADDRESS_STATE};
use crate::core::types::VAddr;

use super::layout::USER_SPACE_END;
use super::MemoryPermission;

/// Kernel memory state of a mapped range, as reported by QueryMemory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MemoryState {
    Free = 0,
    Reserved = 1,
    Io = 2,
    Static = 3,
    Code = 4,
    Private = 5,
    Shared = 6,
    Continuous = 7,
    Aliased = 8,
    Alias = 9,
    AliasCode = 10,
    Locked = 11,
}

/// One homogeneous slice of the address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMemoryArea {
    pub base: VAddr,
    pub size: u32,
    pub state: MemoryState,
    pub permissions: MemoryPermission,
    /// FCRAM offset of the first byte, None for unbacked areas.
    pub backing_offset: Option<u32>,
}

impl VirtualMemoryArea {
    #[inline]
    #[must_use]
    pub fn end(&self) -> VAddr {
        self.base + self.size
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, addr: VAddr) -> bool {
        addr >= self.base && addr < self.end()
    }

    fn can_merge_with(&self, next: &VirtualMemoryArea) -> bool {
        self.end() == next.base
            && self.state == next.state
            && self.permissions == next.permissions
            && match (self.backing_offset, next.backing_offset) {
                (None, None) => true,
                (Some(a), Some(b)) => a + self.size == b,
                _ => false,
            }
    }
}

/// QueryMemory view of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub base_address: VAddr,
    pub size: u32,
    pub permission: u32,
    pub state: u32,
}

/// Interval map covering the whole user address space. Every address below
/// [`USER_SPACE_END`] belongs to exactly one area at all times.
#[derive(Debug)]
pub struct VmManager {
    vmas: BTreeMap<VAddr, VirtualMemoryArea>,
}

impl Default for VmManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VmManager {
    pub fn new() -> Self {
        let mut vmas = BTreeMap::new();
        vmas.insert(
            0,
            VirtualMemoryArea {
                base: 0,
                size: USER_SPACE_END,
                state: MemoryState::Free,
                permissions: MemoryPermission::NONE,
                backing_offset: None,
            },
        );
        Self { vmas }
    }

    pub fn find_vma(&self, addr: VAddr) -> Option<&VirtualMemoryArea> {
        self.vmas
            .range(..=addr)
            .next_back()
            .map(|(_, vma)| vma)
            .filter(|vma| vma.contains(addr))
    }

    /// Translates a virtual address to its FCRAM offset.
    pub fn translate(&self, addr: VAddr) -> Result<u32, MemoryError> {
        let vma = self
            .find_vma(addr)
            .filter(|vma| vma.state != MemoryState::Free)
            .ok_or(MemoryError::UnmappedAddress { addr })?;
        let offset = vma
            .backing_offset
            .ok_or(MemoryError::UnmappedAddress { addr })?;
        Ok(offset + (addr - vma.base))
    }

    #[inline]
    #[must_use]
    pub fn is_valid_address(&self, addr: VAddr) -> bool {
        self.translate(addr).is_ok()
    }

    /// Splits areas so that `base` and `base + size` fall on area boundaries.
    fn carve(&mut self, base: VAddr, size: u32) {
        self.split_at(base);
        self.split_at(base + size);
    }

    fn split_at(&mut self, addr: VAddr) {
        if addr >= USER_SPACE_END {
            return;
        }
        let Some(vma) = self.find_vma(addr).cloned() else {
            return;
        };
        if vma.base == addr {
            return;
        }
        let head_size = addr - vma.base;
        let tail = VirtualMemoryArea {
            base: addr,
            size: vma.size - head_size,
            state: vma.state,
            permissions: vma.permissions,
            backing_offset: vma.backing_offset.map(|offset| offset + head_size),
        };
        if let Some(head) = self.vmas.get_mut(&vma.base) {
            head.size = head_size;
        }
        self.vmas.insert(addr, tail);
    }

    fn coalesce_around(&mut self, base: VAddr, size: u32) {
        let mut cursor = self.area_start_at_or_before(base.saturating_sub(1));
        let end = (base + size).min(USER_SPACE_END - 1);
        while cursor < USER_SPACE_END {
            let Some(current) = self.vmas.get(&cursor).cloned() else {
                break;
            };
            if current.base > end {
                break;
            }
            if let Some(next) = self.vmas.get(&current.end()).cloned() {
                if current.can_merge_with(&next) {
                    self.vmas.remove(&next.base);
                    if let Some(merged) = self.vmas.get_mut(&cursor) {
                        merged.size += next.size;
                    }
                    continue;
                }
            }
            cursor = current.end();
        }
    }

    fn area_start_at_or_before(&self, addr: VAddr) -> VAddr {
        self.vmas
            .range(..=addr)
            .next_back()
            .map(|(&base, _)| base)
            .unwrap_or(0)
    }

    /// First free gap of at least `size` bytes inside `[start, end)`.
    pub fn find_free_range(&self, start: VAddr, end: VAddr, size: u32) -> Option<VAddr> {
        let mut addr = start;
        while addr < end {
            let vma = self.find_vma(addr)?;
            let gap_end = vma.end().min(end);
            if vma.state == MemoryState::Free && gap_end - addr >= size {
                return Some(addr);
            }
            addr = vma.end();
        }
        None
    }

    /// Clones the areas overlapping `[base, base + size)`, in address order.
    pub fn range_vmas(&self, base: VAddr, size: u32) -> Vec<VirtualMemoryArea> {
        let mut out = Vec::new();
        let mut addr = base;
        let end = base + size;
        while addr < end {
            match self.find_vma(addr) {
                Some(vma) => {
                    out.push(vma.clone());
                    addr = vma.end();
                }
                None => break,
            }
        }
        out
    }

    /// True when the whole range has one of the given states.
    pub fn range_has_state(&self, base: VAddr, size: u32, states: &[MemoryState]) -> bool {
        let vmas = self.range_vmas(base, size);
        !vmas.is_empty()
            && vmas.last().map(|vma| vma.end()) >= Some(base + size)
            && vmas.iter().all(|vma| states.contains(&vma.state))
    }

    /// Maps FCRAM-backed memory over a range that must currently be free.
    pub fn map_backed(
        &mut self,
        base: VAddr,
        size: u32,
        backing_offset: u32,
        state: MemoryState,
        permissions: MemoryPermission,
    ) -> Result<(), ResultCode> {
        if !self.range_has_state(base, size, &[MemoryState::Free]) {
            return Err(ERR_INVALID_ADDRESS_STATE);
        }
        self.carve(base, size);
        // The carved free range is a single area since free areas merge.
        if let Some(vma) = self.vmas.get_mut(&base) {
            debug_assert_eq!(vma.size, size);
            vma.state = state;
            vma.permissions = permissions;
            vma.backing_offset = Some(backing_offset);
        }
        self.coalesce_around(base, size);
        Ok(())
    }

    /// Unmaps a range, returning the FCRAM blocks that backed it.
    pub fn unmap(&mut self, base: VAddr, size: u32) -> Vec<(u32, u32)> {
        self.carve(base, size);
        let mut freed = Vec::new();
        let mut addr = base;
        let end = base + size;
        while addr < end {
            let Some(vma) = self.vmas.get_mut(&addr) else {
                break;
            };
            if let Some(offset) = vma.backing_offset {
                freed.push((offset, vma.size));
            }
            let next = vma.end();
            vma.state = MemoryState::Free;
            vma.permissions = MemoryPermission::NONE;
            vma.backing_offset = None;
            addr = next;
        }
        self.coalesce_around(base, size);
        freed
    }

    /// Changes the permissions of an already mapped range.
    pub fn reprotect(
        &mut self,
        base: VAddr,
        size: u32,
        permissions: MemoryPermission,
    ) -> Result<(), ResultCode> {
        let vmas = self.range_vmas(base, size);
        if vmas.is_empty()
            || vmas.last().map(|vma| vma.end()) < Some(base + size)
            || vmas.iter().any(|vma| vma.state == MemoryState::Free)
        {
            return Err(ERR_INVALID_ADDRESS_STATE);
        }
        self.carve(base, size);
        let mut addr = base;
        while addr < base + size {
            let Some(vma) = self.vmas.get_mut(&addr) else {
                break;
            };
            vma.permissions = permissions;
            addr = vma.end();
        }
        self.coalesce_around(base, size);
        Ok(())
    }

    /// Changes the state of an already carved range. The caller is expected
    /// to have validated the current state with [`VmManager::range_has_state`].
    pub fn set_range_state(&mut self, base: VAddr, size: u32, state: MemoryState) {
        self.carve(base, size);
        let mut addr = base;
        while addr < base + size {
            let Some(vma) = self.vmas.get_mut(&addr) else {
                break;
            };
            vma.state = state;
            addr = vma.end();
        }
        self.coalesce_around(base, size);
    }

    /// QueryMemory view of `addr`. Adjacent areas with equal state and
    /// permissions are reported as one, whether or not their physical
    /// backing is contiguous.
    pub fn query(&self, addr: VAddr) -> Option<MemoryInfo> {
        let vma = self.find_vma(addr)?;
        let mut base = vma.base;
        let mut end = vma.end();
        while let Some(prev) = self.find_vma(base.wrapping_sub(1)) {
            if base == 0 || prev.state != vma.state || prev.permissions != vma.permissions {
                break;
            }
            base = prev.base;
        }
        while let Some(next) = self.vmas.get(&end) {
            if next.state != vma.state || next.permissions != vma.permissions {
                break;
            }
            end = next.end();
        }
        Some(MemoryInfo {
            base_address: base,
            size: end - base,
            permission: vma.permissions.bits(),
            state: vma.state as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_space_is_one_free_area() {
        let vm = VmManager::new();
        let info = vm.query(0x1234).unwrap();
        assert_eq!(info.base_address, 0);
        assert_eq!(info.size, USER_SPACE_END);
        assert_eq!(info.state, MemoryState::Free as u32);
    }

    #[test]
    fn test_map_and_translate() {
        let mut vm = VmManager::new();
        vm.map_backed(
            0x0800_0000,
            0x2000,
            0x4000,
            MemoryState::Private,
            MemoryPermission::READ_WRITE,
        )
        .unwrap();
        assert_eq!(vm.translate(0x0800_0000).unwrap(), 0x4000);
        assert_eq!(vm.translate(0x0800_1004).unwrap(), 0x5004);
        assert!(vm.translate(0x0800_2000).is_err());
        assert!(vm.translate(0x0700_0000).is_err());
    }

    #[test]
    fn test_double_map_rejected() {
        let mut vm = VmManager::new();
        vm.map_backed(
            0x0800_0000,
            0x1000,
            0,
            MemoryState::Private,
            MemoryPermission::READ_WRITE,
        )
        .unwrap();
        let err = vm
            .map_backed(
                0x0800_0000,
                0x1000,
                0x1000,
                MemoryState::Private,
                MemoryPermission::READ_WRITE,
            )
            .unwrap_err();
        assert_eq!(err, ERR_INVALID_ADDRESS_STATE);
    }

    #[test]
    fn test_unmap_returns_backing_and_frees() {
        let mut vm = VmManager::new();
        vm.map_backed(
            0x0800_0000,
            0x3000,
            0x9000,
            MemoryState::Private,
            MemoryPermission::READ_WRITE,
        )
        .unwrap();
        let freed = vm.unmap(0x0800_1000, 0x1000);
        assert_eq!(freed, vec![(0xA000, 0x1000)]);
        assert!(vm.translate(0x0800_1000).is_err());
        assert_eq!(vm.translate(0x0800_2000).unwrap(), 0xB000);
    }

    #[test]
    fn test_query_merges_equal_neighbors() {
        let mut vm = VmManager::new();
        // Two mappings with discontiguous backing but identical attributes.
        vm.map_backed(
            0x0800_0000,
            0x1000,
            0x0000,
            MemoryState::Private,
            MemoryPermission::READ_WRITE,
        )
        .unwrap();
        vm.map_backed(
            0x0800_1000,
            0x1000,
            0x8000,
            MemoryState::Private,
            MemoryPermission::READ_WRITE,
        )
        .unwrap();
        let info = vm.query(0x0800_0800).unwrap();
        assert_eq!(info.base_address, 0x0800_0000);
        assert_eq!(info.size, 0x2000);
        assert_eq!(info.state, MemoryState::Private as u32);
    }

    #[test]
    fn test_reprotect_splits_area() {
        let mut vm = VmManager::new();
        vm.map_backed(
            0x0800_0000,
            0x3000,
            0,
            MemoryState::Private,
            MemoryPermission::READ_WRITE,
        )
        .unwrap();
        vm.reprotect(0x0800_1000, 0x1000, MemoryPermission::READ)
            .unwrap();
        let info = vm.query(0x0800_1000).unwrap();
        assert_eq!(info.base_address, 0x0800_1000);
        assert_eq!(info.size, 0x1000);
        assert_eq!(info.permission, MemoryPermission::READ.bits());
        assert!(vm.reprotect(0x3000_0000, 0x1000, MemoryPermission::READ).is_err());
    }
}
