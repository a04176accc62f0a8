/*!
 * Physical Regions
 * First-fit allocation of FCRAM intervals for the three kernel regions
 */

use serde::{Deserialize, Serialize};

use super::layout::{BASE_REGION_SIZE, SYSTEM_REGION_SIZE};

/// The three fixed FCRAM partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRegionKind {
    Application,
    System,
    Base,
}

/// One FCRAM partition with a free-interval list.
///
/// Offsets returned by [`MemoryRegion::allocate`] are absolute FCRAM offsets,
/// not region-relative ones.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub kind: MemoryRegionKind,
    pub base: u32,
    pub size: u32,
    pub used: u32,
    free_blocks: Vec<(u32, u32)>,
}

impl MemoryRegion {
    pub fn new(kind: MemoryRegionKind, base: u32, size: u32) -> Self {
        Self {
            kind,
            base,
            size,
            used: 0,
            free_blocks: vec![(base, size)],
        }
    }

    #[inline]
    #[must_use]
    pub fn available(&self) -> u32 {
        self.size - self.used
    }

    /// Allocates a physically contiguous block, first fit.
    pub fn allocate(&mut self, size: u32) -> Option<u32> {
        let index = self
            .free_blocks
            .iter()
            .position(|&(_, block_size)| block_size >= size)?;
        let (offset, block_size) = self.free_blocks[index];
        if block_size == size {
            self.free_blocks.remove(index);
        } else {
            self.free_blocks[index] = (offset + size, block_size - size);
        }
        self.used += size;
        Some(offset)
    }

    /// Claims the exact interval `[offset, offset + size)` if it is free.
    pub fn allocate_at(&mut self, offset: u32, size: u32) -> bool {
        let Some(index) = self
            .free_blocks
            .iter()
            .position(|&(free_offset, free_size)| {
                offset >= free_offset && offset + size <= free_offset + free_size
            })
        else {
            return false;
        };
        let (free_offset, free_size) = self.free_blocks[index];
        self.free_blocks.remove(index);
        if offset > free_offset {
            self.free_blocks
                .insert(index, (free_offset, offset - free_offset));
        }
        let tail_start = offset + size;
        let tail_end = free_offset + free_size;
        if tail_end > tail_start {
            let tail_index = self
                .free_blocks
                .iter()
                .position(|&(o, _)| o > tail_start)
                .unwrap_or(self.free_blocks.len());
            self.free_blocks.insert(tail_index, (tail_start, tail_end - tail_start));
        }
        self.used += size;
        true
    }

    /// Returns a block to the region, merging with adjacent free intervals.
    pub fn free(&mut self, offset: u32, size: u32) {
        debug_assert!(offset >= self.base && offset + size <= self.base + self.size);
        let index = self
            .free_blocks
            .iter()
            .position(|&(free_offset, _)| free_offset > offset)
            .unwrap_or(self.free_blocks.len());
        self.free_blocks.insert(index, (offset, size));
        self.used -= size;

        // Merge the inserted interval with its neighbors.
        if index + 1 < self.free_blocks.len() {
            let (next_offset, next_size) = self.free_blocks[index + 1];
            if offset + size == next_offset {
                self.free_blocks[index].1 += next_size;
                self.free_blocks.remove(index + 1);
            }
        }
        if index > 0 {
            let (prev_offset, prev_size) = self.free_blocks[index - 1];
            if prev_offset + prev_size == offset {
                self.free_blocks[index - 1].1 += self.free_blocks[index].1;
                self.free_blocks.remove(index);
            }
        }
    }
}

/// Builds the three partitions covering `fcram_size` bytes. The system and
/// base partitions keep their planned sizes; the application partition
/// absorbs the remainder.
pub fn build_regions(fcram_size: u32) -> [MemoryRegion; 3] {
    debug_assert!(fcram_size > SYSTEM_REGION_SIZE + BASE_REGION_SIZE);
    let app_size = fcram_size - SYSTEM_REGION_SIZE - BASE_REGION_SIZE;
    [
        MemoryRegion::new(MemoryRegionKind::Application, 0, app_size),
        MemoryRegion::new(MemoryRegionKind::System, app_size, SYSTEM_REGION_SIZE),
        MemoryRegion::new(
            MemoryRegionKind::Base,
            app_size + SYSTEM_REGION_SIZE,
            BASE_REGION_SIZE,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free_merges() {
        let mut region = MemoryRegion::new(MemoryRegionKind::Application, 0, 0x10000);
        let a = region.allocate(0x1000).unwrap();
        let b = region.allocate(0x2000).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 0x1000);
        assert_eq!(region.used, 0x3000);

        region.free(a, 0x1000);
        region.free(b, 0x2000);
        assert_eq!(region.used, 0);
        let c = region.allocate(0x10000).unwrap();
        assert_eq!(c, 0);
    }

    #[test]
    fn test_allocation_exhaustion() {
        let mut region = MemoryRegion::new(MemoryRegionKind::System, 0, 0x2000);
        assert!(region.allocate(0x3000).is_none());
        assert!(region.allocate(0x2000).is_some());
        assert!(region.allocate(0x1000).is_none());
    }

    #[test]
    fn test_build_regions_cover_fcram() {
        let regions = build_regions(0x0800_0000);
        let total: u32 = regions.iter().map(|r| r.size).sum();
        assert_eq!(total, 0x0800_0000);
        assert_eq!(regions[0].base, 0);
        assert_eq!(regions[1].base, regions[0].size);
        assert_eq!(regions[2].base + regions[2].size, 0x0800_0000);
    }
}
