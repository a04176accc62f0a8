/*!
 * Address Space Layout
 * Fixed virtual and physical layout of the emulated console
 */

/// Page size of the emulated MMU.
pub const PAGE_SIZE: u32 = 0x1000;

/// Mask of the in-page offset bits.
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;

/// Start of the application image mapping.
pub const PROCESS_IMAGE_VADDR: u32 = 0x0010_0000;

/// Application heap window.
pub const HEAP_VADDR: u32 = 0x0800_0000;
pub const HEAP_VADDR_END: u32 = 0x1000_0000;
pub const HEAP_SIZE: u32 = HEAP_VADDR_END - HEAP_VADDR;

/// Window through which shared memory blocks are mapped.
pub const SHARED_MEMORY_VADDR: u32 = 0x1000_0000;
pub const SHARED_MEMORY_VADDR_END: u32 = 0x1400_0000;

/// Linear heap window. Mappings here preserve physical contiguity, so a
/// virtual address maps to physical `FCRAM_PADDR + (vaddr - LINEAR_HEAP_VADDR)`.
pub const LINEAR_HEAP_VADDR: u32 = 0x1400_0000;
pub const LINEAR_HEAP_VADDR_END: u32 = 0x1C00_0000;

/// Physical base of FCRAM on the memory bus.
pub const FCRAM_PADDR: u32 = 0x2000_0000;

/// Thread-local storage slots handed to new threads.
pub const TLS_AREA_VADDR: u32 = 0x1FF8_2000;
pub const TLS_ENTRY_SIZE: u32 = 0x200;

/// Offset of the IPC command buffer inside a TLS slot.
pub const COMMAND_BUFFER_OFFSET: u32 = 0x80;

/// End of the user-mode address space.
pub const USER_SPACE_END: u32 = 0x4000_0000;

/// Planned split of the 128 MiB FCRAM between regions.
pub const APPLICATION_REGION_SIZE: u32 = 0x0400_0000;
pub const SYSTEM_REGION_SIZE: u32 = 0x02C0_0000;
pub const BASE_REGION_SIZE: u32 = 0x0140_0000;

#[inline]
#[must_use]
pub const fn is_page_aligned(value: u32) -> bool {
    value & PAGE_MASK == 0
}

#[inline]
#[must_use]
pub const fn page_align_up(value: u32) -> u32 {
    (value.wrapping_add(PAGE_MASK)) & !PAGE_MASK
}
