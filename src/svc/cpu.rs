/*!
 * Guest CPU Interface
 * Register access the dispatcher needs from the executing core
 */

/// The view of the calling core a supervisor call operates on. Implemented
/// by the embedding CPU emulator; [`RegisterFile`] is a plain implementation
/// for hosts and tests that drive calls directly.
pub trait GuestCpu {
    fn reg(&self, index: usize) -> u32;

    fn set_reg(&mut self, index: usize, value: u32);

    fn pc(&self) -> u32 {
        self.reg(15)
    }

    fn lr(&self) -> u32 {
        self.reg(14)
    }

    /// Instruction cache invalidation hook; a no-op for hosts without a JIT.
    fn invalidate_cache_range(&mut self, _addr: u32, _size: u32) {}

    fn invalidate_entire_cache(&mut self) {}
}

/// Sixteen general purpose registers and nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFile {
    pub regs: [u32; 16],
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuestCpu for RegisterFile {
    fn reg(&self, index: usize) -> u32 {
        self.regs[index]
    }

    fn set_reg(&mut self, index: usize, value: u32) {
        self.regs[index] = value;
    }
}
