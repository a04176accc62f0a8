/*!
 * Guest Memory Access
 * Typed reads and writes against FCRAM through a process address space
 */

use parking_lot::RwLock;

use crate::core::errors::MemoryError;
use crate::core::types::VAddr;
use crate::objects::Process;

use super::layout::PAGE_SIZE;

/// The emulated console's FCRAM plus access helpers.
///
/// All accesses translate through the owning process's address space, so a
/// read or write fails cleanly on unmapped addresses instead of touching
/// unrelated memory.
pub struct GuestMemory {
    fcram: RwLock<Vec<u8>>,
}

impl GuestMemory {
    pub fn new(fcram_size: u32) -> Self {
        Self {
            fcram: RwLock::new(vec![0; fcram_size as usize]),
        }
    }

    #[inline]
    #[must_use]
    pub fn fcram_size(&self) -> u32 {
        self.fcram.read().len() as u32
    }

    pub fn is_valid_virtual_address(&self, process: &Process, addr: VAddr) -> bool {
        process.vm_manager.lock().is_valid_address(addr)
    }

    /// Copies guest memory into `buf`, page by page so that reads may span
    /// areas with discontiguous physical backing.
    pub fn read_block(
        &self,
        process: &Process,
        addr: VAddr,
        buf: &mut [u8],
    ) -> Result<(), MemoryError> {
        let fcram = self.fcram.read();
        let vm = process.vm_manager.lock();
        let mut copied = 0usize;
        while copied < buf.len() {
            let current = addr + copied as u32;
            let offset = vm.translate(current)? as usize;
            let chunk = chunk_len(current, buf.len() - copied);
            let src = fcram
                .get(offset..offset + chunk)
                .ok_or(MemoryError::BackingOutOfRange {
                    offset: offset as u32,
                    size: fcram.len() as u32,
                })?;
            buf[copied..copied + chunk].copy_from_slice(src);
            copied += chunk;
        }
        Ok(())
    }

    pub fn write_block(
        &self,
        process: &Process,
        addr: VAddr,
        buf: &[u8],
    ) -> Result<(), MemoryError> {
        let mut fcram = self.fcram.write();
        let vm = process.vm_manager.lock();
        let mut copied = 0usize;
        while copied < buf.len() {
            let current = addr + copied as u32;
            let offset = vm.translate(current)? as usize;
            let chunk = chunk_len(current, buf.len() - copied);
            let dst = fcram
                .get_mut(offset..offset + chunk)
                .ok_or(MemoryError::BackingOutOfRange {
                    offset: offset as u32,
                    size: 0,
                })?;
            dst.copy_from_slice(&buf[copied..copied + chunk]);
            copied += chunk;
        }
        Ok(())
    }

    pub fn read_u8(&self, process: &Process, addr: VAddr) -> Result<u8, MemoryError> {
        let mut buf = [0u8; 1];
        self.read_block(process, addr, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u32(&self, process: &Process, addr: VAddr) -> Result<u32, MemoryError> {
        let mut buf = [0u8; 4];
        self.read_block(process, addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&self, process: &Process, addr: VAddr) -> Result<u64, MemoryError> {
        let mut buf = [0u8; 8];
        self.read_block(process, addr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_u8(&self, process: &Process, addr: VAddr, value: u8) -> Result<(), MemoryError> {
        self.write_block(process, addr, &[value])
    }

    pub fn write_u32(&self, process: &Process, addr: VAddr, value: u32) -> Result<(), MemoryError> {
        self.write_block(process, addr, &value.to_le_bytes())
    }

    pub fn write_u64(&self, process: &Process, addr: VAddr, value: u64) -> Result<(), MemoryError> {
        self.write_block(process, addr, &value.to_le_bytes())
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes. Invalid
    /// UTF-8 is replaced rather than rejected, matching debug-output use.
    pub fn read_cstring(
        &self,
        process: &Process,
        addr: VAddr,
        max_len: u32,
    ) -> Result<String, MemoryError> {
        let mut bytes = Vec::new();
        for i in 0..max_len {
            let byte = self.read_u8(process, addr + i)?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads a fixed-length byte range as a lossy string.
    pub fn read_string(
        &self,
        process: &Process,
        addr: VAddr,
        len: u32,
    ) -> Result<String, MemoryError> {
        let mut buf = vec![0u8; len as usize];
        self.read_block(process, addr, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn zero_block(&self, process: &Process, addr: VAddr, size: u32) -> Result<(), MemoryError> {
        self.write_block(process, addr, &vec![0u8; size as usize])
    }
}

/// Length of the largest copy that stays within the page containing `addr`.
#[inline]
fn chunk_len(addr: VAddr, remaining: usize) -> usize {
    let to_page_end = (PAGE_SIZE - (addr & (PAGE_SIZE - 1))) as usize;
    to_page_end.min(remaining)
}
