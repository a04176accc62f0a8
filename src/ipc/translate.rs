/*!
 * Command Buffer Translation
 * Copies IPC commands between TLS buffers, rewriting translate descriptors
 */

use std::sync::Arc;

use log::{error, warn};

use crate::core::result::{
    ResultCode, ERR_INVALID_COMBINATION, ERR_SESSION_CLOSED_BY_REMOTE, RESULT_SUCCESS,
};
use crate::kernel::Kernel;
use crate::memory::layout::COMMAND_BUFFER_OFFSET;
use crate::objects::{AnyObject, Process, ServerSession, Thread};

/// Command id used to receive without sending a reply.
pub const CMD_ID_NO_REPLY: u32 = 0xFFFF;

const DESC_TYPE_MASK: u32 = 0x2C;
const DESC_HANDLE_MOVE: u32 = 0x10;
const DESC_CALLING_PID: u32 = 0x20;
const DESC_STATIC_BUFFER: u32 = 0x02;
const DESC_MAPPED_BUFFER: u32 = 0x08;

/// First word of an IPC command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader(pub u32);

impl CommandHeader {
    #[inline]
    #[must_use]
    pub fn command_id(self) -> u32 {
        self.0 >> 16
    }

    #[inline]
    #[must_use]
    pub fn normal_params(self) -> u32 {
        (self.0 >> 6) & 0x3F
    }

    #[inline]
    #[must_use]
    pub fn translate_params(self) -> u32 {
        self.0 & 0x3F
    }
}

#[inline]
#[must_use]
pub fn command_buffer_address(thread: &Thread) -> u32 {
    thread.tls_address + COMMAND_BUFFER_OFFSET
}

/// Copies the command in `src_thread`'s TLS buffer into `dst_thread`'s,
/// translating the descriptor area: handles move between the two handle
/// tables, process-id placeholders are filled in, and buffer descriptors
/// pass through unchanged since both sides address the same guest memory.
pub fn translate_command_buffer(
    kernel: &mut Kernel,
    src_thread: &Arc<Thread>,
    dst_thread: &Arc<Thread>,
) -> Result<(), ResultCode> {
    let src_process = src_thread.owner.upgrade().ok_or(ERR_INVALID_COMBINATION)?;
    let dst_process = dst_thread.owner.upgrade().ok_or(ERR_INVALID_COMBINATION)?;
    let memory = kernel.memory.clone();

    let src_address = command_buffer_address(src_thread);
    let dst_address = command_buffer_address(dst_thread);

    let header = CommandHeader(memory.read_u32(&src_process, src_address)?);
    let normal = header.normal_params();
    let translate = header.translate_params();

    // Header plus untranslated parameters copy through as-is.
    for i in 0..=normal {
        let word = memory.read_u32(&src_process, src_address + i * 4)?;
        memory.write_u32(&dst_process, dst_address + i * 4, word)?;
    }

    let mut i = normal + 1;
    let end = normal + translate;
    while i <= end {
        let descriptor = memory.read_u32(&src_process, src_address + i * 4)?;
        memory.write_u32(&dst_process, dst_address + i * 4, descriptor)?;
        i += 1;

        if descriptor & DESC_TYPE_MASK == 0 {
            // Handle descriptor carrying one or more handles.
            let count = (descriptor >> 26) + 1;
            let move_handles = descriptor & DESC_HANDLE_MOVE != 0;
            for _ in 0..count {
                let handle = memory.read_u32(&src_process, src_address + i * 4)?;
                let translated =
                    translate_handle(&src_process, &dst_process, handle, move_handles)?;
                memory.write_u32(&dst_process, dst_address + i * 4, translated)?;
                i += 1;
            }
        } else if descriptor & DESC_CALLING_PID != 0 {
            memory.write_u32(&dst_process, dst_address + i * 4, src_process.process_id)?;
            i += 1;
        } else if descriptor & DESC_STATIC_BUFFER != 0 || descriptor & DESC_MAPPED_BUFFER != 0 {
            // Both sides see the same physical memory, so the address word
            // stays meaningful without remapping.
            let word = memory.read_u32(&src_process, src_address + i * 4)?;
            memory.write_u32(&dst_process, dst_address + i * 4, word)?;
            i += 1;
        } else {
            error!("unknown IPC descriptor {descriptor:#010x}");
            return Err(ERR_INVALID_COMBINATION);
        }
    }

    Ok(())
}

fn translate_handle(
    src_process: &Arc<Process>,
    dst_process: &Arc<Process>,
    handle: u32,
    move_handle: bool,
) -> Result<u32, ResultCode> {
    if handle == 0 {
        return Ok(0);
    }
    let object: AnyObject = src_process
        .handle_table
        .get(handle)
        .ok_or(ERR_INVALID_COMBINATION)?;
    let translated = dst_process.handle_table.create(object)?;
    if move_handle {
        let _ = src_process.handle_table.close(handle);
    }
    Ok(translated)
}

/// Pulls the pending request of `server_session` into `thread`'s command
/// buffer. Called when a receive finds, or is woken by, a ready session.
pub fn receive_ipc_request(
    kernel: &mut Kernel,
    server_session: &Arc<ServerSession>,
    thread: &Arc<Thread>,
) -> ResultCode {
    if !server_session.link.client_alive() {
        return ERR_SESSION_CLOSED_BY_REMOTE;
    }
    let Some(requester) = server_session.currently_handling() else {
        warn!("receive on session {} with no pending request", server_session.link.name);
        return ERR_SESSION_CLOSED_BY_REMOTE;
    };

    match translate_command_buffer(kernel, &requester, thread) {
        Ok(()) => RESULT_SUCCESS,
        Err(err) => {
            // A request that cannot be delivered bounces straight back to
            // the client; the session no longer handles it.
            error!(
                "request translation failed on {}: {:#010x}",
                server_session.link.name,
                err.raw()
            );
            requester.set_context_reg(0, err.raw());
            requester.resume_from_wait();
            server_session.take_currently_handling();
            err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields() {
        let header = CommandHeader(0x0001_0042);
        assert_eq!(header.command_id(), 1);
        assert_eq!(header.normal_params(), 1);
        assert_eq!(header.translate_params(), 2);

        let no_reply = CommandHeader(0xFFFF_0000);
        assert_eq!(no_reply.command_id(), CMD_ID_NO_REPLY);
    }
}
