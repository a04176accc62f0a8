/*!
 * Debug Calls
 * Break and guest debug output
 */

use log::{debug, error, warn};

use crate::core::types::VAddr;
use crate::kernel::BreakReason;

use super::Svc;

impl Svc<'_> {
    pub(super) fn op_break(&mut self, reason: u32) {
        let reason = BreakReason::from(reason as u8);
        error!(
            "thread {} hit a kernel break, reason {:?}",
            self.thread.thread_id, reason
        );
        self.kernel.set_break_reason(reason);
    }

    pub(super) fn op_output_debug_string(&mut self, address: VAddr, length: i32) {
        let Ok(process) = self.current_process() else {
            return;
        };
        let memory = self.kernel.memory.clone();
        if !memory.is_valid_virtual_address(&process, address) {
            warn!("debug output from invalid address {address:#010x}");
            return;
        }
        if length == 0 {
            // Zero length hands the buffer to an attached host debugger.
            self.kernel.set_pending_hio(address);
            return;
        }
        if length < 0 {
            warn!("debug output with negative length {length}");
            return;
        }
        match memory.read_string(&process, address, length as u32) {
            Ok(text) => debug!("guest: {text}"),
            Err(err) => warn!("debug output read failed: {err}"),
        }
    }
}
