/*!
 * Thread Calls
 * Creation, exit, sleep, and priority management
 */

use std::sync::Arc;

use log::{debug, info};

use crate::core::result::{
    ResultCode, ERR_INVALID_HANDLE, ERR_NOT_AUTHORIZED, ERR_OUT_OF_RANGE, ERR_THREAD_NOT_FOUND,
};
use crate::core::types::{
    Handle, Nanoseconds, ThreadId, VAddr, PROCESSOR_ID_ALL, PROCESSOR_ID_DEFAULT,
    THREAD_PRIO_LOWEST,
};
use crate::objects::{AnyObject, ThreadStatus};

use super::Svc;

impl Svc<'_> {
    pub(super) fn op_create_thread(
        &mut self,
        priority: u32,
        entry_point: VAddr,
        arg: u32,
        stack_top: VAddr,
        processor_id: i32,
    ) -> Result<Handle, ResultCode> {
        if priority > THREAD_PRIO_LOWEST {
            return Err(ERR_OUT_OF_RANGE);
        }
        let process = self.current_process()?;

        if self.kernel.config.enforce_restrictions
            && process.resource_limit.max_priority() > priority
            && !process.thread_restrictions_disabled()
        {
            return Err(ERR_NOT_AUTHORIZED);
        }

        let processor_id = match processor_id {
            PROCESSOR_ID_DEFAULT => process.ideal_processor,
            PROCESSOR_ID_ALL => {
                info!("thread created with no processor affinity, running on core 0");
                0
            }
            0..=3 => processor_id,
            _ => return Err(ERR_OUT_OF_RANGE),
        };

        let thread = self.kernel.create_thread(
            &process,
            entry_point,
            arg,
            stack_top,
            priority,
            processor_id,
        )?;
        debug!(
            "created thread {} entry={entry_point:#010x} priority={priority} core={processor_id}",
            thread.thread_id
        );
        process.handle_table.create(AnyObject::Thread(thread))
    }

    pub(super) fn op_exit_thread(&mut self) {
        info!("thread {} exiting", self.thread.thread_id);
        let thread = Arc::clone(&self.thread);
        self.kernel.stop_thread(&thread);
        self.kernel.set_current_thread(None);
    }

    pub(super) fn op_sleep_thread(&mut self, nanoseconds: Nanoseconds) {
        debug!(
            "thread {} sleeping for {nanoseconds}ns",
            self.thread.thread_id
        );

        // A zero-length sleep yields; with nobody else to run it is a no-op.
        if nanoseconds == 0 {
            let another_ready = self.kernel.threads().iter().any(|t| {
                !Arc::ptr_eq(t, &self.thread)
                    && t.status() == ThreadStatus::Ready
                    && t.can_schedule()
            });
            if !another_ready {
                return;
            }
        }

        self.thread
            .begin_wait(ThreadStatus::WaitSleep, Vec::new(), None);
        let thread = Arc::clone(&self.thread);
        self.kernel.schedule_thread_wake(&thread, nanoseconds);
        self.kernel.reschedule_needed = true;
    }

    pub(super) fn op_get_thread_priority(&mut self, handle: Handle) -> Result<u32, ResultCode> {
        let thread = self
            .kernel
            .object_for_handle(handle)?
            .as_thread()
            .ok_or(ERR_INVALID_HANDLE)?;
        Ok(thread.current_priority())
    }

    pub(super) fn op_set_thread_priority(
        &mut self,
        handle: Handle,
        priority: u32,
    ) -> Result<(), ResultCode> {
        if priority > THREAD_PRIO_LOWEST {
            return Err(ERR_OUT_OF_RANGE);
        }
        let process = self.current_process()?;
        if self.kernel.config.enforce_restrictions
            && process.resource_limit.max_priority() > priority
            && !process.thread_restrictions_disabled()
        {
            return Err(ERR_NOT_AUTHORIZED);
        }

        let thread = self
            .kernel
            .object_for_handle(handle)?
            .as_thread()
            .ok_or(ERR_INVALID_HANDLE)?;
        thread.set_priority(priority);
        self.kernel.reschedule_needed = true;
        Ok(())
    }

    pub(super) fn op_get_thread_id(&mut self, handle: Handle) -> Result<u32, ResultCode> {
        let thread = self
            .kernel
            .object_for_handle(handle)?
            .as_thread()
            .ok_or(ERR_INVALID_HANDLE)?;
        Ok(thread.thread_id)
    }

    pub(super) fn op_open_thread(
        &mut self,
        process_handle: Handle,
        thread_id: ThreadId,
    ) -> Result<Handle, ResultCode> {
        let target_process = self
            .kernel
            .object_for_handle(process_handle)?
            .as_process()
            .ok_or(ERR_INVALID_HANDLE)?;
        let thread = target_process
            .threads()
            .into_iter()
            .find(|t| t.thread_id == thread_id)
            .ok_or(ERR_THREAD_NOT_FOUND)?;
        let process = self.current_process()?;
        process.handle_table.create(AnyObject::Thread(thread))
    }
}
