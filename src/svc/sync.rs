/*!
 * Synchronization Calls
 * Events, mutexes, semaphores, timers, waits, and address arbitration
 */

use std::sync::Arc;

use log::{debug, warn};

use crate::core::result::{
    ResultCode, ERR_INVALID_ENUM_VALUE, ERR_INVALID_ENUM_VALUE_FND, ERR_INVALID_HANDLE,
    ERR_INVALID_POINTER, ERR_OUT_OF_RANGE, ERR_OUT_OF_RANGE_KERNEL, ERR_SESSION_CLOSED_BY_REMOTE,
    RESULT_SUCCESS, RESULT_TIMEOUT,
};
use crate::core::types::{Handle, Nanoseconds, VAddr, CURRENT_PROCESS, CURRENT_THREAD};
use crate::kernel::wait;
use crate::objects::{
    AddressArbiter, AnyObject, ArbitrationType, Event, Mutex, ResetType, Semaphore, ThreadStatus,
    Timer, WaitObject, WakeupCallback,
};

use super::Svc;

impl Svc<'_> {
    // Events

    pub(super) fn op_create_event(&mut self, reset_type: u32) -> Result<Handle, ResultCode> {
        let reset_type = ResetType::from_u32(reset_type).ok_or(ERR_INVALID_ENUM_VALUE)?;
        let process = self.current_process()?;
        let event = Arc::new(Event::new(
            reset_type,
            format!("event-t{}", self.thread.thread_id),
        ));
        process.handle_table.create(AnyObject::Event(event))
    }

    pub(super) fn op_signal_event(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let event = match self.kernel.object_for_handle(handle)? {
            AnyObject::Event(event) => event,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        event.signal();
        let as_wait: Arc<dyn WaitObject> = event;
        wait::signal_all(self.kernel, &as_wait);
        Ok(())
    }

    pub(super) fn op_clear_event(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let event = match self.kernel.object_for_handle(handle)? {
            AnyObject::Event(event) => event,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        event.clear();
        Ok(())
    }

    // Timers

    pub(super) fn op_create_timer(&mut self, reset_type: u32) -> Result<Handle, ResultCode> {
        let reset_type = ResetType::from_u32(reset_type).ok_or(ERR_INVALID_ENUM_VALUE)?;
        let process = self.current_process()?;
        let timer = Arc::new(Timer::new(
            reset_type,
            format!("timer-t{}", self.thread.thread_id),
        ));
        process.handle_table.create(AnyObject::Timer(timer))
    }

    pub(super) fn op_set_timer(
        &mut self,
        handle: Handle,
        initial: Nanoseconds,
        interval: Nanoseconds,
    ) -> Result<(), ResultCode> {
        if initial < 0 || interval < 0 {
            return Err(ERR_OUT_OF_RANGE_KERNEL);
        }
        let timer = match self.kernel.object_for_handle(handle)? {
            AnyObject::Timer(timer) => timer,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        self.kernel.set_timer(&timer, initial, interval);
        Ok(())
    }

    pub(super) fn op_cancel_timer(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let timer = match self.kernel.object_for_handle(handle)? {
            AnyObject::Timer(timer) => timer,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        timer.cancel();
        Ok(())
    }

    pub(super) fn op_clear_timer(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let timer = match self.kernel.object_for_handle(handle)? {
            AnyObject::Timer(timer) => timer,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        timer.clear();
        Ok(())
    }

    // Mutexes

    pub(super) fn op_create_mutex(&mut self, initial_locked: bool) -> Result<Handle, ResultCode> {
        let process = self.current_process()?;
        let mutex = Arc::new(Mutex::new(format!("mutex-t{}", self.thread.thread_id)));
        if initial_locked {
            WaitObject::acquire(Arc::clone(&mutex), &self.thread);
        }
        process.handle_table.create(AnyObject::Mutex(mutex))
    }

    pub(super) fn op_release_mutex(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let mutex = match self.kernel.object_for_handle(handle)? {
            AnyObject::Mutex(mutex) => mutex,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        let code = mutex.release(&self.thread);
        if code.is_error() {
            return Err(code);
        }
        let as_wait: Arc<dyn WaitObject> = mutex;
        wait::signal_all(self.kernel, &as_wait);
        Ok(())
    }

    // Semaphores

    pub(super) fn op_create_semaphore(
        &mut self,
        initial_count: i32,
        max_count: i32,
    ) -> Result<Handle, ResultCode> {
        let process = self.current_process()?;
        let semaphore = Arc::new(Semaphore::new(
            initial_count,
            max_count,
            format!("semaphore-t{}", self.thread.thread_id),
        )?);
        process.handle_table.create(AnyObject::Semaphore(semaphore))
    }

    pub(super) fn op_release_semaphore(
        &mut self,
        handle: Handle,
        release_count: i32,
    ) -> Result<i32, ResultCode> {
        let semaphore = match self.kernel.object_for_handle(handle)? {
            AnyObject::Semaphore(semaphore) => semaphore,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        let previous = semaphore.release(release_count)?;
        let as_wait: Arc<dyn WaitObject> = semaphore;
        wait::signal_all(self.kernel, &as_wait);
        Ok(previous)
    }

    // Handles

    pub(super) fn op_close_handle(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let process = self.current_process()?;
        let object = process.handle_table.close(handle)?;
        match object {
            AnyObject::ClientSession(session) => {
                // Dropping the table's reference leaves ours; anything beyond
                // that is another handle keeping the client end alive.
                if Arc::strong_count(&session) == 1 {
                    session.link.mark_client_closed();
                    if let Some(server) = session.server_session() {
                        let as_wait: Arc<dyn WaitObject> = server;
                        wait::notify_client_closed(self.kernel, &as_wait);
                    }
                    if let Some(port) = session.port() {
                        port.connection_closed();
                    }
                }
            }
            AnyObject::ServerSession(session) => {
                if Arc::strong_count(&session) == 1 {
                    session.link.mark_server_closed();
                    // Requesters still queued never get a reply.
                    for requester in session.drain_requesters() {
                        requester.set_context_reg(0, ERR_SESSION_CLOSED_BY_REMOTE.raw());
                        requester.resume_from_wait();
                    }
                    self.kernel.reschedule_needed = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(super) fn op_duplicate_handle(&mut self, handle: Handle) -> Result<Handle, ResultCode> {
        let process = self.current_process()?;
        match handle {
            CURRENT_THREAD | CURRENT_PROCESS => {
                let object = self.kernel.object_for_handle(handle)?;
                process.handle_table.create(object)
            }
            _ => process.handle_table.duplicate(handle),
        }
    }

    // Waits

    pub(super) fn op_wait_synchronization1(
        &mut self,
        handle: Handle,
        nanoseconds: Nanoseconds,
    ) -> ResultCode {
        let object = match self.kernel.object_for_handle(handle) {
            Ok(object) => object,
            Err(code) => return code,
        };
        let Some(wait_object) = object.as_wait_object() else {
            return ERR_INVALID_HANDLE;
        };

        if !wait_object.should_wait(&self.thread) {
            wait_object.acquire(&self.thread);
            return RESULT_SUCCESS;
        }
        if nanoseconds == 0 {
            return RESULT_TIMEOUT;
        }

        self.thread.begin_wait(
            ThreadStatus::WaitSynchAny,
            vec![wait_object.clone()],
            Some(WakeupCallback::Sync { do_output: false }),
        );
        wait_object.add_waiting_thread(Arc::clone(&self.thread));
        let thread = Arc::clone(&self.thread);
        self.kernel.schedule_thread_wake(&thread, nanoseconds);
        self.kernel.reschedule_needed = true;

        // Default return for the timeout path; a signal overwrites it.
        RESULT_TIMEOUT
    }

    pub(super) fn op_wait_synchronization_n(
        &mut self,
        handles_address: VAddr,
        handle_count: i32,
        wait_all: bool,
        nanoseconds: Nanoseconds,
    ) -> (ResultCode, i32) {
        let Ok(process) = self.current_process() else {
            return (ERR_INVALID_HANDLE, 0);
        };
        let memory = self.kernel.memory.clone();
        if !memory.is_valid_virtual_address(&process, handles_address) {
            return (ERR_INVALID_POINTER, 0);
        }
        if handle_count < 0 {
            return (ERR_OUT_OF_RANGE, 0);
        }

        let mut objects: Vec<Arc<dyn WaitObject>> = Vec::with_capacity(handle_count as usize);
        for i in 0..handle_count as u32 {
            let handle = match memory.read_u32(&process, handles_address + i * 4) {
                Ok(handle) => handle,
                Err(_) => return (ERR_INVALID_POINTER, 0),
            };
            let object = match self.kernel.object_for_handle(handle) {
                Ok(object) => object,
                Err(code) => return (code, 0),
            };
            let Some(wait_object) = object.as_wait_object() else {
                return (ERR_INVALID_HANDLE, 0);
            };
            objects.push(wait_object);
        }

        if wait_all {
            let all_ready = objects.iter().all(|o| !o.should_wait(&self.thread));
            if all_ready {
                for object in &objects {
                    object.clone().acquire(&self.thread);
                }
                return (RESULT_SUCCESS, 0);
            }
            if nanoseconds == 0 {
                return (RESULT_TIMEOUT, 0);
            }
            self.block_on(
                ThreadStatus::WaitSynchAll,
                objects,
                WakeupCallback::Sync { do_output: false },
                nanoseconds,
            );
            return (RESULT_TIMEOUT, -1);
        }

        if let Some(index) = objects.iter().position(|o| !o.should_wait(&self.thread)) {
            objects[index].clone().acquire(&self.thread);
            return (RESULT_SUCCESS, index as i32);
        }
        if nanoseconds == 0 {
            return (RESULT_TIMEOUT, 0);
        }
        self.block_on(
            ThreadStatus::WaitSynchAny,
            objects,
            WakeupCallback::Sync { do_output: true },
            nanoseconds,
        );
        (RESULT_TIMEOUT, -1)
    }

    fn block_on(
        &mut self,
        status: ThreadStatus,
        objects: Vec<Arc<dyn WaitObject>>,
        callback: WakeupCallback,
        nanoseconds: Nanoseconds,
    ) {
        self.thread
            .begin_wait(status, objects.clone(), Some(callback));
        for object in objects {
            object.add_waiting_thread(Arc::clone(&self.thread));
        }
        let thread = Arc::clone(&self.thread);
        self.kernel.schedule_thread_wake(&thread, nanoseconds);
        self.kernel.reschedule_needed = true;
    }

    // Address arbitration

    pub(super) fn op_create_address_arbiter(&mut self) -> Result<Handle, ResultCode> {
        let process = self.current_process()?;
        let arbiter = Arc::new(AddressArbiter::new(format!(
            "arbiter-p{}",
            process.process_id
        )));
        process
            .handle_table
            .create(AnyObject::AddressArbiter(arbiter))
    }

    pub(super) fn op_arbitrate_address(
        &mut self,
        handle: Handle,
        address: VAddr,
        arbitration_type: u32,
        value: i32,
        nanoseconds: Nanoseconds,
    ) -> ResultCode {
        let arbiter = match self.kernel.object_for_handle(handle) {
            Ok(AnyObject::AddressArbiter(arbiter)) => arbiter,
            Ok(_) => return ERR_INVALID_HANDLE,
            Err(code) => return code,
        };
        let Some(arbitration_type) = ArbitrationType::from_u32(arbitration_type) else {
            warn!("ArbitrateAddress with unknown type {arbitration_type}");
            return ERR_INVALID_ENUM_VALUE_FND;
        };
        let Ok(process) = self.current_process() else {
            return ERR_INVALID_HANDLE;
        };
        debug!(
            "ArbitrateAddress {arbitration_type:?} address={address:#010x} value={value} \
             timeout={nanoseconds}"
        );

        if arbitration_type == ArbitrationType::Signal {
            for thread in arbiter.take_resumable(address, value) {
                thread.set_context_reg(0, RESULT_SUCCESS.raw());
                thread.resume_from_wait();
            }
            self.kernel.reschedule_needed = true;
            return RESULT_SUCCESS;
        }

        let memory_value = match self.kernel.memory.read_u32(&process, address) {
            Ok(value) => value as i32,
            Err(_) => return ERR_INVALID_POINTER,
        };
        if memory_value >= value {
            return RESULT_SUCCESS;
        }
        if arbitration_type.decrements() {
            if self
                .kernel
                .memory
                .write_u32(&process, address, (memory_value - 1) as u32)
                .is_err()
            {
                return ERR_INVALID_POINTER;
            }
        }

        self.thread.begin_wait(
            ThreadStatus::WaitArb,
            Vec::new(),
            Some(WakeupCallback::Arbiter),
        );
        self.thread.set_wait_address(address);
        arbiter.add_waiter(Arc::clone(&self.thread));
        if arbitration_type.has_timeout() {
            let thread = Arc::clone(&self.thread);
            self.kernel.schedule_thread_wake(&thread, nanoseconds);
        }
        self.kernel.reschedule_needed = true;

        // Timeout default; a signal on the address overwrites it.
        RESULT_TIMEOUT
    }
}
