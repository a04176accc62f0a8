/*!
 * Wake Engine
 * Delivers object signals and timeouts to blocked threads
 */

use std::sync::Arc;

use log::error;

use crate::core::result::RESULT_SUCCESS;
use crate::ipc;
use crate::objects::{Thread, ThreadStatus, WaitObject, WakeupCallback};

use super::Kernel;

/// Wakes every waiter of `object` that can make progress, best priority
/// first. Wait-any threads need only this object ready; wait-all threads
/// need every object in their list ready.
pub fn signal_all(kernel: &mut Kernel, object: &Arc<dyn WaitObject>) {
    loop {
        let candidate = object
            .waiting_threads()
            .into_iter()
            .filter(|thread| can_wake(thread, object))
            .min_by_key(|thread| thread.current_priority());
        match candidate {
            Some(thread) => wake_on_signal(kernel, &thread, object),
            None => break,
        }
    }
}

fn can_wake(thread: &Arc<Thread>, object: &Arc<dyn WaitObject>) -> bool {
    match thread.status() {
        ThreadStatus::WaitSynchAll => thread
            .wait_objects()
            .iter()
            .all(|o| !o.should_wait(thread)),
        ThreadStatus::WaitSynchAny => !object.should_wait(thread),
        _ => false,
    }
}

fn wake_on_signal(kernel: &mut Kernel, thread: &Arc<Thread>, object: &Arc<dyn WaitObject>) {
    let wait_all = thread.status() == ThreadStatus::WaitSynchAll;
    let index = thread.wait_object_index(object).unwrap_or(0);
    let wait_objects = thread.wait_objects();

    if wait_all {
        for o in &wait_objects {
            o.clone().acquire(thread);
        }
    } else {
        object.clone().acquire(thread);
    }
    for o in &wait_objects {
        o.clone().remove_waiting_thread(thread);
    }

    match thread.wakeup_callback() {
        Some(WakeupCallback::Sync { do_output }) => {
            thread.set_context_reg(0, RESULT_SUCCESS.raw());
            // The wait-all form leaves the output index untouched.
            if do_output && !wait_all {
                thread.set_context_reg(1, index as u32);
            }
        }
        Some(WakeupCallback::ReplyReceive) => {
            let result = match object.clone().as_server_session() {
                Some(server_session) => {
                    ipc::receive_ipc_request(kernel, &server_session, thread)
                }
                None => RESULT_SUCCESS,
            };
            thread.set_context_reg(0, result.raw());
            thread.set_context_reg(1, index as u32);
        }
        Some(WakeupCallback::Arbiter) => {
            thread.set_context_reg(0, RESULT_SUCCESS.raw());
        }
        None => {}
    }

    thread.resume_from_wait();
    kernel.reschedule_needed = true;
}

/// Expires a blocked thread's wait. The registers already hold the timeout
/// defaults written when the wait began, so this only detaches and resumes.
pub fn timeout_thread(kernel: &mut Kernel, thread: &Arc<Thread>) {
    let status = thread.status();
    if !status.is_waiting() {
        return;
    }
    if status == ThreadStatus::WaitIpc {
        // A synchronous request has no timeout; a stale entry for a thread
        // that moved into an IPC wait must not tear the request down.
        error!(
            "discarding timeout for thread {} blocked in IPC",
            thread.thread_id
        );
        return;
    }
    for object in thread.wait_objects() {
        object.remove_waiting_thread(thread);
    }
    thread.resume_from_wait();
    kernel.reschedule_needed = true;
}

/// Lets a session's server end observe a vanished client: wakes its waiters
/// with the close error after the link is marked dead.
pub fn notify_client_closed(kernel: &mut Kernel, server_session: &Arc<dyn WaitObject>) {
    // With client_alive cleared, should_wait is false for every waiter, so
    // the ordinary signal path delivers the wakeups. ReplyReceive waiters
    // pick up the close error during request receive.
    signal_all(kernel, server_session);
}
