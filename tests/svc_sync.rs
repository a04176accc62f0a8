//! Synchronization calls: events, timers, semaphores, mutexes, waits, and
//! address arbitration, driven through the dispatcher.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use hle_kernel::core::result::{
    ERR_INVALID_HANDLE, ERR_OUT_OF_RANGE_KERNEL, ERR_WRONG_LOCKING_THREAD, RESULT_SUCCESS,
    RESULT_TIMEOUT,
};
use hle_kernel::objects::ThreadStatus;

#[test]
fn event_signal_then_wait_acquires() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]); // r1 = reset type OneShot
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let event = h.r(1);

    h.call(SVC_SIGNAL_EVENT, &[event]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    // Signaled: a zero-timeout wait succeeds and consumes the signal.
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[event, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    // One-shot reset: the next poll times out.
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[event, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_TIMEOUT.raw());
}

#[test]
fn wait_on_bogus_handle_fails() {
    let mut h = boot();
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[0xDEAD, 0, 0, 0]);
    assert_eq!(h.r(0), ERR_INVALID_HANDLE.raw());
}

#[test]
fn timer_fires_and_wakes_waiter() {
    let mut h = boot();

    h.call(SVC_CREATE_TIMER, &[0, 0]);
    let timer = h.r(1);
    // initial = 1000ns (r2 low, r3 high), interval = 0 (r1 low, r4 high)
    h.call(SVC_SET_TIMER, &[timer, 0, 1000, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    // Wait forever.
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[timer, 0, !0, !0]);
    assert_eq!(h.thread.status(), ThreadStatus::WaitSynchAny);

    h.advance(2000);
    assert_eq!(h.thread.status(), ThreadStatus::Ready);
    assert_eq!(h.thread.saved_context()[0], RESULT_SUCCESS.raw());
}

#[test]
fn wait_timeout_expires() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let event = h.r(1);

    h.call(SVC_WAIT_SYNCHRONIZATION1, &[event, 0, 500, 0]);
    assert_eq!(h.thread.status(), ThreadStatus::WaitSynchAny);
    // The timeout result was staged before blocking.
    assert_eq!(h.thread.saved_context()[0], RESULT_TIMEOUT.raw());

    h.advance(1000);
    assert_eq!(h.thread.status(), ThreadStatus::Ready);
    assert_eq!(h.thread.saved_context()[0], RESULT_TIMEOUT.raw());
}

#[test]
fn cancelled_timer_never_fires() {
    let mut h = boot();

    h.call(SVC_CREATE_TIMER, &[0, 0]);
    let timer = h.r(1);
    h.call(SVC_SET_TIMER, &[timer, 0, 1000, 0, 0]);
    h.call(SVC_CANCEL_TIMER, &[timer]);
    h.advance(2000);

    h.call(SVC_WAIT_SYNCHRONIZATION1, &[timer, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_TIMEOUT.raw());
}

#[test]
fn negative_timer_delay_rejected() {
    let mut h = boot();
    h.call(SVC_CREATE_TIMER, &[0, 0]);
    let timer = h.r(1);
    // initial = -1
    h.call(SVC_SET_TIMER, &[timer, 0, !0, !0, 0]);
    assert_eq!(h.r(0), ERR_OUT_OF_RANGE_KERNEL.raw());
}

#[test]
fn semaphore_counts_down_and_releases() {
    let mut h = boot();

    // initial = 1, max = 2
    h.call(SVC_CREATE_SEMAPHORE, &[0, 1, 2]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let semaphore = h.r(1);

    h.call(SVC_WAIT_SYNCHRONIZATION1, &[semaphore, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[semaphore, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_TIMEOUT.raw());

    // Release one: previous available count comes back.
    h.call(SVC_RELEASE_SEMAPHORE, &[0, semaphore, 1]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), 0);
}

#[test]
fn mutex_rejects_release_by_non_holder() {
    let mut h = boot();

    h.call(SVC_CREATE_MUTEX, &[0, 1]); // initially locked by the caller
    let mutex = h.r(1);

    h.switch_to_new_thread();
    h.call(SVC_RELEASE_MUTEX, &[mutex]);
    assert_eq!(h.r(0), ERR_WRONG_LOCKING_THREAD.raw());
}

#[test]
fn mutex_release_hands_off_to_waiter() {
    let mut h = boot();
    let owner = h.thread.clone();

    h.call(SVC_CREATE_MUTEX, &[0, 1]);
    let mutex = h.r(1);

    let waiter = h.switch_to_new_thread();
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[mutex, 0, !0, !0]);
    assert_eq!(waiter.status(), ThreadStatus::WaitSynchAny);

    {
        let mut k = h.ctx.kernel().lock();
        k.set_current_thread(Some(owner));
    }
    h.call(SVC_RELEASE_MUTEX, &[mutex]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    // The waiter acquired the mutex during the release.
    assert_eq!(waiter.status(), ThreadStatus::Ready);
    assert_eq!(waiter.saved_context()[0], RESULT_SUCCESS.raw());
}

#[test]
fn sleep_zero_with_idle_system_is_noop() {
    let mut h = boot();
    h.call(SVC_SLEEP_THREAD, &[0, 0]);
    assert_eq!(h.thread.status(), ThreadStatus::Running);
}

#[test]
fn sleep_blocks_until_time_passes() {
    let mut h = boot();
    h.call(SVC_SLEEP_THREAD, &[1000, 0]);
    assert_eq!(h.thread.status(), ThreadStatus::WaitSleep);
    h.advance(1500);
    assert_eq!(h.thread.status(), ThreadStatus::Ready);
}

#[test]
fn wait_any_reports_signaled_index() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let first = h.r(1);
    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let second = h.r(1);
    h.call(SVC_SIGNAL_EVENT, &[second]);

    let handles = h.alloc_guest(0x1000);
    h.write_u32(handles, first);
    h.write_u32(handles + 4, second);

    // wait-any, ns = 0: the ready object wins without blocking.
    h.call(SVC_WAIT_SYNCHRONIZATION_N, &[0, handles, 2, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), 1);
}

#[test]
fn wait_any_blocked_wakeup_delivers_index() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let first = h.r(1);
    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let second = h.r(1);

    let handles = h.alloc_guest(0x1000);
    h.write_u32(handles, first);
    h.write_u32(handles + 4, second);

    let waiter = h.thread.clone();
    h.call(SVC_WAIT_SYNCHRONIZATION_N, &[!0, handles, 2, 0, !0]);
    assert_eq!(waiter.status(), ThreadStatus::WaitSynchAny);
    assert_eq!(waiter.saved_context()[1], !0);

    let other = h.switch_to_new_thread();
    h.call(SVC_SIGNAL_EVENT, &[second]);
    assert_eq!(waiter.status(), ThreadStatus::Ready);
    assert_eq!(waiter.saved_context()[0], RESULT_SUCCESS.raw());
    assert_eq!(waiter.saved_context()[1], 1);
    drop(other);
}

#[test]
fn wait_all_polls_without_blocking() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let first = h.r(1);
    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let second = h.r(1);
    h.call(SVC_SIGNAL_EVENT, &[first]);

    let handles = h.alloc_guest(0x1000);
    h.write_u32(handles, first);
    h.write_u32(handles + 4, second);

    // wait-all with one unsignaled object and ns = 0 times out.
    h.call(SVC_WAIT_SYNCHRONIZATION_N, &[0, handles, 2, 1, 0]);
    assert_eq!(h.r(0), RESULT_TIMEOUT.raw());

    h.call(SVC_SIGNAL_EVENT, &[second]);
    h.call(SVC_WAIT_SYNCHRONIZATION_N, &[0, handles, 2, 1, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
}

#[test]
fn arbiter_decrement_blocks_and_signal_wakes() {
    let mut h = boot();

    h.call(SVC_CREATE_ADDRESS_ARBITER, &[0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let arbiter = h.r(1);

    let address = h.alloc_guest(0x1000);
    h.write_u32(address, 0);

    let waiter = h.thread.clone();
    // DecrementAndWaitIfLessThan: 0 < 1, so the value drops and we block.
    h.call(SVC_ARBITRATE_ADDRESS, &[arbiter, address, 2, 1, !0, !0]);
    assert_eq!(waiter.status(), ThreadStatus::WaitArb);
    assert_eq!(h.read_u32(address), 0xFFFF_FFFF);

    h.switch_to_new_thread();
    // Signal all waiters on the address.
    h.call(SVC_ARBITRATE_ADDRESS, &[arbiter, address, 0, !0, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(waiter.status(), ThreadStatus::Ready);
    assert_eq!(waiter.saved_context()[0], RESULT_SUCCESS.raw());
}

#[test]
fn arbiter_wait_with_timeout_expires() {
    let mut h = boot();

    h.call(SVC_CREATE_ADDRESS_ARBITER, &[0]);
    let arbiter = h.r(1);
    let address = h.alloc_guest(0x1000);
    h.write_u32(address, 0);

    // WaitIfLessThanWithTimeout, 500ns.
    h.call(SVC_ARBITRATE_ADDRESS, &[arbiter, address, 3, 1, 500, 0]);
    assert_eq!(h.thread.status(), ThreadStatus::WaitArb);

    h.advance(1000);
    assert_eq!(h.thread.status(), ThreadStatus::Ready);
    assert_eq!(h.thread.saved_context()[0], RESULT_TIMEOUT.raw());
    // Plain wait does not touch memory.
    assert_eq!(h.read_u32(address), 0);
}

#[test]
fn duplicate_handle_aliases_same_object() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let event = h.r(1);
    h.call(SVC_DUPLICATE_HANDLE, &[0, event]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let copy = h.r(1);
    assert_ne!(copy, event);

    h.call(SVC_SIGNAL_EVENT, &[event]);
    h.call(SVC_WAIT_SYNCHRONIZATION1, &[copy, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
}

#[test]
fn close_handle_invalidates_it() {
    let mut h = boot();

    h.call(SVC_CREATE_EVENT, &[0, 0]);
    let event = h.r(1);
    h.call(SVC_CLOSE_HANDLE, &[event]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    h.call(SVC_SIGNAL_EVENT, &[event]);
    assert_eq!(h.r(0), ERR_INVALID_HANDLE.raw());
}
