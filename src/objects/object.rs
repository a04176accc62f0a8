/*!
 * Object Model
 * The waitable-object trait and the tagged union behind handles
 */

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};

use super::address_arbiter::AddressArbiter;
use super::event::Event;
use super::mutex::Mutex;
use super::process::Process;
use super::resource_limit::ResourceLimit;
use super::semaphore::Semaphore;
use super::session::{ClientPort, ClientSession, ServerPort, ServerSession};
use super::shared_memory::SharedMemory;
use super::thread::Thread;
use super::timer::Timer;

/// Object kind, as reported by handle introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleType {
    Event,
    Mutex,
    Semaphore,
    Timer,
    SharedMemory,
    Thread,
    Process,
    AddressArbiter,
    ServerPort,
    ClientPort,
    ServerSession,
    ClientSession,
    ResourceLimit,
}

/// An object that threads can block on.
///
/// `should_wait` asks whether `thread` would block right now; `acquire`
/// consumes the signaled state for `thread`. Both are called with the kernel
/// lock held, so implementations never see concurrent callers.
pub trait WaitObject: Send + Sync {
    fn should_wait(&self, thread: &Arc<Thread>) -> bool;

    fn acquire(self: Arc<Self>, thread: &Arc<Thread>);

    fn add_waiting_thread(self: Arc<Self>, thread: Arc<Thread>);

    fn remove_waiting_thread(self: Arc<Self>, thread: &Arc<Thread>);

    fn waiting_threads(&self) -> Vec<Arc<Thread>>;

    /// Downcast hook for the wake engine, which treats server sessions
    /// specially when delivering ReplyAndReceive wakeups.
    fn as_server_session(self: Arc<Self>) -> Option<Arc<ServerSession>> {
        None
    }
}

/// Identity comparison for type-erased wait objects.
///
/// Compares data pointers rather than fat pointers, since two `Arc<dyn>`s to
/// the same object may carry different vtable pointers across codegen units.
#[inline]
#[must_use]
pub fn same_wait_object(a: &Arc<dyn WaitObject>, b: &Arc<dyn WaitObject>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Threads blocked on one object, in arrival order.
#[derive(Default)]
pub struct WaitList {
    threads: SyncMutex<Vec<Arc<Thread>>>,
}

impl WaitList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, thread: Arc<Thread>) {
        let mut threads = self.threads.lock();
        if !threads.iter().any(|t| Arc::ptr_eq(t, &thread)) {
            threads.push(thread);
        }
    }

    pub fn remove(&self, thread: &Arc<Thread>) {
        self.threads.lock().retain(|t| !Arc::ptr_eq(t, thread));
    }

    pub fn snapshot(&self) -> Vec<Arc<Thread>> {
        self.threads.lock().clone()
    }
}

/// Every object a handle can refer to.
#[derive(Clone)]
pub enum AnyObject {
    Event(Arc<Event>),
    Mutex(Arc<Mutex>),
    Semaphore(Arc<Semaphore>),
    Timer(Arc<Timer>),
    SharedMemory(Arc<SharedMemory>),
    Thread(Arc<Thread>),
    Process(Arc<Process>),
    AddressArbiter(Arc<AddressArbiter>),
    ServerPort(Arc<ServerPort>),
    ClientPort(Arc<ClientPort>),
    ServerSession(Arc<ServerSession>),
    ClientSession(Arc<ClientSession>),
    ResourceLimit(Arc<ResourceLimit>),
}

impl AnyObject {
    #[must_use]
    pub fn handle_type(&self) -> HandleType {
        match self {
            AnyObject::Event(_) => HandleType::Event,
            AnyObject::Mutex(_) => HandleType::Mutex,
            AnyObject::Semaphore(_) => HandleType::Semaphore,
            AnyObject::Timer(_) => HandleType::Timer,
            AnyObject::SharedMemory(_) => HandleType::SharedMemory,
            AnyObject::Thread(_) => HandleType::Thread,
            AnyObject::Process(_) => HandleType::Process,
            AnyObject::AddressArbiter(_) => HandleType::AddressArbiter,
            AnyObject::ServerPort(_) => HandleType::ServerPort,
            AnyObject::ClientPort(_) => HandleType::ClientPort,
            AnyObject::ServerSession(_) => HandleType::ServerSession,
            AnyObject::ClientSession(_) => HandleType::ClientSession,
            AnyObject::ResourceLimit(_) => HandleType::ResourceLimit,
        }
    }

    /// Upcasts to the waitable interface, None for objects a thread cannot
    /// block on.
    #[must_use]
    pub fn as_wait_object(&self) -> Option<Arc<dyn WaitObject>> {
        match self {
            AnyObject::Event(o) => Some(o.clone()),
            AnyObject::Mutex(o) => Some(o.clone()),
            AnyObject::Semaphore(o) => Some(o.clone()),
            AnyObject::Timer(o) => Some(o.clone()),
            AnyObject::Thread(o) => Some(o.clone()),
            AnyObject::Process(o) => Some(o.clone()),
            AnyObject::ServerPort(o) => Some(o.clone()),
            AnyObject::ServerSession(o) => Some(o.clone()),
            _ => None,
        }
    }

    /// Number of live references besides the handle table's own, which is
    /// what handle introspection reports as the reference count.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        match self {
            AnyObject::Event(o) => Arc::strong_count(o),
            AnyObject::Mutex(o) => Arc::strong_count(o),
            AnyObject::Semaphore(o) => Arc::strong_count(o),
            AnyObject::Timer(o) => Arc::strong_count(o),
            AnyObject::SharedMemory(o) => Arc::strong_count(o),
            AnyObject::Thread(o) => Arc::strong_count(o),
            AnyObject::Process(o) => Arc::strong_count(o),
            AnyObject::AddressArbiter(o) => Arc::strong_count(o),
            AnyObject::ServerPort(o) => Arc::strong_count(o),
            AnyObject::ClientPort(o) => Arc::strong_count(o),
            AnyObject::ServerSession(o) => Arc::strong_count(o),
            AnyObject::ClientSession(o) => Arc::strong_count(o),
            AnyObject::ResourceLimit(o) => Arc::strong_count(o),
        }
    }

    #[must_use]
    pub fn as_thread(&self) -> Option<Arc<Thread>> {
        match self {
            AnyObject::Thread(o) => Some(o.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_process(&self) -> Option<Arc<Process>> {
        match self {
            AnyObject::Process(o) => Some(o.clone()),
            _ => None,
        }
    }
}
