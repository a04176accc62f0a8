/*!
 * Ports and Sessions
 * Connection endpoints for synchronous IPC
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex as SyncMutex;

use crate::core::result::{ResultCode, ERR_MAX_CONNECTIONS_REACHED};

use super::object::{WaitList, WaitObject};
use super::thread::Thread;

/// Shared liveness state of one client/server session pair.
pub struct SessionLink {
    pub name: String,
    client_alive: AtomicBool,
    server_alive: AtomicBool,
}

impl SessionLink {
    pub fn new(name: String) -> Self {
        Self {
            name,
            client_alive: AtomicBool::new(true),
            server_alive: AtomicBool::new(true),
        }
    }

    #[inline]
    #[must_use]
    pub fn client_alive(&self) -> bool {
        self.client_alive.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn server_alive(&self) -> bool {
        self.server_alive.load(Ordering::Acquire)
    }

    pub fn mark_client_closed(&self) {
        self.client_alive.store(false, Ordering::Release);
    }

    pub fn mark_server_closed(&self) {
        self.server_alive.store(false, Ordering::Release);
    }
}

/// Client end of a named or anonymous port.
pub struct ClientPort {
    pub name: String,
    pub max_sessions: u32,
    active_sessions: AtomicU32,
    server: SyncMutex<Weak<ServerPort>>,
}

impl ClientPort {
    pub fn new(name: String, max_sessions: u32) -> Self {
        Self {
            name,
            max_sessions,
            active_sessions: AtomicU32::new(0),
            server: SyncMutex::new(Weak::new()),
        }
    }

    pub fn attach_server(&self, server: &Arc<ServerPort>) {
        *self.server.lock() = Arc::downgrade(server);
    }

    #[must_use]
    pub fn server_port(&self) -> Option<Arc<ServerPort>> {
        self.server.lock().upgrade()
    }

    /// Opens a session through this port. The new server end is queued on
    /// the server port, which the caller signals.
    pub fn connect(&self) -> Result<(Arc<ClientSession>, Arc<ServerPort>), ResultCode> {
        let server_port = self
            .server_port()
            .ok_or(ERR_MAX_CONNECTIONS_REACHED)?;
        let active = self.active_sessions.load(Ordering::Acquire);
        if active >= self.max_sessions {
            return Err(ERR_MAX_CONNECTIONS_REACHED);
        }
        self.active_sessions.store(active + 1, Ordering::Release);

        let (client, server) = new_session_pair(self.name.clone());
        server_port.queue_session(server);
        Ok((client, server_port))
    }

    pub fn connection_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Server end of a port; signaled while connection requests are pending.
pub struct ServerPort {
    pub name: String,
    pending_sessions: SyncMutex<Vec<Arc<ServerSession>>>,
    wait_list: WaitList,
}

impl ServerPort {
    pub fn new(name: String) -> Self {
        Self {
            name,
            pending_sessions: SyncMutex::new(Vec::new()),
            wait_list: WaitList::new(),
        }
    }

    pub fn queue_session(&self, session: Arc<ServerSession>) {
        self.pending_sessions.lock().push(session);
    }

    /// Pops the oldest pending connection, if any.
    pub fn accept(&self) -> Option<Arc<ServerSession>> {
        let mut pending = self.pending_sessions.lock();
        if pending.is_empty() {
            None
        } else {
            Some(pending.remove(0))
        }
    }

    #[must_use]
    pub fn has_pending_sessions(&self) -> bool {
        !self.pending_sessions.lock().is_empty()
    }
}

impl WaitObject for ServerPort {
    fn should_wait(&self, _thread: &Arc<Thread>) -> bool {
        !self.has_pending_sessions()
    }

    fn acquire(self: Arc<Self>, _thread: &Arc<Thread>) {}

    fn add_waiting_thread(self: Arc<Self>, thread: Arc<Thread>) {
        self.wait_list.add(thread);
    }

    fn remove_waiting_thread(self: Arc<Self>, thread: &Arc<Thread>) {
        self.wait_list.remove(thread);
    }

    fn waiting_threads(&self) -> Vec<Arc<Thread>> {
        self.wait_list.snapshot()
    }
}

/// Server end of a session; signaled while requests are pending or the
/// client has gone away.
pub struct ServerSession {
    pub link: Arc<SessionLink>,
    /// Requesting threads not yet picked up, newest served first.
    pending_requesting_threads: SyncMutex<VecDeque<Arc<Thread>>>,
    /// The request currently being handled, between receive and reply.
    currently_handling: SyncMutex<Option<Arc<Thread>>>,
    wait_list: WaitList,
}

impl ServerSession {
    pub fn new(link: Arc<SessionLink>) -> Self {
        Self {
            link,
            pending_requesting_threads: SyncMutex::new(VecDeque::new()),
            currently_handling: SyncMutex::new(None),
            wait_list: WaitList::new(),
        }
    }

    pub fn push_request(&self, thread: Arc<Thread>) {
        self.pending_requesting_threads.lock().push_back(thread);
    }

    #[must_use]
    pub fn currently_handling(&self) -> Option<Arc<Thread>> {
        self.currently_handling.lock().clone()
    }

    /// Ends the in-flight request, returning the thread awaiting the reply.
    pub fn take_currently_handling(&self) -> Option<Arc<Thread>> {
        self.currently_handling.lock().take()
    }

    /// Empties the request queue, including any request in flight. Used when
    /// the server end goes away and every requester must be bounced.
    pub fn drain_requesters(&self) -> Vec<Arc<Thread>> {
        let mut threads: Vec<Arc<Thread>> =
            self.pending_requesting_threads.lock().drain(..).collect();
        if let Some(current) = self.currently_handling.lock().take() {
            threads.push(current);
        }
        threads
    }
}

impl WaitObject for ServerSession {
    fn should_wait(&self, _thread: &Arc<Thread>) -> bool {
        // A dead client end makes the session permanently signaled so the
        // server observes the close.
        self.link.client_alive() && self.pending_requesting_threads.lock().is_empty()
    }

    fn acquire(self: Arc<Self>, _thread: &Arc<Thread>) {
        let taken = self.pending_requesting_threads.lock().pop_back();
        if let Some(thread) = taken {
            *self.currently_handling.lock() = Some(thread);
        }
    }

    fn add_waiting_thread(self: Arc<Self>, thread: Arc<Thread>) {
        self.wait_list.add(thread);
    }

    fn remove_waiting_thread(self: Arc<Self>, thread: &Arc<Thread>) {
        self.wait_list.remove(thread);
    }

    fn waiting_threads(&self) -> Vec<Arc<Thread>> {
        self.wait_list.snapshot()
    }

    fn as_server_session(self: Arc<Self>) -> Option<Arc<ServerSession>> {
        Some(self)
    }
}

/// Client end of a session.
pub struct ClientSession {
    pub link: Arc<SessionLink>,
    server: SyncMutex<Weak<ServerSession>>,
    /// Port to notify when this end closes, None for portless sessions.
    port: SyncMutex<Weak<ClientPort>>,
}

impl ClientSession {
    #[must_use]
    pub fn server_session(&self) -> Option<Arc<ServerSession>> {
        self.server.lock().upgrade()
    }

    pub fn attach_port(&self, port: &Arc<ClientPort>) {
        *self.port.lock() = Arc::downgrade(port);
    }

    #[must_use]
    pub fn port(&self) -> Option<Arc<ClientPort>> {
        self.port.lock().upgrade()
    }
}

/// Builds a connected client/server session pair.
pub fn new_session_pair(name: String) -> (Arc<ClientSession>, Arc<ServerSession>) {
    let link = Arc::new(SessionLink::new(name));
    let server = Arc::new(ServerSession::new(link.clone()));
    let client = Arc::new(ClientSession {
        link,
        server: SyncMutex::new(Arc::downgrade(&server)),
        port: SyncMutex::new(Weak::new()),
    });
    (client, server)
}
