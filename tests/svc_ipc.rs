//! IPC calls: ports, sessions, synchronous requests, and the server
//! receive/reply loop.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use hle_kernel::core::result::{
    ERR_NO_PENDING_SESSIONS, ERR_NOT_FOUND, ERR_PORT_NAME_TOO_LONG, ERR_SESSION_CLOSED_BY_REMOTE,
    RESULT_REPLY_PLACEHOLDER, RESULT_SUCCESS,
};
use hle_kernel::objects::{AnyObject, ThreadStatus};
use hle_kernel::Thread;

/// Header for command id 1 with one normal parameter.
const REQUEST_HEADER: u32 = (1 << 16) | (1 << 6);

fn command_buffer(thread: &Thread) -> u32 {
    thread.tls_address + 0x80
}

#[test]
fn connect_to_unknown_port_fails() {
    let mut h = boot();
    let name = h.alloc_guest(0x1000);
    h.write_bytes(name, b"srv:none\0");

    h.call(SVC_CONNECT_TO_PORT, &[0, name]);
    assert_eq!(h.r(0), ERR_NOT_FOUND.raw());
}

#[test]
fn overlong_port_name_rejected() {
    let mut h = boot();
    let name = h.alloc_guest(0x1000);
    h.write_bytes(name, b"srv:waytoolongname\0");

    h.call(SVC_CONNECT_TO_PORT, &[0, name]);
    assert_eq!(h.r(0), ERR_PORT_NAME_TOO_LONG.raw());
}

#[test]
fn connect_to_registered_port() {
    let mut h = boot();

    h.call(SVC_CREATE_PORT, &[0, 0, 0, 8]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let server_port = h.r(1);
    let client_port = h.r(2);

    // Register the client end under a service name.
    {
        let k = h.ctx.kernel().lock();
        let port = match h.process.handle_table.get(client_port) {
            Some(AnyObject::ClientPort(port)) => port,
            _ => panic!("client port handle"),
        };
        k.named_ports.insert("srv:test".to_string(), port);
    }

    let name = h.alloc_guest(0x1000);
    h.write_bytes(name, b"srv:test\0");
    h.call(SVC_CONNECT_TO_PORT, &[0, name]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_ne!(h.r(1), 0);

    // The connection is waiting on the server port.
    h.call(SVC_ACCEPT_SESSION, &[0, server_port]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
}

#[test]
fn accept_without_pending_sessions_fails() {
    let mut h = boot();
    h.call(SVC_CREATE_PORT, &[0, 0, 0, 8]);
    let server_port = h.r(1);

    h.call(SVC_ACCEPT_SESSION, &[0, server_port]);
    assert_eq!(h.r(0), ERR_NO_PENDING_SESSIONS.raw());
}

/// Builds a connected session: returns (client session, server session)
/// handles in the test process.
fn connected_session(h: &mut common::Harness) -> (u32, u32) {
    h.call(SVC_CREATE_PORT, &[0, 0, 0, 8]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let server_port = h.r(1);
    let client_port = h.r(2);

    h.call(SVC_CREATE_SESSION_TO_PORT, &[0, client_port]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    let client_session = h.r(1);

    h.call(SVC_ACCEPT_SESSION, &[0, server_port]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    (client_session, h.r(1))
}

#[test]
fn request_receive_reply_round_trip() {
    let mut h = boot();
    let (client_session, server_session) = connected_session(&mut h);
    let client = h.thread.clone();

    // Client stages a command and sends it.
    let client_buffer = command_buffer(&client);
    h.write_u32(client_buffer, REQUEST_HEADER);
    h.write_u32(client_buffer + 4, 0xAABB_CCDD);
    h.call(SVC_SEND_SYNC_REQUEST, &[client_session]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(client.status(), ThreadStatus::WaitIpc);

    // Server picks the request up without blocking.
    let server = h.switch_to_new_thread();
    let handles = h.alloc_guest(0x1000);
    h.write_u32(handles, server_session);
    h.call(SVC_REPLY_AND_RECEIVE, &[0, handles, 1, 0]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());
    assert_eq!(h.r(1), 0);

    let server_buffer = command_buffer(&server);
    assert_eq!(h.read_u32(server_buffer), REQUEST_HEADER);
    assert_eq!(h.read_u32(server_buffer + 4), 0xAABB_CCDD);

    // Server writes its reply and sends it back.
    h.write_u32(server_buffer, REQUEST_HEADER);
    h.write_u32(server_buffer + 4, 0x1122_3344);
    h.call(SVC_REPLY_AND_RECEIVE, &[0, 0, 0, server_session]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    assert_eq!(client.status(), ThreadStatus::Ready);
    assert_eq!(client.saved_context()[0], RESULT_SUCCESS.raw());
    assert_eq!(h.read_u32(client_buffer + 4), 0x1122_3344);
}

#[test]
fn blocked_receive_wakes_on_request() {
    let mut h = boot();
    let (client_session, server_session) = connected_session(&mut h);
    let client = h.thread.clone();

    // Server blocks first.
    let server = h.switch_to_new_thread();
    let handles = h.alloc_guest(0x1000);
    h.write_u32(handles, server_session);
    h.call(SVC_REPLY_AND_RECEIVE, &[0, handles, 1, 0]);
    assert_eq!(server.status(), ThreadStatus::WaitSynchAny);

    // Client sends; the wake both delivers the command and reports the
    // signaled index.
    {
        let mut k = h.ctx.kernel().lock();
        k.set_current_thread(Some(client.clone()));
    }
    let client_buffer = command_buffer(&client);
    h.write_u32(client_buffer, REQUEST_HEADER);
    h.call(SVC_SEND_SYNC_REQUEST, &[client_session]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    assert_eq!(server.status(), ThreadStatus::Ready);
    assert_eq!(server.saved_context()[0], RESULT_SUCCESS.raw());
    assert_eq!(server.saved_context()[1], 0);
    let server_buffer = command_buffer(&server);
    assert_eq!(h.read_u32(server_buffer), REQUEST_HEADER);
}

#[test]
fn reply_with_nothing_pending_is_flagged() {
    let mut h = boot();
    h.call(SVC_REPLY_AND_RECEIVE, &[0, 0, 0, 0]);
    assert_eq!(h.r(0), RESULT_REPLY_PLACEHOLDER.raw());
    assert_eq!(h.r(1), 0);
}

#[test]
fn client_close_wakes_blocked_server() {
    let mut h = boot();
    let (client_session, server_session) = connected_session(&mut h);
    let client = h.thread.clone();

    let server = h.switch_to_new_thread();
    let handles = h.alloc_guest(0x1000);
    h.write_u32(handles, server_session);
    h.call(SVC_REPLY_AND_RECEIVE, &[0, handles, 1, 0]);
    assert_eq!(server.status(), ThreadStatus::WaitSynchAny);

    {
        let mut k = h.ctx.kernel().lock();
        k.set_current_thread(Some(client.clone()));
    }
    h.call(SVC_CLOSE_HANDLE, &[client_session]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    assert_eq!(server.status(), ThreadStatus::Ready);
    assert_eq!(
        server.saved_context()[0],
        ERR_SESSION_CLOSED_BY_REMOTE.raw()
    );
}

#[test]
fn send_on_dead_server_fails() {
    let mut h = boot();
    let (client_session, server_session) = connected_session(&mut h);

    h.call(SVC_CLOSE_HANDLE, &[server_session]);
    assert_eq!(h.r(0), RESULT_SUCCESS.raw());

    h.call(SVC_SEND_SYNC_REQUEST, &[client_session]);
    assert_eq!(h.r(0), ERR_SESSION_CLOSED_BY_REMOTE.raw());
}
