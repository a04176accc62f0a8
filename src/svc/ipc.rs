/*!
 * IPC Calls
 * Ports, sessions, synchronous requests, and the server receive loop
 */

use std::sync::Arc;

use log::{debug, error};

use crate::core::result::{
    ResultCode, ERR_INVALID_HANDLE, ERR_INVALID_POINTER, ERR_NOT_FOUND, ERR_NOT_IMPLEMENTED,
    ERR_NO_PENDING_SESSIONS, ERR_OUT_OF_RANGE, ERR_PORT_NAME_TOO_LONG,
    ERR_SESSION_CLOSED_BY_REMOTE, RESULT_REPLY_PLACEHOLDER, RESULT_SUCCESS,
};
use crate::core::types::{Handle, VAddr};
use crate::ipc::{self, CommandHeader};
use crate::kernel::wait;
use crate::objects::{
    new_session_pair, AnyObject, ClientPort, ServerPort, ThreadStatus, WaitObject, WakeupCallback,
};

use super::Svc;

/// Longest port name including the terminator.
const PORT_NAME_MAX: u32 = 12;

impl Svc<'_> {
    pub(super) fn op_connect_to_port(
        &mut self,
        port_name_address: VAddr,
    ) -> Result<Handle, ResultCode> {
        let process = self.current_process()?;
        let memory = self.kernel.memory.clone();
        if !memory.is_valid_virtual_address(&process, port_name_address) {
            return Err(ERR_NOT_FOUND);
        }
        let name = memory
            .read_cstring(&process, port_name_address, PORT_NAME_MAX)
            .map_err(|_| ERR_NOT_FOUND)?;
        if name.len() >= PORT_NAME_MAX as usize {
            return Err(ERR_PORT_NAME_TOO_LONG);
        }
        debug!("ConnectToPort {name:?}");

        let port = self
            .kernel
            .named_ports
            .get(&name)
            .map(|entry| entry.value().clone())
            .ok_or(ERR_NOT_FOUND)?;
        let (client_session, server_port) = port.connect()?;
        client_session.attach_port(&port);

        let as_wait: Arc<dyn WaitObject> = server_port;
        wait::signal_all(self.kernel, &as_wait);
        process
            .handle_table
            .create(AnyObject::ClientSession(client_session))
    }

    pub(super) fn op_send_sync_request(&mut self, handle: Handle) -> Result<(), ResultCode> {
        let session = match self.kernel.object_for_handle(handle)? {
            AnyObject::ClientSession(session) => session,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        if !session.link.server_alive() {
            return Err(ERR_SESSION_CLOSED_BY_REMOTE);
        }
        let server = session
            .server_session()
            .ok_or(ERR_SESSION_CLOSED_BY_REMOTE)?;

        server.push_request(Arc::clone(&self.thread));
        self.thread
            .begin_wait(ThreadStatus::WaitIpc, Vec::new(), None);

        let as_wait: Arc<dyn WaitObject> = server;
        wait::signal_all(self.kernel, &as_wait);
        self.kernel.reschedule_needed = true;
        // The reply path patches the saved result register before resuming us.
        Ok(())
    }

    pub(super) fn op_create_port(
        &mut self,
        name_address: VAddr,
        max_sessions: u32,
    ) -> Result<(Handle, Handle), ResultCode> {
        if name_address != 0 {
            error!("CreatePort with a named port is not supported");
            return Err(ERR_NOT_IMPLEMENTED);
        }
        let process = self.current_process()?;

        let server = Arc::new(ServerPort::new("port".to_string()));
        let client = Arc::new(ClientPort::new("port".to_string(), max_sessions));
        client.attach_server(&server);

        // The client handle is allocated first, matching handle numbering
        // userland relies on.
        let client_handle = process
            .handle_table
            .create(AnyObject::ClientPort(client))?;
        let server_handle = process
            .handle_table
            .create(AnyObject::ServerPort(server))?;
        Ok((server_handle, client_handle))
    }

    pub(super) fn op_create_session_to_port(
        &mut self,
        client_port_handle: Handle,
    ) -> Result<Handle, ResultCode> {
        let port = match self.kernel.object_for_handle(client_port_handle)? {
            AnyObject::ClientPort(port) => port,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        let (client_session, server_port) = port.connect()?;
        client_session.attach_port(&port);
        let as_wait: Arc<dyn WaitObject> = server_port;
        wait::signal_all(self.kernel, &as_wait);

        let process = self.current_process()?;
        process
            .handle_table
            .create(AnyObject::ClientSession(client_session))
    }

    pub(super) fn op_create_session(&mut self) -> Result<(Handle, Handle), ResultCode> {
        let process = self.current_process()?;
        let (client, server) = new_session_pair("session".to_string());
        let server_handle = process
            .handle_table
            .create(AnyObject::ServerSession(server))?;
        let client_handle = process
            .handle_table
            .create(AnyObject::ClientSession(client))?;
        Ok((server_handle, client_handle))
    }

    pub(super) fn op_accept_session(
        &mut self,
        server_port_handle: Handle,
    ) -> Result<Handle, ResultCode> {
        let port = match self.kernel.object_for_handle(server_port_handle)? {
            AnyObject::ServerPort(port) => port,
            _ => return Err(ERR_INVALID_HANDLE),
        };
        let session = port.accept().ok_or(ERR_NO_PENDING_SESSIONS)?;
        let process = self.current_process()?;
        process
            .handle_table
            .create(AnyObject::ServerSession(session))
    }

    pub(super) fn op_reply_and_receive(
        &mut self,
        handles_address: VAddr,
        handle_count: i32,
        reply_target: Handle,
    ) -> (ResultCode, i32) {
        let Ok(process) = self.current_process() else {
            return (ERR_INVALID_HANDLE, 0);
        };
        let memory = self.kernel.memory.clone();
        if handle_count != 0 && !memory.is_valid_virtual_address(&process, handles_address) {
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

        let header = CommandHeader(
            memory
                .read_u32(&process, ipc::command_buffer_address(&self.thread))
                .unwrap_or(0),
        );

        let mut replied = false;
        if reply_target != 0 && header.command_id() != ipc::CMD_ID_NO_REPLY {
            let session = match self.kernel.object_for_handle(reply_target) {
                Ok(AnyObject::ServerSession(session)) => session,
                Ok(_) => return (ERR_INVALID_HANDLE, 0),
                Err(code) => return (code, 0),
            };
            let Some(requester) = session.take_currently_handling() else {
                return (ERR_SESSION_CLOSED_BY_REMOTE, -1);
            };
            if !session.link.client_alive() {
                return (ERR_SESSION_CLOSED_BY_REMOTE, -1);
            }

            let result = match ipc::translate_command_buffer(self.kernel, &self.thread, &requester)
            {
                Ok(()) => RESULT_SUCCESS,
                Err(code) => {
                    error!(
                        "reply translation to thread {} failed: {:#010x}",
                        requester.thread_id,
                        code.raw()
                    );
                    code
                }
            };
            requester.set_context_reg(0, result.raw());
            requester.resume_from_wait();
            self.kernel.reschedule_needed = true;
            replied = true;
        }

        if handle_count == 0 {
            let code = if replied {
                RESULT_SUCCESS
            } else {
                // Nothing was sent and nothing is awaited.
                RESULT_REPLY_PLACEHOLDER
            };
            return (code, 0);
        }

        if let Some(index) = objects.iter().position(|o| !o.should_wait(&self.thread)) {
            let object = objects[index].clone();
            object.clone().acquire(&self.thread);
            let code = match object.as_server_session() {
                Some(session) => ipc::receive_ipc_request(self.kernel, &session, &self.thread),
                None => RESULT_SUCCESS,
            };
            return (code, index as i32);
        }

        self.thread.begin_wait(
            ThreadStatus::WaitSynchAny,
            objects.clone(),
            Some(WakeupCallback::ReplyReceive),
        );
        for object in objects {
            object.add_waiting_thread(Arc::clone(&self.thread));
        }
        self.kernel.reschedule_needed = true;

        // Blocked with no timeout; the wake patches both outputs.
        (RESULT_SUCCESS, -1)
    }
}
