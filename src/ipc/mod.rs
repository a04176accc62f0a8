/*!
 * IPC
 * Command buffer translation between requesting and serving threads
 */

pub mod translate;

pub use translate::{
    command_buffer_address, receive_ipc_request, translate_command_buffer, CommandHeader,
    CMD_ID_NO_REPLY,
};
