/*!
 * Kernel Objects
 * Handle-referenced objects and their wait semantics
 */

pub mod address_arbiter;
pub mod event;
pub mod handle_table;
pub mod mutex;
pub mod object;
pub mod process;
pub mod resource_limit;
pub mod semaphore;
pub mod session;
pub mod shared_memory;
pub mod thread;
pub mod timer;

pub use address_arbiter::{AddressArbiter, ArbitrationType};
pub use event::{Event, ResetType};
pub use handle_table::HandleTable;
pub use mutex::Mutex;
pub use object::{same_wait_object, AnyObject, HandleType, WaitList, WaitObject};
pub use process::{Process, ProcessStatus};
pub use resource_limit::{ResourceLimit, ResourceLimitCategory, ResourceLimitType};
pub use semaphore::Semaphore;
pub use session::{
    new_session_pair, ClientPort, ClientSession, ServerPort, ServerSession, SessionLink,
};
pub use shared_memory::SharedMemory;
pub use thread::{Thread, ThreadStatus, WakeupCallback};
pub use timer::Timer;
