/*!
 * SVC Table
 * Immediate-to-handler mapping for calls 0x00 through 0xB3
 */

use super::{wrap, Svc};

pub type SvcHandler = fn(&mut Svc<'_>);

/// One dispatch slot. Entries without a handler are known calls we log by
/// name and skip.
pub struct SvcDef {
    pub name: &'static str,
    pub handler: Option<SvcHandler>,
}

const fn def(name: &'static str, handler: SvcHandler) -> SvcDef {
    SvcDef {
        name,
        handler: Some(handler),
    }
}

const fn stub(name: &'static str) -> SvcDef {
    SvcDef {
        name,
        handler: None,
    }
}

#[must_use]
pub fn lookup(immediate: u32) -> Option<&'static SvcDef> {
    SVC_TABLE.get(immediate as usize)
}

pub const SVC_TABLE: [SvcDef; 180] = [
    stub("Unknown"),                                            // 0x00
    def("ControlMemory", wrap::control_memory),                 // 0x01
    def("QueryMemory", wrap::query_memory),                     // 0x02
    def("ExitProcess", wrap::exit_process),                     // 0x03
    stub("GetProcessAffinityMask"),                             // 0x04
    stub("SetProcessAffinityMask"),                             // 0x05
    stub("GetProcessIdealProcessor"),                           // 0x06
    stub("SetProcessIdealProcessor"),                           // 0x07
    def("CreateThread", wrap::create_thread),                   // 0x08
    def("ExitThread", wrap::exit_thread),                       // 0x09
    def("SleepThread", wrap::sleep_thread),                     // 0x0A
    def("GetThreadPriority", wrap::get_thread_priority),        // 0x0B
    def("SetThreadPriority", wrap::set_thread_priority),        // 0x0C
    stub("GetThreadAffinityMask"),                              // 0x0D
    stub("SetThreadAffinityMask"),                              // 0x0E
    stub("GetThreadIdealProcessor"),                            // 0x0F
    stub("SetThreadIdealProcessor"),                            // 0x10
    stub("GetCurrentProcessorNumber"),                          // 0x11
    stub("Run"),                                                // 0x12
    def("CreateMutex", wrap::create_mutex),                     // 0x13
    def("ReleaseMutex", wrap::release_mutex),                   // 0x14
    def("CreateSemaphore", wrap::create_semaphore),             // 0x15
    def("ReleaseSemaphore", wrap::release_semaphore),           // 0x16
    def("CreateEvent", wrap::create_event),                     // 0x17
    def("SignalEvent", wrap::signal_event),                     // 0x18
    def("ClearEvent", wrap::clear_event),                       // 0x19
    def("CreateTimer", wrap::create_timer),                     // 0x1A
    def("SetTimer", wrap::set_timer),                           // 0x1B
    def("CancelTimer", wrap::cancel_timer),                     // 0x1C
    def("ClearTimer", wrap::clear_timer),                       // 0x1D
    def("CreateMemoryBlock", wrap::create_memory_block),        // 0x1E
    def("MapMemoryBlock", wrap::map_memory_block),              // 0x1F
    def("UnmapMemoryBlock", wrap::unmap_memory_block),          // 0x20
    def("CreateAddressArbiter", wrap::create_address_arbiter),  // 0x21
    def("ArbitrateAddress", wrap::arbitrate_address),           // 0x22
    def("CloseHandle", wrap::close_handle),                     // 0x23
    def("WaitSynchronization1", wrap::wait_synchronization1),   // 0x24
    def("WaitSynchronizationN", wrap::wait_synchronization_n),  // 0x25
    stub("SignalAndWait"),                                      // 0x26
    def("DuplicateHandle", wrap::duplicate_handle),             // 0x27
    def("GetSystemTick", wrap::get_system_tick),                // 0x28
    def("GetHandleInfo", wrap::get_handle_info),                // 0x29
    def("GetSystemInfo", wrap::get_system_info),                // 0x2A
    def("GetProcessInfo", wrap::get_process_info),              // 0x2B
    def("GetThreadInfo", wrap::get_thread_info),                // 0x2C
    def("ConnectToPort", wrap::connect_to_port),                // 0x2D
    stub("SendSyncRequest1"),                                   // 0x2E
    stub("SendSyncRequest2"),                                   // 0x2F
    stub("SendSyncRequest3"),                                   // 0x30
    stub("SendSyncRequest4"),                                   // 0x31
    def("SendSyncRequest", wrap::send_sync_request),            // 0x32
    def("OpenProcess", wrap::open_process),                     // 0x33
    def("OpenThread", wrap::open_thread),                       // 0x34
    def("GetProcessId", wrap::get_process_id),                  // 0x35
    def("GetProcessIdOfThread", wrap::get_process_id_of_thread), // 0x36
    def("GetThreadId", wrap::get_thread_id),                    // 0x37
    def("GetResourceLimit", wrap::get_resource_limit),          // 0x38
    def("GetResourceLimitLimitValues", wrap::get_resource_limit_limit_values), // 0x39
    def("GetResourceLimitCurrentValues", wrap::get_resource_limit_current_values), // 0x3A
    stub("GetThreadContext"),                                   // 0x3B
    def("Break", wrap::break_),                                 // 0x3C
    def("OutputDebugString", wrap::output_debug_string),        // 0x3D
    stub("ControlPerformanceCounter"),                          // 0x3E
    stub("Unknown"),                                            // 0x3F
    stub("Unknown"),                                            // 0x40
    stub("Unknown"),                                            // 0x41
    stub("Unknown"),                                            // 0x42
    stub("Unknown"),                                            // 0x43
    stub("Unknown"),                                            // 0x44
    stub("Unknown"),                                            // 0x45
    stub("Unknown"),                                            // 0x46
    def("CreatePort", wrap::create_port),                       // 0x47
    def("CreateSessionToPort", wrap::create_session_to_port),   // 0x48
    def("CreateSession", wrap::create_session),                 // 0x49
    def("AcceptSession", wrap::accept_session),                 // 0x4A
    stub("ReplyAndReceive1"),                                   // 0x4B
    stub("ReplyAndReceive2"),                                   // 0x4C
    stub("ReplyAndReceive3"),                                   // 0x4D
    stub("ReplyAndReceive4"),                                   // 0x4E
    def("ReplyAndReceive", wrap::reply_and_receive),            // 0x4F
    stub("BindInterrupt"),                                      // 0x50
    stub("UnbindInterrupt"),                                    // 0x51
    stub("InvalidateProcessDataCache"),                         // 0x52
    stub("StoreProcessDataCache"),                              // 0x53
    stub("FlushProcessDataCache"),                              // 0x54
    stub("StartInterProcessDma"),                               // 0x55
    stub("StopDma"),                                            // 0x56
    stub("GetDmaState"),                                        // 0x57
    stub("RestartDma"),                                         // 0x58
    stub("SetGpuProt"),                                         // 0x59
    stub("SetWifiEnabled"),                                     // 0x5A
    stub("Unknown"),                                            // 0x5B
    stub("Unknown"),                                            // 0x5C
    stub("Unknown"),                                            // 0x5D
    stub("Unknown"),                                            // 0x5E
    stub("Unknown"),                                            // 0x5F
    stub("DebugActiveProcess"),                                 // 0x60
    stub("BreakDebugProcess"),                                  // 0x61
    stub("TerminateDebugProcess"),                              // 0x62
    stub("GetProcessDebugEvent"),                               // 0x63
    stub("ContinueDebugEvent"),                                 // 0x64
    def("GetProcessList", wrap::get_process_list),              // 0x65
    stub("GetThreadList"),                                      // 0x66
    stub("GetDebugThreadContext"),                              // 0x67
    stub("SetDebugThreadContext"),                              // 0x68
    stub("QueryDebugProcessMemory"),                            // 0x69
    stub("ReadProcessMemory"),                                  // 0x6A
    stub("WriteProcessMemory"),                                 // 0x6B
    stub("SetHardwareBreakPoint"),                              // 0x6C
    stub("GetDebugThreadParam"),                                // 0x6D
    stub("Unknown"),                                            // 0x6E
    stub("Unknown"),                                            // 0x6F
    stub("ControlProcessMemory"),                               // 0x70
    stub("MapProcessMemory"),                                   // 0x71
    stub("UnmapProcessMemory"),                                 // 0x72
    stub("CreateCodeSet"),                                      // 0x73
    stub("RandomStub"),                                         // 0x74
    stub("CreateProcess"),                                      // 0x75
    stub("TerminateProcess"),                                   // 0x76
    stub("SetProcessResourceLimits"),                           // 0x77
    stub("CreateResourceLimit"),                                // 0x78
    stub("SetResourceLimitValues"),                             // 0x79
    stub("AddCodeSegment"),                                     // 0x7A
    stub("Backdoor"),                                           // 0x7B
    def("KernelSetState", wrap::kernel_set_state),              // 0x7C
    def("QueryProcessMemory", wrap::query_process_memory),      // 0x7D
    stub("Unused"),                                             // 0x7E
    stub("Unused"),                                             // 0x7F
    stub("CustomBackdoor"),                                     // 0x80
    stub("Unused"),                                             // 0x81
    stub("Unused"),                                             // 0x82
    stub("Unused"),                                             // 0x83
    stub("Unused"),                                             // 0x84
    stub("Unused"),                                             // 0x85
    stub("Unused"),                                             // 0x86
    stub("Unused"),                                             // 0x87
    stub("Unused"),                                             // 0x88
    stub("Unused"),                                             // 0x89
    stub("Unused"),                                             // 0x8A
    stub("Unused"),                                             // 0x8B
    stub("Unused"),                                             // 0x8C
    stub("Unused"),                                             // 0x8D
    stub("Unused"),                                             // 0x8E
    stub("Unused"),                                             // 0x8F
    def("ConvertVaToPa", wrap::convert_va_to_pa),               // 0x90
    stub("FlushDataCacheRange"),                                // 0x91
    stub("FlushEntireDataCache"),                               // 0x92
    def("InvalidateInstructionCacheRange", wrap::invalidate_instruction_cache_range), // 0x93
    def("InvalidateEntireInstructionCache", wrap::invalidate_entire_instruction_cache), // 0x94
    stub("Unused"),                                             // 0x95
    stub("Unused"),                                             // 0x96
    stub("Unused"),                                             // 0x97
    stub("Unused"),                                             // 0x98
    stub("Unused"),                                             // 0x99
    stub("Unused"),                                             // 0x9A
    stub("Unused"),                                             // 0x9B
    stub("Unused"),                                             // 0x9C
    stub("Unused"),                                             // 0x9D
    stub("Unused"),                                             // 0x9E
    stub("Unused"),                                             // 0x9F
    def("MapProcessMemoryEx", wrap::map_process_memory_ex),     // 0xA0
    def("UnmapProcessMemoryEx", wrap::unmap_process_memory_ex), // 0xA1
    stub("ControlMemoryEx"),                                    // 0xA2
    stub("ControlMemoryUnsafe"),                                // 0xA3
    stub("Unused"),                                             // 0xA4
    stub("Unused"),                                             // 0xA5
    stub("Unused"),                                             // 0xA6
    stub("Unused"),                                             // 0xA7
    stub("Unused"),                                             // 0xA8
    stub("Unused"),                                             // 0xA9
    stub("Unused"),                                             // 0xAA
    stub("Unused"),                                             // 0xAB
    stub("Unused"),                                             // 0xAC
    stub("Unused"),                                             // 0xAD
    stub("Unused"),                                             // 0xAE
    stub("Unused"),                                             // 0xAF
    stub("ControlService"),                                     // 0xB0
    stub("CopyHandle"),                                         // 0xB1
    stub("TranslateHandle"),                                    // 0xB2
    def("ControlProcess", wrap::control_process),               // 0xB3
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_covers_full_range() {
        assert_eq!(SVC_TABLE.len(), 0xB4);
        assert!(lookup(0xB4).is_none());
    }

    #[test]
    fn well_known_slots() {
        assert_eq!(lookup(0x01).map(|d| d.name), Some("ControlMemory"));
        assert_eq!(lookup(0x24).map(|d| d.name), Some("WaitSynchronization1"));
        assert_eq!(lookup(0x4F).map(|d| d.name), Some("ReplyAndReceive"));
        assert_eq!(lookup(0xB3).map(|d| d.name), Some("ControlProcess"));
        assert!(lookup(0x12).map_or(false, |d| d.handler.is_none()));
    }
}
