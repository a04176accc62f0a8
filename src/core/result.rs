/*!
 * Result Codes
 * 32-bit guest-visible result encoding: description, module, summary, level
 */

use serde::{Deserialize, Serialize};

/// Error module field of a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorModule {
    Common = 0,
    Kernel = 1,
    Util = 2,
    Os = 6,
    Fnd = 36,
}

/// Error summary field of a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorSummary {
    Success = 0,
    NothingHappened = 1,
    WouldBlock = 2,
    OutOfResource = 3,
    NotFound = 4,
    InvalidState = 5,
    NotSupported = 6,
    InvalidArgument = 7,
    WrongArgument = 8,
    Canceled = 9,
    StatusChanged = 10,
    Internal = 11,
}

/// Error level field of a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorLevel {
    Success = 0,
    Info = 1,
    Status = 25,
    Temporary = 26,
    Permanent = 27,
    Usage = 28,
    Reinitialize = 29,
    Reset = 30,
    Fatal = 31,
}

/// Generic description values shared across modules.
pub mod desc {
    pub const INVALID_SECTION: u32 = 1000;
    pub const TOO_LARGE: u32 = 1001;
    pub const NOT_AUTHORIZED: u32 = 1002;
    pub const ALREADY_DONE: u32 = 1003;
    pub const INVALID_SIZE: u32 = 1004;
    pub const INVALID_ENUM_VALUE: u32 = 1005;
    pub const INVALID_COMBINATION: u32 = 1006;
    pub const NO_DATA: u32 = 1007;
    pub const BUSY: u32 = 1008;
    pub const MISALIGNED_ADDRESS: u32 = 1009;
    pub const MISALIGNED_SIZE: u32 = 1010;
    pub const OUT_OF_MEMORY: u32 = 1011;
    pub const NOT_IMPLEMENTED: u32 = 1012;
    pub const INVALID_ADDRESS: u32 = 1013;
    pub const INVALID_POINTER: u32 = 1014;
    pub const INVALID_HANDLE: u32 = 1015;
    pub const NOT_INITIALIZED: u32 = 1016;
    pub const ALREADY_INITIALIZED: u32 = 1017;
    pub const NOT_FOUND: u32 = 1018;
    pub const CANCEL_REQUESTED: u32 = 1019;
    pub const ALREADY_EXISTS: u32 = 1020;
    pub const OUT_OF_RANGE: u32 = 1021;
    pub const TIMEOUT: u32 = 1022;

    // Kernel-module specific descriptions
    pub const OUT_OF_HANDLES: u32 = 19;
    pub const PROCESS_NOT_FOUND: u32 = 24;
    pub const THREAD_NOT_FOUND: u32 = 25;
    pub const SESSION_CLOSED_BY_REMOTE: u32 = 26;
    pub const PORT_NAME_TOO_LONG: u32 = 30;
    pub const WRONG_LOCKING_THREAD: u32 = 31;
    pub const NO_PENDING_SESSIONS: u32 = 35;
    pub const MAX_CONNECTIONS_REACHED: u32 = 52;
}

/// 32-bit guest-visible result code.
///
/// Success is the single sentinel value 0; failures pack
/// {description, module, summary, level} into the word. Callers must use
/// [`ResultCode::is_success`] rather than comparing against module-specific
/// constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const fn new(
        description: u32,
        module: ErrorModule,
        summary: ErrorSummary,
        level: ErrorLevel,
    ) -> Self {
        Self(
            (description & 0x3FF)
                | ((module as u32 & 0xFF) << 10)
                | ((summary as u32 & 0x3F) << 21)
                | ((level as u32 & 0x1F) << 27),
        )
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        // The level field's top bit doubles as the failure flag.
        (self.0 >> 31) != 0
    }

    #[inline]
    #[must_use]
    pub const fn description(self) -> u32 {
        self.0 & 0x3FF
    }

    #[inline]
    #[must_use]
    pub const fn module(self) -> u32 {
        (self.0 >> 10) & 0xFF
    }

    #[inline]
    #[must_use]
    pub const fn summary(self) -> u32 {
        (self.0 >> 21) & 0x3F
    }

    #[inline]
    #[must_use]
    pub const fn level(self) -> u32 {
        (self.0 >> 27) & 0x1F
    }
}

/// Success sentinel.
pub const RESULT_SUCCESS: ResultCode = ResultCode(0);

/// Timeout outcome of a wait; a valid result, not a true error.
pub const RESULT_TIMEOUT: ResultCode = ResultCode::new(
    desc::TIMEOUT,
    ErrorModule::Os,
    ErrorSummary::StatusChanged,
    ErrorLevel::Info,
);

pub const ERR_OUT_OF_HANDLES: ResultCode = ResultCode::new(
    desc::OUT_OF_HANDLES,
    ErrorModule::Kernel,
    ErrorSummary::OutOfResource,
    ErrorLevel::Permanent,
);

pub const ERR_SESSION_CLOSED_BY_REMOTE: ResultCode = ResultCode::new(
    desc::SESSION_CLOSED_BY_REMOTE,
    ErrorModule::Os,
    ErrorSummary::Canceled,
    ErrorLevel::Status,
);

pub const ERR_PORT_NAME_TOO_LONG: ResultCode = ResultCode::new(
    desc::PORT_NAME_TOO_LONG,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_WRONG_LOCKING_THREAD: ResultCode = ResultCode::new(
    desc::WRONG_LOCKING_THREAD,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

pub const ERR_MAX_CONNECTIONS_REACHED: ResultCode = ResultCode::new(
    desc::MAX_CONNECTIONS_REACHED,
    ErrorModule::Os,
    ErrorSummary::WouldBlock,
    ErrorLevel::Temporary,
);

pub const ERR_NO_PENDING_SESSIONS: ResultCode = ResultCode::new(
    desc::NO_PENDING_SESSIONS,
    ErrorModule::Os,
    ErrorSummary::WouldBlock,
    ErrorLevel::Permanent,
);

pub const ERR_PROCESS_NOT_FOUND: ResultCode = ResultCode::new(
    desc::PROCESS_NOT_FOUND,
    ErrorModule::Os,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

pub const ERR_THREAD_NOT_FOUND: ResultCode = ResultCode::new(
    desc::THREAD_NOT_FOUND,
    ErrorModule::Os,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

pub const ERR_NOT_AUTHORIZED: ResultCode = ResultCode::new(
    desc::NOT_AUTHORIZED,
    ErrorModule::Os,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

pub const ERR_INVALID_ENUM_VALUE: ResultCode = ResultCode::new(
    desc::INVALID_ENUM_VALUE,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

pub const ERR_INVALID_ENUM_VALUE_FND: ResultCode = ResultCode::new(
    desc::INVALID_ENUM_VALUE,
    ErrorModule::Fnd,
    ErrorSummary::WrongArgument,
    ErrorLevel::Usage,
);

pub const ERR_INVALID_COMBINATION: ResultCode = ResultCode::new(
    desc::INVALID_COMBINATION,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_MISALIGNED_ADDRESS: ResultCode = ResultCode::new(
    desc::MISALIGNED_ADDRESS,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_MISALIGNED_SIZE: ResultCode = ResultCode::new(
    desc::MISALIGNED_SIZE,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_OUT_OF_MEMORY: ResultCode = ResultCode::new(
    desc::OUT_OF_MEMORY,
    ErrorModule::Kernel,
    ErrorSummary::OutOfResource,
    ErrorLevel::Permanent,
);

pub const ERR_NOT_IMPLEMENTED: ResultCode = ResultCode::new(
    desc::NOT_IMPLEMENTED,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_INVALID_ADDRESS: ResultCode = ResultCode::new(
    desc::INVALID_ADDRESS,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_INVALID_ADDRESS_STATE: ResultCode = ResultCode::new(
    desc::INVALID_ADDRESS,
    ErrorModule::Os,
    ErrorSummary::InvalidState,
    ErrorLevel::Usage,
);

pub const ERR_INVALID_POINTER: ResultCode = ResultCode::new(
    desc::INVALID_POINTER,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_INVALID_HANDLE: ResultCode = ResultCode::new(
    desc::INVALID_HANDLE,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_NOT_FOUND: ResultCode = ResultCode::new(
    desc::NOT_FOUND,
    ErrorModule::Os,
    ErrorSummary::NotFound,
    ErrorLevel::Permanent,
);

pub const ERR_OUT_OF_RANGE: ResultCode = ResultCode::new(
    desc::OUT_OF_RANGE,
    ErrorModule::Os,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

pub const ERR_OUT_OF_RANGE_KERNEL: ResultCode = ResultCode::new(
    desc::OUT_OF_RANGE,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

/// Placeholder result returned by ReplyAndReceive when called with no
/// handles and no reply to perform.
pub const RESULT_REPLY_PLACEHOLDER: ResultCode = ResultCode(0xE7E3_FFFF);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_predicates() {
        assert!(RESULT_SUCCESS.is_success());
        assert!(!RESULT_SUCCESS.is_error());
        assert!(!RESULT_TIMEOUT.is_success());
        // Timeout is informational, not a failure-level code.
        assert!(!RESULT_TIMEOUT.is_error());
        assert!(ERR_INVALID_HANDLE.is_error());
    }

    #[test]
    fn test_known_encodings() {
        // Reference-platform raw values the guest ABI depends on.
        assert_eq!(ERR_INVALID_HANDLE.raw(), 0xE0E01BF7);
        assert_eq!(RESULT_TIMEOUT.raw(), 0x09401BFE);
        assert_eq!(ERR_MISALIGNED_ADDRESS.raw(), 0xE0E01BF1);
        assert_eq!(ERR_MISALIGNED_SIZE.raw(), 0xE0E01BF2);
        assert_eq!(ERR_INVALID_COMBINATION.raw(), 0xE0E01BEE);
        assert_eq!(ERR_NOT_IMPLEMENTED.raw(), 0xE0E01BF4);
        assert_eq!(ERR_INVALID_ADDRESS.raw(), 0xE0E01BF5);
        assert_eq!(ERR_INVALID_POINTER.raw(), 0xE0E01BF6);
        assert_eq!(ERR_OUT_OF_RANGE.raw(), 0xE0E01BFD);
        assert_eq!(ERR_NOT_AUTHORIZED.raw(), 0xD9001BEA);
    }

    #[test]
    fn test_field_round_trip() {
        let code = ResultCode::new(
            desc::INVALID_HANDLE,
            ErrorModule::Os,
            ErrorSummary::InvalidArgument,
            ErrorLevel::Usage,
        );
        assert_eq!(code.description(), desc::INVALID_HANDLE);
        assert_eq!(code.module(), ErrorModule::Os as u32);
        assert_eq!(code.summary(), ErrorSummary::InvalidArgument as u32);
        assert_eq!(code.level(), ErrorLevel::Usage as u32);
    }
}
