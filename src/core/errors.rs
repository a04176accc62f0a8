/*!
 * Host-Side Errors
 * Errors surfaced to the embedding application, distinct from guest result codes
 */

use thiserror::Error;

use super::result::{ResultCode, ERR_INVALID_POINTER};

/// Guest memory access failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("unmapped virtual address {addr:#010x}")]
    UnmappedAddress { addr: u32 },

    #[error("access of {size:#x} bytes at {addr:#010x} crosses an unmapped boundary")]
    OutOfBounds { addr: u32, size: u32 },

    #[error("physical backing offset {offset:#x} exceeds memory size {size:#x}")]
    BackingOutOfRange { offset: u32, size: u32 },
}

impl From<MemoryError> for ResultCode {
    fn from(_: MemoryError) -> Self {
        ERR_INVALID_POINTER
    }
}

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}
