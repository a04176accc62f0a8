/*!
 * Core Module
 * Shared types, result codes, errors, and configuration
 */

pub mod config;
pub mod errors;
pub mod result;
pub mod types;

pub use config::KernelConfig;
pub use errors::{ConfigError, MemoryError};
pub use result::{ResultCode, RESULT_SUCCESS, RESULT_TIMEOUT};
pub use types::*;
