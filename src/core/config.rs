/*!
 * Kernel Configuration
 * Tunables fixed at kernel construction time
 */

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

/// Default FCRAM size (128 MiB).
pub const DEFAULT_FCRAM_SIZE: u32 = 0x0800_0000;

/// Kernel construction parameters.
///
/// Defaults model the base hardware revision with two application-visible
/// cores. The extended revision check in GetSystemInfo requires
/// `core_count == 4`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KernelConfig {
    /// Number of emulated CPU cores.
    pub core_count: u32,
    /// Physical memory size in bytes. Must be page aligned.
    pub fcram_size: u32,
    /// Whether priority and core restrictions from the resource limit are
    /// enforced for SetThreadPriority and CreateThread.
    pub enforce_restrictions: bool,
    /// Ticks the system timer advances per GetSystemTick call, modeling the
    /// cost of the trap itself.
    pub ticks_per_tick_read: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            core_count: 2,
            fcram_size: DEFAULT_FCRAM_SIZE,
            enforce_restrictions: true,
            ticks_per_tick_read: 150,
        }
    }
}

impl KernelConfig {
    /// Parses a config from JSON, falling back to defaults for absent fields.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_count == 0 {
            return Err(ConfigError::Invalid("core_count must be nonzero".into()));
        }
        if self.fcram_size == 0 || self.fcram_size & 0xFFF != 0 {
            return Err(ConfigError::Invalid(format!(
                "fcram_size {:#x} must be a nonzero page multiple",
                self.fcram_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.core_count, 2);
        assert_eq!(config.fcram_size, DEFAULT_FCRAM_SIZE);
        assert!(config.enforce_restrictions);
    }

    #[test]
    fn test_partial_json() {
        let config = KernelConfig::from_json_str(r#"{"core_count": 4}"#).unwrap();
        assert_eq!(config.core_count, 4);
        assert_eq!(config.fcram_size, DEFAULT_FCRAM_SIZE);
    }

    #[test]
    fn test_rejects_unaligned_fcram() {
        assert!(KernelConfig::from_json_str(r#"{"fcram_size": 4097}"#).is_err());
    }
}
