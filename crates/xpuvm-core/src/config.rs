//! Interpreter configuration
//!
//! [`VmConfig`] carries the switches the interpreter consults on every pass.
//! Values come from code (`Default` plus setters) or from the environment
//! via [`VmConfig::from_env`].
//!
//! # Environment Variables
//!
//! | Variable                | Meaning                                   |
//! |-------------------------|-------------------------------------------|
//! | `XPUVM_MAX_EVENTS`      | capacity of each event list               |
//! | `XPUVM_USE_DEPS`        | enable dependency tracking                |
//! | `XPUVM_FLUSH`           | flush the device queue at END             |
//! | `XPUVM_PRINT_BYTECODES` | log every executed opcode                 |
//! | `XPUVM_VIRTUAL_DEVICE`  | compile only, never touch device memory   |
//! | `XPUVM_PROFILER`        | collect transfer and dispatch timers      |
//! | `XPUVM_MEMORY_LIMIT`    | memory limit, e.g. `512MB`                |

use crate::error::{Error, Result};
use std::env;

/// Default capacity of each event list
pub const DEFAULT_MAX_EVENTS: usize = 32;

/// Switches consulted by the interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub max_events: usize,
    pub use_dependencies: bool,
    pub flush_on_end: bool,
    pub trace_bytecodes: bool,
    /// Force every pass into compile-only mode
    pub virtual_device: bool,
    pub profiler: bool,
    pub memory_limit: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            use_dependencies: true,
            flush_on_end: false,
            trace_bytecodes: false,
            virtual_device: false,
            profiler: false,
            memory_limit: None,
        }
    }
}

impl VmConfig {
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_dependencies(mut self, enabled: bool) -> Self {
        self.use_dependencies = enabled;
        self
    }

    pub fn with_flush_on_end(mut self, enabled: bool) -> Self {
        self.flush_on_end = enabled;
        self
    }

    pub fn with_trace_bytecodes(mut self, enabled: bool) -> Self {
        self.trace_bytecodes = enabled;
        self
    }

    pub fn with_virtual_device(mut self, enabled: bool) -> Self {
        self.virtual_device = enabled;
        self
    }

    pub fn with_profiler(mut self, enabled: bool) -> Self {
        self.profiler = enabled;
        self
    }

    pub fn with_memory_limit(mut self, limit: Option<u64>) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Defaults overridden by `XPUVM_*` variables
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_var("XPUVM_MAX_EVENTS") {
            match value.parse::<usize>() {
                Ok(max) if max > 0 => config.max_events = max,
                _ => tracing::warn!(variable = "XPUVM_MAX_EVENTS", value = %value, "ignoring invalid value"),
            }
        }
        if let Some(flag) = env_flag("XPUVM_USE_DEPS") {
            config.use_dependencies = flag;
        }
        if let Some(flag) = env_flag("XPUVM_FLUSH") {
            config.flush_on_end = flag;
        }
        if let Some(flag) = env_flag("XPUVM_PRINT_BYTECODES") {
            config.trace_bytecodes = flag;
        }
        if let Some(flag) = env_flag("XPUVM_VIRTUAL_DEVICE") {
            config.virtual_device = flag;
        }
        if let Some(flag) = env_flag("XPUVM_PROFILER") {
            config.profiler = flag;
        }
        if let Some(value) = env_var("XPUVM_MEMORY_LIMIT") {
            match parse_byte_size(&value) {
                Ok(limit) => config.memory_limit = Some(limit),
                Err(err) => tracing::warn!(variable = "XPUVM_MEMORY_LIMIT", error = %err, "ignoring invalid value"),
            }
        }

        config
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env_var(name)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(variable = name, value = %value, "ignoring invalid flag");
            None
        }
    }
}

/// Parse a human size such as `"512MB"`, `"1GB"`, `"64KB"`, `"100B"` or `"4096"`
///
/// Units are binary (1KB = 1024 bytes) and case-insensitive.
pub fn parse_byte_size(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let invalid = || Error::InvalidConfig(format!("invalid size '{}'", text));
    if digits.is_empty() {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1 << 10,
        "MB" | "M" => 1 << 20,
        "GB" | "G" => 1 << 30,
        "TB" | "T" => 1 << 40,
        _ => return Err(invalid()),
    };

    value.checked_mul(multiplier).ok_or_else(invalid)
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "XPUVM_MAX_EVENTS",
        "XPUVM_USE_DEPS",
        "XPUVM_FLUSH",
        "XPUVM_PRINT_BYTECODES",
        "XPUVM_VIRTUAL_DEVICE",
        "XPUVM_PROFILER",
        "XPUVM_MEMORY_LIMIT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_parse_byte_size() {
        assert_eq!(parse_byte_size("512MB").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_byte_size("1GB").unwrap(), 1 << 30);
        assert_eq!(parse_byte_size("64KB").unwrap(), 64 * 1024);
        assert_eq!(parse_byte_size("100B").unwrap(), 100);
        assert_eq!(parse_byte_size(" 4096 ").unwrap(), 4096);
        assert_eq!(parse_byte_size("2gb").unwrap(), 2 << 30);
    }

    #[test]
    fn test_parse_byte_size_rejects_garbage() {
        for bad in ["", "MB", "12XB", "-1GB", "1.5GB", "99999999999999999999TB"] {
            assert!(parse_byte_size(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_events, 32);
        assert!(config.use_dependencies);
        assert!(!config.flush_on_end);
        assert!(!config.virtual_device);
        assert_eq!(config.memory_limit, None);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("XPUVM_MAX_EVENTS", "8");
        env::set_var("XPUVM_USE_DEPS", "false");
        env::set_var("XPUVM_PROFILER", "1");
        env::set_var("XPUVM_MEMORY_LIMIT", "1GB");

        let config = VmConfig::from_env();
        assert_eq!(config.max_events, 8);
        assert!(!config.use_dependencies);
        assert!(config.profiler);
        assert_eq!(config.memory_limit, Some(1 << 30));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_invalid_values() {
        clear_env();
        env::set_var("XPUVM_MAX_EVENTS", "zero");
        env::set_var("XPUVM_FLUSH", "maybe");
        env::set_var("XPUVM_MEMORY_LIMIT", "lots");

        assert_eq!(VmConfig::from_env(), VmConfig::default());
        clear_env();
    }
}
