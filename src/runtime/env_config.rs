//! Environment variable and config file support for [`RuntimeBuilder`](super::builder::RuntimeBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`max_message_len(64)`)
//! 2. **Environment variables**: values from `RAISEKIT_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`RuntimeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `RAISEKIT_MAX_MESSAGE_LEN` | `usize` | `max_message_len` |
//! | `RAISEKIT_MAX_NAME_LEN` | `usize` | `max_name_len` |
//! | `RAISEKIT_MAILBOX_CAPACITY` | `usize` (0 = unbounded) | `mailbox_capacity` |
//! | `RAISEKIT_CONTEXT_NAME_PREFIX` | `String` | `context_name_prefix` |
//! | `RAISEKIT_THREAD_STACK_SIZE` | `usize` | `thread_stack_size` |
//! | `RAISEKIT_ABORT_ON_UNCAUGHT` | `bool` | `abort_on_uncaught` |

use crate::runtime::config::RuntimeConfig;
use crate::types::builder::BuildError;

/// Environment variable name for the maximum message length.
pub const ENV_MAX_MESSAGE_LEN: &str = "RAISEKIT_MAX_MESSAGE_LEN";
/// Environment variable name for the maximum source-name length.
pub const ENV_MAX_NAME_LEN: &str = "RAISEKIT_MAX_NAME_LEN";
/// Environment variable name for the mailbox capacity.
pub const ENV_MAILBOX_CAPACITY: &str = "RAISEKIT_MAILBOX_CAPACITY";
/// Environment variable name for the context name prefix.
pub const ENV_CONTEXT_NAME_PREFIX: &str = "RAISEKIT_CONTEXT_NAME_PREFIX";
/// Environment variable name for the context thread stack size.
pub const ENV_THREAD_STACK_SIZE: &str = "RAISEKIT_THREAD_STACK_SIZE";
/// Environment variable name for the abort-on-uncaught toggle.
pub const ENV_ABORT_ON_UNCAUGHT: &str = "RAISEKIT_ABORT_ON_UNCAUGHT";

/// Apply environment variable overrides to a [`RuntimeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), BuildError> {
    if let Some(val) = read_env(ENV_MAX_MESSAGE_LEN) {
        config.max_message_len = parse_usize(ENV_MAX_MESSAGE_LEN, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_NAME_LEN) {
        config.max_name_len = parse_usize(ENV_MAX_NAME_LEN, &val)?;
    }
    if let Some(val) = read_env(ENV_MAILBOX_CAPACITY) {
        config.mailbox_capacity = capacity(parse_usize(ENV_MAILBOX_CAPACITY, &val)?);
    }
    if let Some(val) = read_env(ENV_CONTEXT_NAME_PREFIX) {
        config.context_name_prefix = val;
    }
    if let Some(val) = read_env(ENV_THREAD_STACK_SIZE) {
        config.thread_stack_size = parse_usize(ENV_THREAD_STACK_SIZE, &val)?;
    }
    if let Some(val) = read_env(ENV_ABORT_ON_UNCAUGHT) {
        config.abort_on_uncaught = parse_bool(ENV_ABORT_ON_UNCAUGHT, &val)?;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn capacity(raw: usize) -> Option<usize> {
    (raw > 0).then_some(raw)
}

fn parse_usize(var_name: &str, val: &str) -> Result<usize, BuildError> {
    val.trim().parse::<usize>().map_err(|e| {
        BuildError::custom(format!(
            "invalid value for {var_name}: expected unsigned integer, got {val:?} ({e})"
        ))
    })
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, BuildError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(BuildError::custom(format!(
            "invalid value for {var_name}: expected bool (true/false/1/0/yes/no), got {val:?}"
        ))),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable runtime configuration.
///
/// ```toml
/// [events]
/// max_message_len = 156
/// max_name_len = 100
/// abort_on_uncaught = true
///
/// [contexts]
/// mailbox_capacity = 1024
/// name_prefix = "myapp-context"
/// thread_stack_size = 2097152
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct RuntimeTomlConfig {
    /// Event settings.
    #[serde(default)]
    pub events: EventsToml,
    /// Context settings.
    #[serde(default)]
    pub contexts: ContextsToml,
}

/// Events section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct EventsToml {
    /// Maximum message length in bytes.
    pub max_message_len: Option<usize>,
    /// Maximum recorded source-name length in bytes.
    pub max_name_len: Option<usize>,
    /// Abort the process after a fatal report.
    pub abort_on_uncaught: Option<bool>,
}

/// Contexts section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct ContextsToml {
    /// Maximum pending events per mailbox (0 = unbounded).
    pub mailbox_capacity: Option<usize>,
    /// Name prefix for unnamed contexts.
    pub name_prefix: Option<String>,
    /// Stack size per context thread in bytes.
    pub thread_stack_size: Option<usize>,
}

/// Apply a parsed TOML config to a [`RuntimeConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut RuntimeConfig, toml: &RuntimeTomlConfig) {
    if let Some(v) = toml.events.max_message_len {
        config.max_message_len = v;
    }
    if let Some(v) = toml.events.max_name_len {
        config.max_name_len = v;
    }
    if let Some(v) = toml.events.abort_on_uncaught {
        config.abort_on_uncaught = v;
    }
    if let Some(v) = toml.contexts.mailbox_capacity {
        config.mailbox_capacity = capacity(v);
    }
    if let Some(ref v) = toml.contexts.name_prefix {
        config.context_name_prefix.clone_from(v);
    }
    if let Some(v) = toml.contexts.thread_stack_size {
        config.thread_stack_size = v;
    }
}

/// Parse a TOML string into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<RuntimeTomlConfig, BuildError> {
    toml::from_str(toml_str)
        .map_err(|e| BuildError::custom(format!("failed to parse TOML config: {e}")))
}

/// Read and parse a TOML file into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<RuntimeTomlConfig, BuildError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BuildError::custom(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
