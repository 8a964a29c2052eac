//! Runtime builder.

use crate::runtime::config::RuntimeConfig;
use crate::runtime::Runtime;
use crate::types::builder::{BuildError, BuildResult};
use crate::types::EventTypes;

/// Smallest stack a context thread may be given.
pub const MIN_THREAD_STACK_SIZE: usize = 64 * 1024;

/// Builder for constructing a runtime with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    types: EventTypes,
}

impl RuntimeBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            types: EventTypes::default(),
        }
    }

    /// Set the event type hierarchy used for matching and filtering.
    #[must_use]
    pub fn event_types(mut self, types: EventTypes) -> Self {
        self.types = types;
        self
    }

    /// Set the maximum event message length in bytes.
    #[must_use]
    pub fn max_message_len(mut self, len: usize) -> Self {
        self.config.max_message_len = len;
        self
    }

    /// Set the maximum recorded source-name length in bytes.
    #[must_use]
    pub fn max_name_len(mut self, len: usize) -> Self {
        self.config.max_name_len = len;
        self
    }

    /// Bound every mailbox to `capacity` pending events.
    #[must_use]
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = Some(capacity);
        self
    }

    /// Remove the mailbox bound.
    #[must_use]
    pub fn unbounded_mailboxes(mut self) -> Self {
        self.config.mailbox_capacity = None;
        self
    }

    /// Set the name prefix for unnamed contexts.
    #[must_use]
    pub fn context_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.context_name_prefix = prefix.into();
        self
    }

    /// Set the stack size of spawned context threads.
    #[must_use]
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.config.thread_stack_size = size;
        self
    }

    /// Choose whether a fatal report aborts the process.
    #[must_use]
    pub fn abort_on_uncaught(mut self, abort: bool) -> Self {
        self.config.abort_on_uncaught = abort;
        self
    }

    /// Apply `RAISEKIT_*` environment variables on top of the current values.
    pub fn with_env_overrides(mut self) -> BuildResult<Self> {
        crate::runtime::env_config::apply_env_overrides(&mut self.config)?;
        Ok(self)
    }

    /// Start from a TOML config file.
    #[cfg(feature = "config-file")]
    pub fn from_toml(path: impl AsRef<std::path::Path>) -> BuildResult<Self> {
        let parsed = crate::runtime::env_config::parse_toml_file(path.as_ref())?;
        let mut builder = Self::new();
        crate::runtime::env_config::apply_toml_config(&mut builder.config, &parsed);
        Ok(builder)
    }

    /// Start from TOML text.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml: &str) -> BuildResult<Self> {
        let parsed = crate::runtime::env_config::parse_toml_str(toml)?;
        let mut builder = Self::new();
        crate::runtime::env_config::apply_toml_config(&mut builder.config, &parsed);
        Ok(builder)
    }

    /// The configuration as currently set.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build a runtime from this configuration.
    pub fn build(self) -> BuildResult<Runtime> {
        let Self { mut config, types } = self;
        config.normalize();
        if config.thread_stack_size < MIN_THREAD_STACK_SIZE {
            return Err(BuildError::invalid_value(
                "thread_stack_size",
                format!(
                    "{} bytes is below the minimum of {MIN_THREAD_STACK_SIZE}",
                    config.thread_stack_size
                ),
            ));
        }
        Ok(Runtime::from_parts(config, types))
    }
}
