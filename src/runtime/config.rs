//! Runtime configuration types.
//!
//! These types hold the concrete values that drive runtime behavior. In most
//! cases you should use [`RuntimeBuilder`](super::builder::RuntimeBuilder) to
//! construct a runtime rather than creating a [`RuntimeConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_message_len` | 156 bytes |
//! | `max_name_len` | 100 bytes |
//! | `mailbox_capacity` | `None` (unbounded) |
//! | `context_name_prefix` | `"raisekit-context"` |
//! | `thread_stack_size` | 2 MiB |
//! | `abort_on_uncaught` | true |

/// Default maximum event message length in bytes.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 156;
/// Default maximum recorded source-name length in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 100;
/// Default prefix for unnamed contexts and their threads.
pub const DEFAULT_CONTEXT_NAME_PREFIX: &str = "raisekit-context";
/// Default stack size of spawned context threads.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Messages longer than this are truncated when raised (default: 156).
    pub max_message_len: usize,
    /// Source names longer than this are truncated when recorded (default: 100).
    pub max_name_len: usize,
    /// Maximum pending events per mailbox (`None` = unbounded).
    pub mailbox_capacity: Option<usize>,
    /// Name prefix for contexts spawned without a name.
    pub context_name_prefix: String,
    /// Stack size of each spawned context thread.
    pub thread_stack_size: usize,
    /// Abort the process after reporting a fatal event.
    ///
    /// When false the fatal report is still delivered, and the failure
    /// surfaces as [`ErrorKind::Uncaught`](crate::error::ErrorKind::Uncaught)
    /// from `join`/`enter` or as an error from the failing raise.
    pub abort_on_uncaught: bool,
}

impl RuntimeConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.max_message_len == 0 {
            self.max_message_len = DEFAULT_MAX_MESSAGE_LEN;
        }
        if self.max_name_len == 0 {
            self.max_name_len = DEFAULT_MAX_NAME_LEN;
        }
        if self.mailbox_capacity == Some(0) {
            self.mailbox_capacity = None;
        }
        if self.context_name_prefix.is_empty() {
            self.context_name_prefix = DEFAULT_CONTEXT_NAME_PREFIX.to_string();
        }
        if self.thread_stack_size == 0 {
            self.thread_stack_size = DEFAULT_THREAD_STACK_SIZE;
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            mailbox_capacity: None,
            context_name_prefix: DEFAULT_CONTEXT_NAME_PREFIX.to_string(),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
            abort_on_uncaught: true,
        }
    }
}
