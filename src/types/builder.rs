//! Builder validation errors.
//!
//! Builders in this crate are move-based: every setter takes `self` and
//! returns `Self`, and `build()` performs the cross-field validation,
//! returning [`BuildError`] on failure.
//!
//! ```ignore
//! let runtime = RuntimeBuilder::new()
//!     .max_message_len(256)
//!     .mailbox_capacity(64)
//!     .build()?;
//! ```

use core::fmt;

use crate::types::tag::TagError;

/// Errors that can occur when building a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A field value failed validation.
    InvalidValue {
        /// The field that failed validation.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },

    /// Event type registration failed.
    EventType(TagError),

    /// A custom validation error with arbitrary message.
    Custom {
        /// The error message.
        message: String,
    },
}

impl BuildError {
    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a `Custom` error.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Returns the field name associated with this error, if any.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            Self::EventType(_) | Self::Custom { .. } => None,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for `{field}`: {reason}")
            }
            Self::EventType(err) => write!(f, "event type registration failed: {err}"),
            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EventType(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TagError> for BuildError {
    fn from(err: TagError) -> Self {
        Self::EventType(err)
    }
}

/// Result alias for `build()` methods.
pub type BuildResult<T> = Result<T, BuildError>;
