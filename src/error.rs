//! Error types and error handling strategy.
//!
//! Two distinct channels carry failure through this crate:
//!
//! - [`Raised`](crate::event::Raised) is not an error in the usual sense: it
//!   is the carrier of a terminate-kind event propagating outward with `?`
//!   until a protected block's handler matches it.
//! - [`Error`] reports failures of the runtime operations themselves (an
//!   asynchronous send to a dead context, a refused delivery, a misused
//!   event). These are always returned to the immediate caller.
//!
//! The only fatal path is a terminate-kind event that nothing handles; it is
//! reported through the process-wide hooks in [`crate::hooks`], not through
//! [`Error`].
//!
//! # Recovery Classification
//!
//! All errors can be classified by [`Recoverability`]:
//! - `Transient`: temporary failure, safe to retry (a full mailbox)
//! - `Permanent`: retrying cannot succeed (the destination terminated)

use core::fmt;
use std::sync::Arc;

use crate::types::ContextId;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Delivery ===
    /// The destination context has terminated (or never existed).
    DestinationTerminated,
    /// The destination currently disables delivery of this event type.
    EventDisabled,
    /// The destination mailbox reached its configured capacity.
    MailboxFull,

    // === Events ===
    /// The event's payload cannot be duplicated for cross-context transfer.
    DuplicationUnsupported,
    /// No event is being handled in the calling context.
    NoCurrentEvent,
    /// The event was already raised and can no longer be modified.
    EventAlreadyRaised,
    /// The event's type tag is not part of the runtime's hierarchy.
    UnknownEventType,

    // === Scoping ===
    /// Handler tables or filters were released out of LIFO order.
    ScopeViolation,

    // === Contexts ===
    /// A terminate-kind event left a context's entry point unhandled.
    Uncaught,
    /// A context's entry point panicked.
    ContextPanicked,
    /// The context's thread could not be started.
    SpawnFailed,

    // === Internal ===
    /// Internal runtime error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::DestinationTerminated | Self::EventDisabled | Self::MailboxFull => {
                ErrorCategory::Delivery
            }
            Self::DuplicationUnsupported
            | Self::NoCurrentEvent
            | Self::EventAlreadyRaised
            | Self::UnknownEventType => ErrorCategory::Event,
            Self::ScopeViolation => ErrorCategory::Scope,
            Self::Uncaught | Self::ContextPanicked | Self::SpawnFailed => ErrorCategory::Context,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::MailboxFull | Self::EventDisabled | Self::SpawnFailed => {
                Recoverability::Transient
            }
            Self::DestinationTerminated
            | Self::DuplicationUnsupported
            | Self::EventAlreadyRaised
            | Self::UnknownEventType
            | Self::ScopeViolation
            | Self::Uncaught
            | Self::ContextPanicked
            | Self::Internal => Recoverability::Permanent,
            Self::NoCurrentEvent => Recoverability::Unknown,
        }
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.recoverability(), Recoverability::Transient)
    }
}

/// Classification of error recoverability for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Permanent failure that will not succeed on retry.
    Permanent,
    /// Recoverability depends on context.
    Unknown,
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Asynchronous delivery failures reported to the sender.
    Delivery,
    /// Misuse of an event object.
    Event,
    /// Scoped acquisition/release violations.
    Scope,
    /// Context lifecycle failures.
    Context,
    /// Internal runtime errors.
    Internal,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The context that performed the failing operation.
    pub context_id: Option<ContextId>,
    /// The destination of a failed asynchronous raise.
    pub destination: Option<ContextId>,
}

/// The main error type for runtime operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: ErrorContext {
                context_id: None,
                destination: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Records the destination of a failed send.
    #[must_use]
    pub fn with_destination(mut self, destination: ContextId) -> Self {
        self.context.destination = Some(destination);
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a delivery failure for a terminated destination.
    #[must_use]
    pub fn destination_terminated(destination: ContextId) -> Self {
        Self::new(ErrorKind::DestinationTerminated)
            .with_message(format!("context {destination} has terminated"))
            .with_destination(destination)
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if the failure was a refused or undeliverable send.
    #[must_use]
    pub const fn is_delivery_failure(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Delivery)
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for runtime operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Underlying;

    impl fmt::Display for Underlying {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "underlying")
        }
    }

    impl std::error::Error for Underlying {}

    #[test]
    fn display_without_message() {
        let err = Error::new(ErrorKind::Internal);
        assert_eq!(err.to_string(), "Internal");
    }

    #[test]
    fn display_with_message() {
        let err = Error::new(ErrorKind::MailboxFull).with_message("8 pending");
        assert_eq!(err.to_string(), "MailboxFull: 8 pending");
    }

    #[test]
    fn source_chain_is_exposed() {
        let err = Error::new(ErrorKind::SpawnFailed)
            .with_message("outer")
            .with_source(Underlying);
        let source = err.source().expect("source missing");
        assert_eq!(source.to_string(), "underlying");
    }

    #[test]
    fn destination_terminated_records_destination() {
        let dest = ContextId::new_for_test(4, 1);
        let err = Error::destination_terminated(dest);
        assert_eq!(err.kind(), ErrorKind::DestinationTerminated);
        assert_eq!(err.context().destination, Some(dest));
        assert!(err.is_delivery_failure());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "DestinationTerminated: context C4 has terminated");
    }

    #[test]
    fn classification() {
        assert_eq!(ErrorKind::MailboxFull.category(), ErrorCategory::Delivery);
        assert!(ErrorKind::MailboxFull.is_retryable());
        assert_eq!(
            ErrorKind::DuplicationUnsupported.recoverability(),
            Recoverability::Permanent
        );
        assert_eq!(ErrorKind::ScopeViolation.category(), ErrorCategory::Scope);
    }

    #[test]
    fn result_ext_adds_message() {
        let res: core::result::Result<(), Error> = Err(Error::new(ErrorKind::EventDisabled));
        let err = res.context("send to worker").expect_err("expected err");
        assert_eq!(err.kind(), ErrorKind::EventDisabled);
        assert_eq!(err.to_string(), "EventDisabled: send to worker");
    }
}
