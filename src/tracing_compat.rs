//! Logging facade that works with or without the `tracing` crate.
//!
//! - **With `tracing-integration`** (default): re-exports the `tracing`
//!   macros, so raises, matches, enqueues and withdrawals show up as
//!   structured events.
//! - **Without it**: the same macro names expand to nothing.
//!
//! ```rust,ignore
//! use raisekit::tracing_compat::{debug, trace};
//!
//! trace!(context = %id, tag = ?tag, "resume raised");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op logging macros.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn macros_accept_structured_fields() {
        init_test_logging();
        let context = "main";
        trace!(context, depth = 2, "trace message");
        debug!(context, "debug message");
        info!(pending = 3, "info message");
        warn!(?context, "warn message");
        error!(%context, "error message");
    }
}
