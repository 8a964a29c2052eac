//! Test utilities shared by unit tests.
//!
//! - Consistent tracing-based logging initialization
//! - A lock for tests that mutate environment variables or process-wide hooks
//! - A small event hierarchy used throughout the unit tests

use crate::types::{EventTypes, EventTypesBuilder, TypeTag};
use std::sync::{Mutex, MutexGuard, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());
static HOOK_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Acquire the lock for tests that install process-wide hooks.
pub(crate) fn hook_lock() -> MutexGuard<'static, ()> {
    HOOK_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Tags of the hierarchy built by [`arith_types`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArithTags {
    pub arithmetic: TypeTag,
    pub overflow: TypeTag,
    pub underflow: TypeTag,
    pub io: TypeTag,
}

/// `Arithmetic { Overflow, Underflow }` plus an unrelated `Io`.
pub(crate) fn arith_types() -> (EventTypes, ArithTags) {
    let mut builder = EventTypesBuilder::new();
    let arithmetic = builder.register("Arithmetic", None).expect("register");
    let overflow = builder.register("Overflow", Some(arithmetic)).expect("register");
    let underflow = builder.register("Underflow", Some(arithmetic)).expect("register");
    let io = builder.register("Io", None).expect("register");
    (
        builder.build(),
        ArithTags {
            arithmetic,
            overflow,
            underflow,
            io,
        },
    )
}
