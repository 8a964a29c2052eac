#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use raisekit::{EventTypes, EventTypesBuilder, Runtime, RuntimeBuilder, TypeTag};
use std::sync::{Mutex, MutexGuard, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static HOOK_LOCK: Mutex<()> = Mutex::new(());

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED5EED;

const PROPTEST_SEED_ENV: &str = "RAISEKIT_PROPTEST_SEED";
const PROPTEST_MAX_SHRINK_ITERS_ENV: &str = "RAISEKIT_PROPTEST_MAX_SHRINK_ITERS";

/// Configuration for property tests with optional deterministic seed support.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Fixed seed for reproducibility (overrides CI default when set).
    pub seed: Option<u64>,
    /// Number of successful cases required.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropertyTestConfig {
    /// Build a config with defaults for property tests.
    #[must_use]
    pub fn new(cases: u32) -> Self {
        Self {
            seed: read_proptest_seed(),
            cases,
            max_shrink_iters: read_max_shrink_iters()
                .unwrap_or(ProptestConfig::default().max_shrink_iters),
        }
    }

    /// Convert into a ProptestConfig, applying deterministic seed rules.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);

        // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
        if matches!(config.rng_seed, RngSeed::Random) {
            if let Some(seed) = self.seed {
                config.rng_seed = RngSeed::Fixed(seed);
            }
        }

        config.max_shrink_iters = self.max_shrink_iters;
        config
    }
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    PropertyTestConfig::new(cases).to_proptest_config()
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

fn read_max_shrink_iters() -> Option<u32> {
    std::env::var(PROPTEST_MAX_SHRINK_ITERS_ENV)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
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

/// Serializes tests that install process-wide hooks.
///
/// Resets the hooks when acquired so a panicking predecessor cannot leak
/// its hook into the next test.
pub fn hook_lock() -> MutexGuard<'static, ()> {
    let guard = HOOK_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    raisekit::reset_hooks();
    guard
}

/// Tags of the hierarchy built by [`numeric_types`].
#[derive(Debug, Clone, Copy)]
pub struct NumericTags {
    pub arithmetic: TypeTag,
    pub overflow: TypeTag,
    pub underflow: TypeTag,
    pub divide_by_zero: TypeTag,
    pub io: TypeTag,
    pub timeout: TypeTag,
}

/// `Arithmetic { Overflow, Underflow, DivideByZero }`, `Io { Timeout }`.
#[must_use]
pub fn numeric_types() -> (EventTypes, NumericTags) {
    let mut builder = EventTypesBuilder::new();
    let arithmetic = builder.register("Arithmetic", None).expect("register");
    let overflow = builder
        .register("Overflow", Some(arithmetic))
        .expect("register");
    let underflow = builder
        .register("Underflow", Some(arithmetic))
        .expect("register");
    let divide_by_zero = builder
        .register("DivideByZero", Some(arithmetic))
        .expect("register");
    let io = builder.register("Io", None).expect("register");
    let timeout = builder.register("Timeout", Some(io)).expect("register");
    (
        builder.build(),
        NumericTags {
            arithmetic,
            overflow,
            underflow,
            divide_by_zero,
            io,
            timeout,
        },
    )
}

/// A runtime over [`numeric_types`] that reports fatal events as errors.
#[must_use]
pub fn test_runtime() -> (Runtime, NumericTags) {
    init_test_logging();
    let (types, tags) = numeric_types();
    let runtime = RuntimeBuilder::new()
        .event_types(types)
        .abort_on_uncaught(false)
        .build()
        .expect("failed to build test runtime");
    (runtime, tags)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
