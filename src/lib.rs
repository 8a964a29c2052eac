//! Raisekit: dual-mode structured event handling for cooperating contexts.
//!
//! # Overview
//!
//! Raisekit lets code raise typed events with two different semantics:
//!
//! - **Terminate**: the faulting operation is abandoned and control continues
//!   after the protected block whose handler matched. In Rust this is a
//!   [`Raised`] returned through `?`.
//! - **Resume**: a handler runs on top of the raising stack and control comes
//!   back to the exact raise site with a [`ResumeOutcome`].
//!
//! Both work synchronously (a context raising against itself) and
//! asynchronously (one context sending an event into another context's
//! mailbox, to be delivered when that context polls).
//!
//! # Core Guarantees
//!
//! - **Deterministic matching**: innermost block first, declaration order
//!   within a block, catch-alls last
//! - **Scoped tables**: handler tables and filters are released in reverse
//!   order of acquisition on every exit path
//! - **No re-entry**: a resume raised from inside a resumption handler never
//!   reaches that handler's own block or anything above it
//! - **No silent drops**: a refused or undeliverable asynchronous raise is
//!   reported to the sender
//! - **One fatal path**: only a terminate that escapes a context is fatal
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers, event type hierarchy, instance bindings
//! - [`event`]: The event value and its propagation carrier
//! - [`handler`]: Handler tables, the resumption chain, the filter stack
//! - [`mailbox`]: Per-context queue of asynchronous events
//! - [`cx`]: The context handle, delivery engine and protected blocks
//! - [`hooks`]: Process-wide hooks for unhandled events
//! - [`runtime`]: Context registry, spawning and configuration
//! - [`error`]: Error types
//! - [`util`]: Internal utilities (arenas)
//!
//! # Example
//!
//! ```
//! use raisekit::{Event, EventTypesBuilder, ResumeOutcome, RuntimeBuilder, Try};
//!
//! let mut builder = EventTypesBuilder::new();
//! let overflow = builder.register("Overflow", None).unwrap();
//! let runtime = RuntimeBuilder::new()
//!     .event_types(builder.build())
//!     .build()
//!     .unwrap();
//!
//! let log = std::cell::RefCell::new(Vec::new());
//! runtime
//!     .enter("main", |cx| {
//!         Try::new()
//!             .catch_resume(overflow, |_cx, ev| {
//!                 log.borrow_mut().push(format!("saturating: {}", ev.message()));
//!                 Ok(())
//!             })
//!             .run(cx, |cx| {
//!                 let mut ev = Event::new(overflow, "counter wrapped");
//!                 assert_eq!(cx.resume(&mut ev)?, ResumeOutcome::Handled);
//!                 log.borrow_mut().push("back at the raise site".to_string());
//!                 Ok(())
//!             })
//!     })
//!     .unwrap();
//! assert_eq!(
//!     log.into_inner(),
//!     ["saturating: counter wrapped", "back at the raise site"]
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod cx;
pub mod error;
pub mod event;
pub mod handler;
pub mod hooks;
pub mod mailbox;
pub mod runtime;
pub mod tracing_compat;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cx::{Cx, Try};
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, Result, ResultExt};
pub use event::{Event, EventInfo, RaiseKind, Raised, ResumeOutcome};
pub use hooks::{
    reset_hooks, set_terminate_hook, set_unhandled_resume_hook, FatalReason, FatalReport,
};
pub use mailbox::Ticket;
pub use runtime::{ContextRef, JoinHandle, Runtime, RuntimeBuilder, RuntimeConfig};
pub use types::{Binding, BuildError, ContextId, EventTypes, EventTypesBuilder, TypeTag};
