//! Runtime: context registry, spawning and configuration.
//!
//! A [`Runtime`] owns the event type hierarchy, the configuration and the
//! registry of live contexts. Each context runs on its own OS thread (or on
//! the calling thread via [`Runtime::enter`]) and is addressed by other
//! contexts through a weak [`ContextRef`].
//!
//! # Example
//!
//! ```ignore
//! use raisekit::runtime::RuntimeBuilder;
//!
//! let runtime = RuntimeBuilder::new()
//!     .event_types(types)
//!     .mailbox_capacity(64)
//!     .build()?;
//!
//! let worker = runtime.spawn("worker", |cx| {
//!     loop {
//!         if cx.wait_for_event()? == 0 {
//!             return Ok(());
//!         }
//!     }
//! })?;
//! ```
//!
//! ## Config File + Environment Overrides
//!
//! ```ignore
//! // Requires the `config-file` feature.
//! let runtime = RuntimeBuilder::from_toml("config/raisekit.toml")?
//!     .with_env_overrides()?
//!     .build()?;
//! ```
//!
//! # Context Lifecycle
//!
//! 1. The context is registered: it gets a [`ContextId`] and an open mailbox.
//! 2. Its entry closure runs with a root [`Cx`].
//! 3. On exit, normal or not, the mailbox is closed (pending events are
//!    dropped and later sends fail) and the registry slot is freed, so a
//!    stale [`ContextRef`] resolves to nothing.
//! 4. A terminate-kind event returned from the entry closure is uncaught:
//!    it is reported to the terminate hook and the process aborts unless
//!    `abort_on_uncaught` is off.

pub mod builder;
pub mod config;
pub mod env_config;

pub use builder::RuntimeBuilder;
pub use config::RuntimeConfig;

use core::fmt;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cx::{ContextCore, Cx};
use crate::error::{Error, ErrorKind};
use crate::event::Raised;
use crate::mailbox::Mailbox;
use crate::tracing_compat::debug;
use crate::types::{ContextId, EventTypes};
use crate::util::Arena;

/// State shared by all contexts of one runtime.
pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) types: EventTypes,
    registry: Mutex<Arena<Arc<ContextShared>>>,
    unnamed: AtomicUsize,
}

impl RuntimeInner {
    fn register(self: &Arc<Self>, name: String) -> Registration {
        let name: Arc<str> = if name.is_empty() {
            let n = self.unnamed.fetch_add(1, Ordering::Relaxed);
            format!("{}-{n}", self.config.context_name_prefix).into()
        } else {
            name.into()
        };
        let mut registry = self.registry.lock();
        let mut registered = None;
        registry.insert_with(|index| {
            let shared = Arc::new(ContextShared {
                id: ContextId::from_arena(index),
                name,
                types: self.types.clone(),
                mailbox: Mailbox::new(self.config.mailbox_capacity),
            });
            registered = Some(Arc::clone(&shared));
            shared
        });
        drop(registry);
        let shared = registered.unwrap_or_else(|| unreachable!("insert_with always builds"));
        debug!(context = %shared.id, name = %shared.name, "context registered");
        Registration {
            runtime: Arc::clone(self),
            shared,
        }
    }

    fn resolve(&self, id: ContextId) -> Option<Arc<ContextShared>> {
        self.registry.lock().get(id.arena_index()).cloned()
    }
}

/// The cross-thread half of a context: identity and mailbox.
#[derive(Debug)]
pub(crate) struct ContextShared {
    id: ContextId,
    name: Arc<str>,
    types: EventTypes,
    mailbox: Mailbox,
}

impl ContextShared {
    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn types(&self) -> &EventTypes {
        &self.types
    }

    pub(crate) fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

/// Keeps a context registered; closes its mailbox and frees its slot on drop.
struct Registration {
    runtime: Arc<RuntimeInner>,
    shared: Arc<ContextShared>,
}

impl Registration {
    fn run<T, F>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Cx<'_>) -> Result<T, Raised>,
    {
        let core = ContextCore::new(Arc::clone(&self.runtime), Arc::clone(&self.shared));
        let cx = Cx::root(&core);
        f(&cx).map_err(|raised| core.uncaught(&raised))
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let dropped = self.shared.mailbox.close();
        self.runtime
            .registry
            .lock()
            .remove(self.shared.id.arena_index());
        debug!(context = %self.shared.id, dropped, "context exited");
    }
}

/// Weak, cloneable address of a context.
///
/// Holding a `ContextRef` does not keep the context alive. Once the context
/// exits, sends to it fail with
/// [`ErrorKind::DestinationTerminated`](crate::error::ErrorKind::DestinationTerminated),
/// even if its registry slot has been reused by a newer context.
#[derive(Clone)]
pub struct ContextRef {
    id: ContextId,
    name: Arc<str>,
    runtime: Weak<RuntimeInner>,
}

impl ContextRef {
    pub(crate) fn new(runtime: &Arc<RuntimeInner>, shared: &ContextShared) -> Self {
        Self {
            id: shared.id,
            name: Arc::clone(&shared.name),
            runtime: Arc::downgrade(runtime),
        }
    }

    /// Identity of the context.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Name of the context.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the context is running and accepting events.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.resolve().is_some_and(|shared| shared.mailbox.is_open())
    }

    /// Number of events waiting in the context's mailbox; 0 once it exited.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.resolve().map_or(0, |shared| shared.mailbox.pending())
    }

    pub(crate) fn resolve(&self) -> Option<Arc<ContextShared>> {
        self.runtime.upgrade()?.resolve(self.id)
    }
}

impl PartialEq for ContextRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.runtime, &other.runtime)
    }
}

impl Eq for ContextRef {}

impl fmt::Debug for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRef")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Handle to a context running on its own thread.
#[derive(Debug)]
pub struct JoinHandle<T> {
    context: ContextRef,
    thread: std::thread::JoinHandle<Result<T, Error>>,
}

impl<T> JoinHandle<T> {
    /// Address of the spawned context.
    #[must_use]
    pub fn context(&self) -> &ContextRef {
        &self.context
    }

    /// True once the context's thread has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the context to exit and returns its result.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Uncaught`] if a terminate escaped the entry closure
    ///   and the runtime does not abort on uncaught events
    /// - [`ErrorKind::ContextPanicked`] if the entry closure panicked
    pub fn join(self) -> Result<T, Error> {
        let id = self.context.id();
        self.thread.join().map_err(|payload| {
            Error::new(ErrorKind::ContextPanicked)
                .with_message(format!("context {id} panicked: {}", panic_message(&*payload)))
        })?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// An event-handling runtime.
///
/// Cloning is cheap and yields a handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn from_parts(config: RuntimeConfig, types: EventTypes) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                types,
                registry: Mutex::new(Arena::new()),
                unnamed: AtomicUsize::new(0),
            }),
        }
    }

    /// The runtime's configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The event type hierarchy shared by all contexts.
    #[must_use]
    pub fn types(&self) -> &EventTypes {
        &self.inner.types
    }

    /// Number of contexts currently registered.
    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Runs `f` as a new context on a dedicated thread.
    ///
    /// The context is registered before the thread starts, so the returned
    /// handle's [`ContextRef`] accepts events immediately. An empty `name`
    /// is replaced by `<context_name_prefix>-<n>`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::SpawnFailed`] if the thread cannot be started.
    pub fn spawn<T, F>(&self, name: impl Into<String>, f: F) -> Result<JoinHandle<T>, Error>
    where
        F: FnOnce(&Cx<'_>) -> Result<T, Raised> + Send + 'static,
        T: Send + 'static,
    {
        let registration = self.inner.register(name.into());
        let context = ContextRef::new(&self.inner, &registration.shared);
        let thread = std::thread::Builder::new()
            .name(context.name().to_owned())
            .stack_size(self.inner.config.thread_stack_size)
            .spawn(move || registration.run(f))
            .map_err(|e| {
                Error::new(ErrorKind::SpawnFailed)
                    .with_message(format!("cannot start context {}", context.name()))
                    .with_source(e)
            })?;
        Ok(JoinHandle { context, thread })
    }

    /// Runs `f` as a new context on the calling thread.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Uncaught`] if a terminate escapes `f` and the runtime
    /// does not abort on uncaught events.
    pub fn enter<T, F>(&self, name: impl Into<String>, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Cx<'_>) -> Result<T, Raised>,
    {
        self.inner.register(name.into()).run(f)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("event_types", &self.inner.types.len())
            .field("live_contexts", &self.live_contexts())
            .finish()
    }
}
