//! The per-context handle and the delivery engine.
//!
//! `Cx` is the token through which a context raises, polls and inspects
//! events. Every context runs on its own thread with its own [`ContextCore`];
//! the `Cx` values handed around on that thread are cheap copies that differ
//! only in where a resumption search starts.
//!
//! # Raising
//!
//! | Operation | Kind | Returns to raise site |
//! |-----------|------|-----------------------|
//! | [`Cx::throw`] | terminate | never (`Err` travels outward with `?`) |
//! | [`Cx::resume`] | resume | yes, with a [`ResumeOutcome`] |
//! | [`Cx::raise_async`] | either | yes, with a [`Ticket`] |
//!
//! # Thread Safety
//!
//! `Cx` is neither `Send` nor `Sync`: the handler stacks it reads belong to
//! the context's own thread. Other contexts reach this one only through its
//! mailbox, addressed by a [`ContextRef`].

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::error::{Error, ErrorContext, ErrorKind};
use crate::event::{Event, EventInfo, RaiseKind, Raised, ResumeOutcome};
use crate::handler::resumption::{self, ResumeFrame};
use crate::handler::{FilterEntry, TableId};
use crate::hooks::{self, FatalReason, FatalReport};
use crate::mailbox::{Mailbox, Ticket};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::{ContextRef, ContextShared, RuntimeInner};
use crate::tracing_compat::{debug, error, trace};
use crate::types::{ContextId, EventTypes, TypeTag};

/// An event being handled. Tag, message, kind and source are frozen once
/// raised, so the snapshot stays accurate for the handler's whole extent.
struct Handling {
    kind: RaiseKind,
    info: EventInfo,
}

/// Thread-local state of one running context.
pub(crate) struct ContextCore {
    runtime: Arc<RuntimeInner>,
    shared: Arc<ContextShared>,
    this: ContextRef,
    handling: RefCell<Vec<Handling>>,
    active: RefCell<Vec<TableId>>,
    next_table: Cell<u64>,
    activations: Cell<u64>,
    deactivations: Cell<u64>,
}

impl ContextCore {
    pub(crate) fn new(runtime: Arc<RuntimeInner>, shared: Arc<ContextShared>) -> Self {
        let this = ContextRef::new(&runtime, &shared);
        Self {
            runtime,
            shared,
            this,
            handling: RefCell::new(Vec::new()),
            active: RefCell::new(Vec::new()),
            next_table: Cell::new(0),
            activations: Cell::new(0),
            deactivations: Cell::new(0),
        }
    }

    fn config(&self) -> &RuntimeConfig {
        &self.runtime.config
    }

    fn mailbox(&self) -> &Mailbox {
        self.shared.mailbox()
    }

    pub(crate) fn activate(&self) -> Activation<'_> {
        let id = TableId::new(self.next_table.get());
        self.next_table.set(id.as_u64() + 1);
        self.active.borrow_mut().push(id);
        self.activations.set(self.activations.get() + 1);
        trace!(context = %self.shared.id(), table = id.as_u64(), "handler table activated");
        Activation { core: self, id }
    }

    fn deactivate(&self, id: TableId) {
        let top = self.active.borrow_mut().pop();
        self.deactivations.set(self.deactivations.get() + 1);
        if top == Some(id) {
            trace!(context = %self.shared.id(), table = id.as_u64(), "handler table deactivated");
        } else {
            let err = Error::new(ErrorKind::ScopeViolation).with_message(format!(
                "deactivated {id:?} while {top:?} was the innermost table"
            ));
            error!(context = %self.shared.id(), %err, "handler tables released out of order");
            debug_assert!(top == Some(id), "{err}");
        }
    }

    pub(crate) fn enter_handling(&self, kind: RaiseKind, event: &Event) -> HandlingGuard<'_> {
        self.handling.borrow_mut().push(Handling {
            kind,
            info: event.info(&self.runtime.types),
        });
        HandlingGuard { core: self }
    }

    /// Reports a fatal event and aborts unless the runtime says otherwise.
    pub(crate) fn fatal(&self, reason: FatalReason, event: EventInfo) -> Error {
        let report = FatalReport {
            reason,
            context: self.shared.id(),
            context_name: self.shared.name().to_owned(),
            event,
        };
        hooks::report_fatal(&report);
        if self.config().abort_on_uncaught {
            std::process::abort();
        }
        let kind = match reason {
            FatalReason::Uncaught => ErrorKind::Uncaught,
            FatalReason::DuplicationUnsupported => ErrorKind::DuplicationUnsupported,
        };
        Error::new(kind)
            .with_message(report.to_string())
            .with_context(ErrorContext {
                context_id: Some(self.shared.id()),
                destination: None,
            })
    }

    /// Escalates a terminate that left the context's entry point.
    pub(crate) fn uncaught(&self, raised: &Raised) -> Error {
        self.fatal(
            FatalReason::Uncaught,
            raised.event().info(&self.runtime.types),
        )
    }
}

/// Scope of one handler-table activation.
pub(crate) struct Activation<'c> {
    core: &'c ContextCore,
    id: TableId,
}

impl Activation<'_> {
    pub(crate) const fn id(&self) -> TableId {
        self.id
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        self.core.deactivate(self.id);
    }
}

pub(crate) struct HandlingGuard<'c> {
    core: &'c ContextCore,
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.core.handling.borrow_mut().pop();
    }
}

struct FilterGuard<'c> {
    core: &'c ContextCore,
    depth: usize,
}

impl Drop for FilterGuard<'_> {
    fn drop(&mut self) {
        let result = self.core.mailbox().pop_filter(self.depth);
        if let Err(err) = &result {
            error!(context = %self.core.shared.id(), %err, "filter released out of order");
        }
        debug_assert!(result.is_ok(), "filter stack released out of order");
    }
}

/// Handle to the running context.
///
/// Handlers receive their own `Cx` whose resumption search starts below
/// the table the handler belongs to.
#[derive(Clone, Copy)]
pub struct Cx<'a> {
    pub(crate) core: &'a ContextCore,
    pub(crate) top: Option<&'a ResumeFrame<'a>>,
}

impl<'a> Cx<'a> {
    pub(crate) const fn root(core: &'a ContextCore) -> Self {
        Self { core, top: None }
    }

    /// Identity of this context.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.core.shared.id()
    }

    /// Name of this context.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core.shared.name()
    }

    /// A weak reference other contexts can send events to.
    #[must_use]
    pub fn context_ref(&self) -> ContextRef {
        self.core.this.clone()
    }

    /// The runtime's event type hierarchy.
    #[must_use]
    pub fn types(&self) -> &'a EventTypes {
        &self.core.runtime.types
    }

    /// The runtime's configuration.
    #[must_use]
    pub fn config(&self) -> &'a RuntimeConfig {
        self.core.config()
    }

    fn commit(&self, event: &mut Event, kind: RaiseKind) {
        let config = self.core.config();
        event.commit(
            kind,
            &self.core.this,
            config.max_message_len,
            config.max_name_len,
        );
    }

    // =====================================================================
    // Synchronous raises
    // =====================================================================

    /// Raises `event` with terminate semantics.
    ///
    /// The returned [`Raised`] is meant to be returned with `?` or `Err`;
    /// the nearest enclosing [`Try`](super::Try) whose termination entries
    /// match will handle it. Code after the raise never runs.
    ///
    /// ```ignore
    /// if balance < amount {
    ///     return Err(cx.throw(Event::new(tags.overdraft, "insufficient funds")));
    /// }
    /// ```
    pub fn throw(&self, mut event: Event) -> Raised {
        self.commit(&mut event, RaiseKind::Terminate);
        trace!(
            context = %self.id(),
            event = %self.types().name(event.tag()),
            "terminate raised"
        );
        Raised::new(event)
    }

    /// Raises `event` with resume semantics.
    ///
    /// The innermost matching resumption handler runs on top of the current
    /// stack and control returns here. `Ok(Unhandled)` means no handler
    /// matched; the caller picks a default action. `Err` means a handler
    /// turned the resume into a terminate.
    pub fn resume(&self, event: &mut Event) -> Result<ResumeOutcome, Raised> {
        self.commit(event, RaiseKind::Resume);
        trace!(
            context = %self.id(),
            event = %self.types().name(event.tag()),
            "resume raised"
        );
        self.deliver_resume(event)
    }

    /// Re-delivers an already-raised event with resume semantics.
    ///
    /// Inside a resumption handler the search starts strictly below the
    /// handler's own table, so the handler is never re-entered.
    pub fn reresume(&self, event: &mut Event) -> Result<ResumeOutcome, Raised> {
        if !event.is_raised() {
            self.commit(event, RaiseKind::Resume);
        }
        self.deliver_resume(event)
    }

    /// Re-raises `event` with the kind it was first raised with.
    ///
    /// A terminate-kind event comes back as `Err`; a resume-kind event is
    /// delivered as by [`reresume`](Self::reresume). An event never raised
    /// before is thrown.
    pub fn reraise(&self, mut event: Event) -> Result<ResumeOutcome, Raised> {
        match event.raise_kind() {
            Some(RaiseKind::Resume) => self.deliver_resume(&mut event),
            Some(RaiseKind::Terminate) => Err(event.reraise()),
            None => Err(self.throw(event)),
        }
    }

    fn deliver_resume(&self, event: &mut Event) -> Result<ResumeOutcome, Raised> {
        let types = self.types();
        let Some(found) =
            resumption::search(self.top, types, event.tag(), event.original_thrower())
        else {
            trace!(context = %self.id(), event = %types.name(event.tag()), "resume unhandled");
            return Ok(ResumeOutcome::Unhandled);
        };
        trace!(
            context = %self.id(),
            table = found.frame.id().as_u64(),
            entry = found.index,
            "resume handler selected"
        );
        let inner = Cx {
            core: self.core,
            top: found.frame.next(),
        };
        let _handling = self.core.enter_handling(RaiseKind::Resume, event);
        (found.handler)(&inner, event)?;
        Ok(ResumeOutcome::Handled)
    }

    // =====================================================================
    // Asynchronous raises
    // =====================================================================

    /// Sends a copy of `event` to `destination` with the given kind.
    ///
    /// The copy records this context as its source. The destination handles
    /// it at its next poll as if it had raised it itself.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::DestinationTerminated`] if the destination is gone
    /// - [`ErrorKind::EventDisabled`] if the destination disables the type
    /// - [`ErrorKind::MailboxFull`] if the destination's mailbox is bounded and full
    /// - [`ErrorKind::UnknownEventType`] if the tag is not in the runtime's hierarchy
    ///
    /// An event whose payload cannot be duplicated is a programming error:
    /// it is reported as fatal and the process aborts unless the runtime
    /// was built with `abort_on_uncaught(false)`, in which case
    /// [`ErrorKind::DuplicationUnsupported`] is returned.
    pub fn raise_async(
        &self,
        event: &Event,
        destination: &ContextRef,
        kind: RaiseKind,
    ) -> Result<Ticket, Error> {
        let Ok(mut copy) = event.duplicate() else {
            return Err(self
                .core
                .fatal(FatalReason::DuplicationUnsupported, event.info(self.types())));
        };
        let config = self.core.config();
        copy.stamp(
            kind,
            &self.core.this,
            config.max_message_len,
            config.max_name_len,
        );
        self.send(copy, destination, kind)
    }

    /// Asynchronous terminate raise.
    pub fn throw_at(&self, event: &Event, destination: &ContextRef) -> Result<Ticket, Error> {
        self.raise_async(event, destination, RaiseKind::Terminate)
    }

    /// Asynchronous resume raise.
    pub fn resume_at(&self, event: &Event, destination: &ContextRef) -> Result<Ticket, Error> {
        self.raise_async(event, destination, RaiseKind::Resume)
    }

    /// Re-sends `event`, the event currently being handled, to `destination`.
    ///
    /// The handler passes the event it was given, so edits made to it after
    /// the raise travel with the copy. The original source is kept; only the
    /// kind changes. The copy is taken here, at send time.
    ///
    /// ```ignore
    /// .catch_resume(tags.overflow, |cx, ev| {
    ///     if let Err(err) = cx.reraise_async(ev, &supervisor, RaiseKind::Resume) {
    ///         tracing::warn!(%err, "supervisor refused the forward");
    ///     }
    ///     Ok(())
    /// })
    /// ```
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NoCurrentEvent`] outside a handler or for an event that
    /// was never raised, plus the delivery failures of
    /// [`raise_async`](Self::raise_async).
    pub fn reraise_async(
        &self,
        event: &Event,
        destination: &ContextRef,
        kind: RaiseKind,
    ) -> Result<Ticket, Error> {
        if self.core.handling.borrow().is_empty() {
            return Err(Error::new(ErrorKind::NoCurrentEvent)
                .with_message("reraise_async called outside a handler"));
        }
        if !event.is_raised() {
            return Err(Error::new(ErrorKind::NoCurrentEvent)
                .with_message("reraise_async needs an event that has been raised"));
        }
        let Ok(mut copy) = event.duplicate() else {
            return Err(self
                .core
                .fatal(FatalReason::DuplicationUnsupported, event.info(self.types())));
        };
        copy.set_kind(kind);
        self.send(copy, destination, kind)
    }

    fn send(&self, event: Event, destination: &ContextRef, kind: RaiseKind) -> Result<Ticket, Error> {
        let failure = ErrorContext {
            context_id: Some(self.id()),
            destination: Some(destination.id()),
        };
        let Some(target) = destination.resolve() else {
            debug!(context = %self.id(), destination = %destination.id(), "send to terminated context");
            return Err(Error::destination_terminated(destination.id()).with_context(failure));
        };
        if !target.types().contains(event.tag()) {
            return Err(Error::new(ErrorKind::UnknownEventType)
                .with_message(format!("tag {:?} is not a registered event type", event.tag()))
                .with_context(failure));
        }
        let seq = target
            .mailbox()
            .enqueue(target.types(), event, kind)
            .map_err(|err| {
                debug!(context = %self.id(), destination = %destination.id(), %err, "send refused");
                err.with_context(failure)
            })?;
        Ok(Ticket::new(destination.clone(), seq, Arc::downgrade(&target)))
    }

    /// Withdraws an asynchronous raise if delivery has not begun.
    pub fn withdraw(&self, ticket: &Ticket) -> bool {
        ticket.withdraw()
    }

    // =====================================================================
    // Polling
    // =====================================================================

    /// True if a deliverable event is waiting in this context's mailbox.
    #[must_use]
    pub fn poll_check(&self) -> bool {
        self.core.mailbox().has_deliverable(self.types())
    }

    /// Number of events waiting, deliverable or not.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.core.mailbox().pending()
    }

    /// Delivers waiting events in arrival order.
    ///
    /// Resume-kind events are delivered as if raised here; unhandled ones
    /// are reported to the unhandled-resume hook and skipped. The first
    /// terminate-kind event stops the drain and is returned as `Err`, so
    /// `cx.poll()?` propagates it like a local raise.
    ///
    /// Returns the number of events delivered.
    pub fn poll(&self) -> Result<usize, Raised> {
        let types = self.types();
        let mut delivered = 0;
        while let Some(envelope) = self.core.mailbox().dequeue_next(types) {
            delivered += 1;
            let mut event = envelope.event;
            trace!(
                context = %self.id(),
                seq = envelope.seq,
                kind = %envelope.kind,
                event = %types.name(event.tag()),
                "delivering mailbox event"
            );
            match envelope.kind {
                RaiseKind::Terminate => return Err(Raised::new(event)),
                RaiseKind::Resume => {
                    if self.deliver_resume(&mut event)? == ResumeOutcome::Unhandled {
                        hooks::report_unhandled_resume(&event.info(types));
                    }
                }
            }
        }
        Ok(delivered)
    }

    /// Blocks until a deliverable event arrives, then polls.
    ///
    /// Returns `Ok(0)` immediately if the mailbox has been closed.
    pub fn wait_for_event(&self) -> Result<usize, Raised> {
        self.core.mailbox().wait_deliverable(self.types());
        self.poll()
    }

    // =====================================================================
    // Enable / disable
    // =====================================================================

    fn filtered<F, R>(&self, entry: FilterEntry, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let depth = self.core.mailbox().push_filter(entry);
        let _guard = FilterGuard {
            core: self.core,
            depth,
        };
        f()
    }

    /// Runs `f` with asynchronous delivery of `types` (and subtypes) enabled.
    ///
    /// An empty slice enables every type.
    pub fn enable<F, R>(&self, types: &[TypeTag], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.filtered(FilterEntry::enable(types), f)
    }

    /// Runs `f` with asynchronous delivery of `types` (and subtypes) disabled.
    ///
    /// Sends of these types fail with [`ErrorKind::EventDisabled`] while
    /// `f` runs, and entries already queued wait until they are enabled.
    /// An empty slice disables every type.
    pub fn disable<F, R>(&self, types: &[TypeTag], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.filtered(FilterEntry::disable(types), f)
    }

    /// Runs `f` with every type enabled.
    pub fn enable_all<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.enable(&[], f)
    }

    /// Runs `f` with every type disabled.
    pub fn disable_all<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.disable(&[], f)
    }

    /// Whether an asynchronous event of type `tag` would be accepted now.
    #[must_use]
    pub fn is_deliverable(&self, tag: TypeTag) -> bool {
        self.core.mailbox().deliverable(self.types(), tag)
    }

    // =====================================================================
    // Introspection
    // =====================================================================

    fn current(&self, kind: RaiseKind) -> Option<EventInfo> {
        self.core
            .handling
            .borrow()
            .iter()
            .rev()
            .find(|h| h.kind == kind)
            .map(|h| h.info.clone())
    }

    /// The terminate-kind event whose handler is running, if any.
    #[must_use]
    pub fn current_exception(&self) -> Option<EventInfo> {
        self.current(RaiseKind::Terminate)
    }

    /// The resume-kind event whose handler is running, if any.
    #[must_use]
    pub fn current_resumption(&self) -> Option<EventInfo> {
        self.current(RaiseKind::Resume)
    }

    /// Type name of the innermost event of `kind` being handled.
    #[must_use]
    pub fn current_event_name(&self, kind: RaiseKind) -> Option<String> {
        self.current(kind).map(|info| info.type_name)
    }

    /// Match type of the first entry of the innermost resumption table.
    #[must_use]
    pub fn top_resumption_type(&self) -> Option<TypeTag> {
        self.top.and_then(|frame| frame.table.first_match_type())
    }

    /// Number of resumption tables a search from here would examine.
    #[must_use]
    pub fn resumption_depth(&self) -> usize {
        resumption::frames(self.top).count()
    }

    /// Number of active enable/disable regions.
    #[must_use]
    pub fn filter_depth(&self) -> usize {
        self.core.mailbox().filter_depth()
    }

    /// Handler tables activated so far in this context.
    #[must_use]
    pub fn activations(&self) -> u64 {
        self.core.activations.get()
    }

    /// Handler tables deactivated so far in this context.
    #[must_use]
    pub fn deactivations(&self) -> u64 {
        self.core.deactivations.get()
    }
}

impl core::fmt::Debug for Cx<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cx")
            .field("context", &self.id())
            .field("name", &self.name())
            .field("resumption_depth", &self.resumption_depth())
            .finish()
    }
}
