//! Events: the values that are raised, matched and handled.
//!
//! An [`Event`] carries a [`TypeTag`] for matching, a message, the identity
//! of the context that raised it (a weak [`ContextRef`] plus a name
//! snapshot, since the source may terminate before anyone inspects the
//! event), the [`RaiseKind`] it was raised with, and an optional payload.
//!
//! # Lifecycle
//!
//! - Before the first raise the message, payload and binding may be changed.
//! - Raising commits kind and source; both are immutable from then on.
//! - Asynchronous raises transfer a [`duplicate`](Event::duplicate), never
//!   the original, so the sender keeps its value.
//!
//! Terminate propagation uses [`Raised`], which owns the event while it
//! travels outward through `?`.

use core::any::Any;
use core::fmt;

use crate::error::{Error, ErrorKind};
use crate::runtime::ContextRef;
use crate::types::{Binding, ContextId, EventTypes, TypeTag};

/// Source name reported when the raising context is unknown.
pub const UNKNOWN_SOURCE: &str = "*unknown*";

/// How an event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaiseKind {
    /// Abandon the faulting operation; continue after the matching block.
    Terminate,
    /// Run the handler and return to the raise site.
    Resume,
}

impl fmt::Display for RaiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("terminate"),
            Self::Resume => f.write_str("resume"),
        }
    }
}

/// Result of a resume-kind raise that did not turn into a terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "an unhandled resumption usually calls for a default action"]
pub enum ResumeOutcome {
    /// A handler matched and ran to completion.
    Handled,
    /// No active handler matched; the raise site decides what to do.
    Unhandled,
}

impl ResumeOutcome {
    /// True if a handler ran.
    #[must_use]
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Payloads that can follow an event across contexts.
trait DupPayload: Any + Send {
    fn dup(&self) -> Box<dyn DupPayload>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send> DupPayload for T {
    fn dup(&self) -> Box<dyn DupPayload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

enum Payload {
    Empty,
    Duplicable(Box<dyn DupPayload>),
    Opaque(Box<dyn Any + Send>),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Duplicable(_) => f.write_str("Duplicable(..)"),
            Self::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// A raised (or raisable) condition.
#[derive(Debug)]
pub struct Event {
    tag: TypeTag,
    message: String,
    source: Option<ContextRef>,
    source_name: Option<String>,
    raise_kind: Option<RaiseKind>,
    original_thrower: Option<Binding>,
    payload: Payload,
}

impl Event {
    /// Creates an unraised event of type `tag`.
    #[must_use]
    pub fn new(tag: TypeTag, message: impl Into<String>) -> Self {
        Self {
            tag,
            message: message.into(),
            source: None,
            source_name: None,
            raise_kind: None,
            original_thrower: None,
            payload: Payload::Empty,
        }
    }

    /// Attaches a payload that is cloned when the event is duplicated.
    #[must_use]
    pub fn with_payload<T: Any + Clone + Send>(mut self, payload: T) -> Self {
        self.payload = Payload::Duplicable(Box::new(payload));
        self
    }

    /// Attaches a payload that cannot be duplicated.
    ///
    /// Such an event can only be raised synchronously; an asynchronous raise
    /// is a programming error and is treated as fatal.
    #[must_use]
    pub fn with_opaque_payload<T: Any + Send>(mut self, payload: T) -> Self {
        self.payload = Payload::Opaque(Box::new(payload));
        self
    }

    /// Scopes the event to one object so that bound handlers can match it.
    #[must_use]
    pub fn with_thrower(mut self, binding: Binding) -> Self {
        self.original_thrower = Some(binding);
        self
    }

    /// The event's runtime type tag.
    #[must_use]
    pub const fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The message describing the condition.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rewrites the message; only allowed before the first raise.
    pub fn set_message(&mut self, message: impl Into<String>) -> Result<(), Error> {
        if self.is_raised() {
            return Err(Error::new(ErrorKind::EventAlreadyRaised)
                .with_message("message is immutable once the event is raised"));
        }
        self.message = message.into();
        Ok(())
    }

    /// Weak reference to the raising context.
    #[must_use]
    pub fn source(&self) -> Option<&ContextRef> {
        self.source.as_ref()
    }

    /// Identity of the raising context.
    #[must_use]
    pub fn source_id(&self) -> Option<ContextId> {
        self.source.as_ref().map(ContextRef::id)
    }

    /// Name of the raising context as it was at raise time.
    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or(UNKNOWN_SOURCE)
    }

    /// Kind of the first raise, `None` while unraised.
    #[must_use]
    pub const fn raise_kind(&self) -> Option<RaiseKind> {
        self.raise_kind
    }

    /// True once the event has been raised.
    #[must_use]
    pub const fn is_raised(&self) -> bool {
        self.raise_kind.is_some()
    }

    /// The object this event is bound to, if any.
    #[must_use]
    pub const fn original_thrower(&self) -> Option<Binding> {
        self.original_thrower
    }

    /// Sets the object this event is bound to.
    pub fn set_original_thrower(&mut self, binding: Binding) -> &mut Self {
        self.original_thrower = Some(binding);
        self
    }

    /// Borrows the payload as `T`.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        match &self.payload {
            Payload::Empty => None,
            Payload::Duplicable(p) => p.as_any().downcast_ref(),
            Payload::Opaque(p) => p.downcast_ref(),
        }
    }

    /// Mutably borrows the payload as `T`.
    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        match &mut self.payload {
            Payload::Empty => None,
            Payload::Duplicable(p) => p.as_any_mut().downcast_mut(),
            Payload::Opaque(p) => p.downcast_mut(),
        }
    }

    /// True if [`duplicate`](Self::duplicate) can succeed.
    #[must_use]
    pub const fn is_duplicable(&self) -> bool {
        !matches!(self.payload, Payload::Opaque(_))
    }

    /// Deep copy for cross-context transfer.
    ///
    /// Every field is copied, including kind and source.
    pub fn duplicate(&self) -> Result<Self, Error> {
        let payload = match &self.payload {
            Payload::Empty => Payload::Empty,
            Payload::Duplicable(p) => Payload::Duplicable(p.dup()),
            Payload::Opaque(_) => {
                return Err(Error::new(ErrorKind::DuplicationUnsupported).with_message(format!(
                    "event {:?} carries a payload without duplication support",
                    self.tag
                )))
            }
        };
        Ok(Self {
            tag: self.tag,
            message: self.message.clone(),
            source: self.source.clone(),
            source_name: self.source_name.clone(),
            raise_kind: self.raise_kind,
            original_thrower: self.original_thrower,
            payload,
        })
    }

    /// Propagates this event outward as a terminate from inside a handler.
    ///
    /// The recorded kind and source are kept.
    #[must_use]
    pub fn reraise(self) -> Raised {
        Raised::new(self)
    }

    /// Plain snapshot for introspection and diagnostics.
    #[must_use]
    pub fn info(&self, types: &EventTypes) -> EventInfo {
        EventInfo {
            tag: self.tag,
            type_name: types.name(self.tag).to_owned(),
            message: self.message.clone(),
            source: self.source_id(),
            source_name: self.source_name().to_owned(),
            kind: self.raise_kind,
        }
    }

    /// Records kind and source on the first raise; later raises keep them.
    pub(crate) fn commit(
        &mut self,
        kind: RaiseKind,
        source: &ContextRef,
        max_message_len: usize,
        max_name_len: usize,
    ) {
        if self.is_raised() {
            return;
        }
        self.stamp(kind, source, max_message_len, max_name_len);
    }

    /// Unconditionally records a fresh raise (asynchronous copies).
    pub(crate) fn stamp(
        &mut self,
        kind: RaiseKind,
        source: &ContextRef,
        max_message_len: usize,
        max_name_len: usize,
    ) {
        truncate_on_char_boundary(&mut self.message, max_message_len);
        let mut name = source.name().to_owned();
        truncate_on_char_boundary(&mut name, max_name_len);
        self.raise_kind = Some(kind);
        self.source = Some(source.clone());
        self.source_name = Some(name);
    }

    /// Changes only the kind; used when re-sending an already-raised event.
    pub(crate) fn set_kind(&mut self, kind: RaiseKind) {
        self.raise_kind = Some(kind);
    }
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

/// A terminate-kind event propagating outward.
///
/// Returned as the error half of every protected body, handler and poll, so
/// `?` carries it to the nearest enclosing [`Try`](crate::cx::Try) whose
/// termination handlers match. If it escapes a context's entry point the
/// event is uncaught, which is fatal.
#[must_use = "a raised event must be propagated or handled"]
pub struct Raised {
    event: Box<Event>,
}

impl Raised {
    /// Wraps an event for propagation.
    pub fn new(event: Event) -> Self {
        Self {
            event: Box::new(event),
        }
    }

    /// The propagating event.
    #[must_use]
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Mutable access to the propagating event.
    pub fn event_mut(&mut self) -> &mut Event {
        &mut self.event
    }

    /// The propagating event's type tag.
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        self.event.tag
    }

    /// Takes the event out of the carrier.
    #[must_use]
    pub fn into_event(self) -> Event {
        *self.event
    }
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raised")
            .field("tag", &self.event.tag)
            .field("message", &self.event.message)
            .field("source", &self.event.source_name())
            .finish()
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} raised by \"{}\": {}",
            self.event.tag,
            self.event.source_name(),
            self.event.message
        )
    }
}

impl std::error::Error for Raised {}

/// Snapshot of an event, detached from the event itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInfo {
    /// Runtime type tag.
    pub tag: TypeTag,
    /// Registered name of the type.
    pub type_name: String,
    /// The event's message.
    pub message: String,
    /// Identity of the raising context.
    pub source: Option<ContextId>,
    /// Name of the raising context at raise time.
    pub source_name: String,
    /// Kind of the first raise.
    pub kind: Option<RaiseKind>,
}

impl fmt::Display for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} raised by \"{}\" (", self.type_name, self.source_name)?;
        match self.source {
            Some(id) => write!(f, "{id:?}")?,
            None => f.write_str(UNKNOWN_SOURCE)?,
        }
        write!(f, "): {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arith_types;

    #[derive(Debug, Clone, PartialEq)]
    struct Amount(u64);

    struct Handle;

    #[test]
    fn unraised_event_defaults() {
        let (_, tags) = arith_types();
        let ev = Event::new(tags.overflow, "too big");
        assert_eq!(ev.tag(), tags.overflow);
        assert_eq!(ev.message(), "too big");
        assert_eq!(ev.source_name(), UNKNOWN_SOURCE);
        assert!(ev.source().is_none());
        assert!(!ev.is_raised());
        assert!(ev.original_thrower().is_none());
    }

    #[test]
    fn message_is_mutable_until_raised() {
        let (_, tags) = arith_types();
        let mut ev = Event::new(tags.overflow, "draft");
        ev.set_message("final").unwrap();
        assert_eq!(ev.message(), "final");

        ev.set_kind(RaiseKind::Resume);
        let err = ev.set_message("late").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EventAlreadyRaised);
        assert_eq!(ev.message(), "final");
    }

    #[test]
    fn duplicate_copies_payload() {
        let (_, tags) = arith_types();
        let ev = Event::new(tags.overflow, "amount").with_payload(Amount(7));
        let mut copy = ev.duplicate().unwrap();
        assert_eq!(copy.payload::<Amount>(), Some(&Amount(7)));
        copy.payload_mut::<Amount>().unwrap().0 = 9;
        assert_eq!(ev.payload::<Amount>(), Some(&Amount(7)));
        assert_eq!(copy.payload::<Amount>(), Some(&Amount(9)));
        assert!(copy.payload::<String>().is_none());
    }

    #[test]
    fn opaque_payload_refuses_duplication() {
        let (_, tags) = arith_types();
        let ev = Event::new(tags.io, "socket").with_opaque_payload(Handle);
        assert!(!ev.is_duplicable());
        assert!(ev.payload::<Handle>().is_some());
        let err = ev.duplicate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicationUnsupported);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut text = String::from("héllo");
        truncate_on_char_boundary(&mut text, 2);
        assert_eq!(text, "h");
        let mut short = String::from("ok");
        truncate_on_char_boundary(&mut short, 10);
        assert_eq!(short, "ok");
    }

    #[test]
    fn info_uses_registered_names() {
        let (types, tags) = arith_types();
        let ev = Event::new(tags.underflow, "below zero");
        let info = ev.info(&types);
        assert_eq!(info.type_name, "Underflow");
        assert_eq!(info.source_name, UNKNOWN_SOURCE);
        assert_eq!(
            info.to_string(),
            "Underflow raised by \"*unknown*\" (*unknown*): below zero"
        );
    }

    #[test]
    fn raised_round_trips_event() {
        let (_, tags) = arith_types();
        let raised = Event::new(tags.overflow, "boom").reraise();
        assert_eq!(raised.tag(), tags.overflow);
        assert_eq!(raised.into_event().message(), "boom");
    }
}
