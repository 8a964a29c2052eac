//! Protected blocks.
//!
//! [`Try`] collects the handlers of one protected block and runs a body
//! under them:
//!
//! ```ignore
//! let total = Try::new()
//!     .catch_resume(tags.overflow, |_cx, ev| {
//!         ev.set_original_thrower(Binding::unique());
//!         Ok(())
//!     })
//!     .catch(tags.arithmetic, |_cx, ev| Ok(fallback(ev.message())))
//!     .finally(|| release_lock())
//!     .run(cx, |cx| compute(cx))?;
//! ```
//!
//! While the body runs, the block's resumption entries are the innermost
//! ones searched by a resume raise. When the body returns `Err(Raised)`,
//! the block's resumption table is deactivated first, then its termination
//! entries are consulted in order; an unmatched event continues outward as
//! the block's own `Err`. Finally clauses run last, on every exit path,
//! including a panic unwinding through the block.

use crate::cx::Cx;
use crate::event::{Event, RaiseKind, Raised};
use crate::handler::{HandlerEntry, HandlerTable, ResumeFrame, ResumeHandler, ResumeTable};
use crate::tracing_compat::trace;
use crate::types::{Binding, TypeTag};

/// Callback of a termination entry; consumes the event.
pub type TerminateHandler<'h, T> = Box<dyn FnOnce(&Cx<'_>, Event) -> Result<T, Raised> + 'h>;

type FinallyClause<'h> = Box<dyn FnOnce() + 'h>;

/// Runs finally clauses in declaration order when dropped.
struct Finally<'h>(Vec<FinallyClause<'h>>);

impl Drop for Finally<'_> {
    fn drop(&mut self) {
        for clause in self.0.drain(..) {
            clause();
        }
    }
}

/// Builder for one protected block producing a `T`.
#[must_use = "a protected block does nothing until `run` is called"]
pub struct Try<'h, T> {
    resume: ResumeTable<'h>,
    terminate: HandlerTable<TerminateHandler<'h, T>>,
    finally: Vec<FinallyClause<'h>>,
}

impl<T> Default for Try<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h, T> Try<'h, T> {
    /// A block with no handlers.
    pub fn new() -> Self {
        Self {
            resume: HandlerTable::new(),
            terminate: HandlerTable::new(),
            finally: Vec::new(),
        }
    }

    fn resume_entry(mut self, entry: HandlerEntry<ResumeHandler<'h>>) -> Self {
        self.resume.push(entry);
        self
    }

    fn terminate_entry(mut self, entry: HandlerEntry<TerminateHandler<'h, T>>) -> Self {
        self.terminate.push(entry);
        self
    }

    /// Resumption handler for `tag` and its subtypes.
    pub fn catch_resume<F>(self, tag: TypeTag, handler: F) -> Self
    where
        F: Fn(&Cx<'_>, &mut Event) -> Result<(), Raised> + 'h,
    {
        self.resume_entry(HandlerEntry::new(tag, Box::new(handler)))
    }

    /// Resumption handler for `tag` raised by the object `binding` names.
    pub fn catch_resume_bound<F>(self, tag: TypeTag, binding: Binding, handler: F) -> Self
    where
        F: Fn(&Cx<'_>, &mut Event) -> Result<(), Raised> + 'h,
    {
        self.resume_entry(HandlerEntry::bound(tag, binding, Box::new(handler)))
    }

    /// Resumption handler for any event, tried after the specific ones.
    pub fn catch_resume_any<F>(self, handler: F) -> Self
    where
        F: Fn(&Cx<'_>, &mut Event) -> Result<(), Raised> + 'h,
    {
        self.resume_entry(HandlerEntry::catch_all(Box::new(handler)))
    }

    /// Termination handler for `tag` and its subtypes.
    ///
    /// Its result becomes the block's result.
    pub fn catch<F>(self, tag: TypeTag, handler: F) -> Self
    where
        F: FnOnce(&Cx<'_>, Event) -> Result<T, Raised> + 'h,
    {
        self.terminate_entry(HandlerEntry::new(tag, Box::new(handler)))
    }

    /// Termination handler for `tag` raised by the object `binding` names.
    pub fn catch_bound<F>(self, tag: TypeTag, binding: Binding, handler: F) -> Self
    where
        F: FnOnce(&Cx<'_>, Event) -> Result<T, Raised> + 'h,
    {
        self.terminate_entry(HandlerEntry::bound(tag, binding, Box::new(handler)))
    }

    /// Termination handler for any event, tried after the specific ones.
    pub fn catch_any<F>(self, handler: F) -> Self
    where
        F: FnOnce(&Cx<'_>, Event) -> Result<T, Raised> + 'h,
    {
        self.terminate_entry(HandlerEntry::catch_all(Box::new(handler)))
    }

    /// Clause run on every exit from the block, after any handler.
    pub fn finally<F>(mut self, clause: F) -> Self
    where
        F: FnOnce() + 'h,
    {
        self.finally.push(Box::new(clause));
        self
    }

    /// Runs `body` under this block's handlers.
    pub fn run<B>(self, cx: &Cx<'_>, body: B) -> Result<T, Raised>
    where
        B: FnOnce(&Cx<'_>) -> Result<T, Raised>,
    {
        let Self {
            resume,
            terminate,
            finally,
        } = self;
        let _finally = Finally(finally);

        let outcome = {
            let activation = cx.core.activate();
            let frame;
            let inner = if resume.is_empty() {
                *cx
            } else {
                frame = ResumeFrame::new(activation.id(), &resume, cx.top);
                Cx {
                    core: cx.core,
                    top: Some(&frame),
                }
            };
            body(&inner)
        };

        let raised = match outcome {
            Ok(value) => return Ok(value),
            Err(raised) => raised,
        };
        let types = cx.types();
        let selected = terminate
            .select(types, raised.tag(), raised.event().original_thrower())
            .and_then(|index| terminate.take(index));
        let Some(entry) = selected else {
            trace!(
                context = %cx.id(),
                event = %types.name(raised.tag()),
                "terminate passes through block"
            );
            return Err(raised);
        };
        trace!(
            context = %cx.id(),
            event = %types.name(raised.tag()),
            "terminate handled"
        );
        let event = raised.into_event();
        let _handling = cx.core.enter_handling(RaiseKind::Terminate, &event);
        (entry.into_callback())(cx, event)
    }
}
