//! The resumption-handler stack.
//!
//! Each protected block with resumption handlers pushes a [`ResumeFrame`]
//! that lives on the Rust stack for the duration of the block and links to
//! the frame below it. The stack is therefore a chain of borrowed frames, and
//! a search is a walk down that chain from a cursor.
//!
//! When a handler from frame `N` runs, it receives a context whose cursor is
//! `N.next`. Any resume raised from inside the handler (directly, through a
//! nested block the handler opens, or through a mailbox poll) searches the
//! frames the handler pushes itself and then continues strictly below `N`.
//! The frames the outer search already examined, `N` included, are skipped
//! without any shared mutable marker: the cursor lives in the context value
//! handed to the handler and disappears with it.

use core::fmt;

use crate::cx::Cx;
use crate::event::{Event, Raised};
use crate::handler::table::{HandlerTable, TableId};
use crate::types::{Binding, EventTypes, TypeTag};

/// Callback of a resumption entry.
///
/// Runs on top of the raising stack; returning `Ok(())` resumes execution
/// at the raise site. Returning `Err` turns the resume into a terminate that
/// propagates from the raise site.
pub type ResumeHandler<'h> = Box<dyn Fn(&Cx<'_>, &mut Event) -> Result<(), Raised> + 'h>;

/// Resumption entries of one protected block.
pub type ResumeTable<'h> = HandlerTable<ResumeHandler<'h>>;

/// One activated resumption table linked into a context's chain.
pub struct ResumeFrame<'a> {
    pub(crate) id: TableId,
    pub(crate) table: &'a ResumeTable<'a>,
    pub(crate) next: Option<&'a ResumeFrame<'a>>,
}

impl<'a> ResumeFrame<'a> {
    pub(crate) const fn new(
        id: TableId,
        table: &'a ResumeTable<'a>,
        next: Option<&'a ResumeFrame<'a>>,
    ) -> Self {
        Self { id, table, next }
    }

    /// Activation identity of this frame's table.
    #[must_use]
    pub const fn id(&self) -> TableId {
        self.id
    }

    /// The frame below this one.
    #[must_use]
    pub const fn next(&self) -> Option<&'a ResumeFrame<'a>> {
        self.next
    }
}

impl fmt::Debug for ResumeFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeFrame")
            .field("id", &self.id)
            .field("entries", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// Where a search found its handler.
pub(crate) struct Found<'a> {
    pub(crate) frame: &'a ResumeFrame<'a>,
    pub(crate) index: usize,
    pub(crate) handler: &'a ResumeHandler<'a>,
}

/// Walks the chain from `cursor` downward, returning the first match.
///
/// Frames are visited innermost first; within a frame the table's own
/// ordering applies. `None` means the event is unhandled.
pub(crate) fn search<'a>(
    cursor: Option<&'a ResumeFrame<'a>>,
    types: &EventTypes,
    tag: TypeTag,
    thrower: Option<Binding>,
) -> Option<Found<'a>> {
    let mut cursor = cursor;
    while let Some(frame) = cursor {
        let table: &'a ResumeTable<'a> = frame.table;
        if let Some(index) = table.select(types, tag, thrower) {
            if let Some(entry) = table.entries().get(index) {
                return Some(Found {
                    frame,
                    index,
                    handler: entry.callback(),
                });
            }
        }
        cursor = frame.next;
    }
    None
}

/// Iterates frames from `cursor` downward.
pub(crate) fn frames<'a>(
    cursor: Option<&'a ResumeFrame<'a>>,
) -> impl Iterator<Item = &'a ResumeFrame<'a>> {
    core::iter::successors(cursor, |frame| frame.next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::table::HandlerEntry;
    use crate::test_utils::arith_types;

    fn noop<'h>() -> ResumeHandler<'h> {
        Box::new(|_: &Cx<'_>, _: &mut Event| Ok(()))
    }

    fn table(entries: Vec<HandlerEntry<ResumeHandler<'static>>>) -> ResumeTable<'static> {
        let mut t = HandlerTable::new();
        for e in entries {
            t.push(e);
        }
        t
    }

    #[test]
    fn innermost_frame_wins() {
        let (types, tags) = arith_types();
        let outer = table(vec![HandlerEntry::new(tags.overflow, noop())]);
        let inner = table(vec![HandlerEntry::catch_all(noop())]);
        let f0 = ResumeFrame::new(TableId::new(0), &outer, None);
        let f1 = ResumeFrame::new(TableId::new(1), &inner, Some(&f0));

        let found = search(Some(&f1), &types, tags.overflow, None).unwrap();
        assert_eq!(found.frame.id(), TableId::new(1));
        assert_eq!(found.index, 0);
    }

    #[test]
    fn search_from_below_skips_examined_frames() {
        let (types, tags) = arith_types();
        let bottom = table(vec![HandlerEntry::new(tags.arithmetic, noop())]);
        let middle = table(vec![HandlerEntry::new(tags.overflow, noop())]);
        let top = table(vec![HandlerEntry::new(tags.io, noop())]);
        let f0 = ResumeFrame::new(TableId::new(0), &bottom, None);
        let f1 = ResumeFrame::new(TableId::new(1), &middle, Some(&f0));
        let f2 = ResumeFrame::new(TableId::new(2), &top, Some(&f1));

        let first = search(Some(&f2), &types, tags.overflow, None).unwrap();
        assert_eq!(first.frame.id(), TableId::new(1));

        // A resume raised from the middle handler starts below it.
        let nested = search(first.frame.next(), &types, tags.overflow, None).unwrap();
        assert_eq!(nested.frame.id(), TableId::new(0));

        // From the bottom handler nothing is left.
        assert!(search(nested.frame.next(), &types, tags.overflow, None).is_none());
    }

    #[test]
    fn unmatched_search_is_none() {
        let (types, tags) = arith_types();
        let only = table(vec![HandlerEntry::new(tags.underflow, noop())]);
        let f0 = ResumeFrame::new(TableId::new(0), &only, None);
        assert!(search(Some(&f0), &types, tags.overflow, None).is_none());
        assert!(search(None, &types, tags.overflow, None).is_none());
    }

    #[test]
    fn frames_walk_downward() {
        let empty = table(Vec::new());
        let f0 = ResumeFrame::new(TableId::new(0), &empty, None);
        let f1 = ResumeFrame::new(TableId::new(1), &empty, Some(&f0));
        let ids: Vec<_> = frames(Some(&f1)).map(ResumeFrame::id).collect();
        assert_eq!(ids, vec![TableId::new(1), TableId::new(0)]);
    }
}
