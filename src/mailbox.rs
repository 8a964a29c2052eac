//! Per-context mailbox for asynchronously raised events.
//!
//! The mailbox is the only structure shared between contexts. All state
//! lives behind one [`parking_lot::Mutex`]: the FIFO of pending entries, the
//! owner's enable/disable filter stack, and the open flag. Senders check the
//! filter and enqueue under the same lock acquisition, so a region the owner
//! enters is in force for every send that completes after it.
//!
//! # Invariants
//!
//! - The lock is held only for O(1)-ish queue operations, never across a
//!   handler invocation and never while the owner blocks (the [`Condvar`]
//!   wait releases it).
//! - Entries are delivered in arrival order among those currently
//!   deliverable. An entry whose type became disabled after it was queued
//!   stays queued, in order, until it is enabled again.
//! - Withdrawal marks an entry hidden; hidden entries are never delivered
//!   and are physically removed as soon as they reach the front.
//! - Once closed, the mailbox refuses every send.

use std::collections::VecDeque;
use std::sync::Weak;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, ErrorKind};
use crate::event::{Event, RaiseKind};
use crate::handler::{FilterEntry, FilterStack};
use crate::runtime::{ContextRef, ContextShared};
use crate::tracing_compat::{debug, trace};
use crate::types::EventTypes;

/// One pending asynchronous raise.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) seq: u64,
    pub(crate) kind: RaiseKind,
    pub(crate) event: Event,
    hidden: bool,
}

#[derive(Debug)]
struct MailboxState {
    queue: VecDeque<Envelope>,
    filters: FilterStack,
    open: bool,
    next_seq: u64,
    hidden: usize,
}

impl MailboxState {
    fn visible(&self) -> usize {
        self.queue.len() - self.hidden
    }

    fn purge_front(&mut self) {
        while self.queue.front().is_some_and(|e| e.hidden) {
            self.queue.pop_front();
            self.hidden -= 1;
        }
    }

    fn first_deliverable(&self, types: &EventTypes) -> Option<usize> {
        self.queue
            .iter()
            .position(|e| !e.hidden && self.filters.deliverable(types, e.event.tag()))
    }
}

/// Lock-protected FIFO of pending events for one context.
#[derive(Debug)]
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
    capacity: Option<usize>,
}

impl Mailbox {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                filters: FilterStack::new(),
                open: true,
                next_seq: 0,
                hidden: 0,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Appends an already-duplicated event and wakes a blocked owner.
    ///
    /// Refusals, in the order they are checked: the owner has terminated,
    /// the owner's filter disables the type, the mailbox is full.
    pub(crate) fn enqueue(
        &self,
        types: &EventTypes,
        event: Event,
        kind: RaiseKind,
    ) -> Result<u64, Error> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::new(ErrorKind::DestinationTerminated)
                .with_message("destination mailbox is closed"));
        }
        if !state.filters.deliverable(types, event.tag()) {
            return Err(Error::new(ErrorKind::EventDisabled).with_message(format!(
                "destination disables delivery of {}",
                types.name(event.tag())
            )));
        }
        if let Some(cap) = self.capacity {
            if state.visible() >= cap {
                return Err(Error::new(ErrorKind::MailboxFull)
                    .with_message(format!("{cap} events already pending")));
            }
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        trace!(seq, tag = ?event.tag(), %kind, "event enqueued");
        state.queue.push_back(Envelope {
            seq,
            kind,
            event,
            hidden: false,
        });
        drop(state);
        self.ready.notify_one();
        Ok(seq)
    }

    /// Removes and returns the oldest deliverable entry.
    pub(crate) fn dequeue_next(&self, types: &EventTypes) -> Option<Envelope> {
        let mut state = self.state.lock();
        state.purge_front();
        let pos = state.first_deliverable(types)?;
        let envelope = state.queue.remove(pos)?;
        trace!(seq = envelope.seq, "event dequeued");
        Some(envelope)
    }

    /// True if a deliverable entry is waiting.
    pub(crate) fn has_deliverable(&self, types: &EventTypes) -> bool {
        self.state.lock().first_deliverable(types).is_some()
    }

    /// Blocks until a deliverable entry is waiting or the mailbox closes.
    pub(crate) fn wait_deliverable(&self, types: &EventTypes) {
        let mut state = self.state.lock();
        while state.open && state.first_deliverable(types).is_none() {
            self.ready.wait(&mut state);
        }
    }

    /// Hides the entry with sequence number `seq` if it is still queued.
    ///
    /// Returns `false` once the entry has been dequeued (delivery began) or
    /// was already withdrawn.
    pub(crate) fn withdraw(&self, seq: u64) -> bool {
        let mut state = self.state.lock();
        // Sequence numbers increase strictly from front to back.
        let Ok(index) = state.queue.binary_search_by_key(&seq, |e| e.seq) else {
            return false;
        };
        let entry = &mut state.queue[index];
        if entry.hidden {
            return false;
        }
        entry.hidden = true;
        state.hidden += 1;
        state.purge_front();
        trace!(seq, "event withdrawn");
        true
    }

    /// Number of queued, non-withdrawn entries.
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().visible()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Refuses further sends and drops pending entries.
    pub(crate) fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.open = false;
        let dropped = state.visible();
        state.queue.clear();
        state.hidden = 0;
        drop(state);
        self.ready.notify_all();
        if dropped > 0 {
            debug!(dropped, "mailbox closed with pending events");
        }
        dropped
    }

    pub(crate) fn push_filter(&self, entry: FilterEntry) -> usize {
        self.state.lock().filters.push(entry)
    }

    /// Pops the top filter, which must be the one pushed at `depth`.
    pub(crate) fn pop_filter(&self, depth: usize) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.filters.depth() != depth {
            return Err(Error::new(ErrorKind::ScopeViolation).with_message(format!(
                "filter released at depth {depth}, stack depth is {}",
                state.filters.depth()
            )));
        }
        state.filters.pop();
        Ok(())
    }

    pub(crate) fn filter_depth(&self) -> usize {
        self.state.lock().filters.depth()
    }

    pub(crate) fn deliverable(&self, types: &EventTypes, tag: crate::types::TypeTag) -> bool {
        self.state.lock().filters.deliverable(types, tag)
    }
}

/// Receipt for an asynchronous raise, used to withdraw it.
#[derive(Debug, Clone)]
pub struct Ticket {
    destination: ContextRef,
    seq: u64,
    target: Weak<ContextShared>,
}

impl Ticket {
    pub(crate) fn new(destination: ContextRef, seq: u64, target: Weak<ContextShared>) -> Self {
        Self {
            destination,
            seq,
            target,
        }
    }

    /// The context the event was sent to.
    #[must_use]
    pub fn destination(&self) -> &ContextRef {
        &self.destination
    }

    /// Position of the entry in the destination's arrival order.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Rescinds the raise if the destination has not started delivering it.
    ///
    /// Returns `true` if the entry was withdrawn; after that it is never
    /// delivered. Returns `false` if delivery already began, the entry was
    /// already withdrawn, or the destination has terminated.
    pub fn withdraw(&self) -> bool {
        self.target
            .upgrade()
            .is_some_and(|shared| shared.mailbox().withdraw(self.seq))
    }
}
