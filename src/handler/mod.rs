//! Handler tables and the per-context stacks that consult them.
//!
//! - [`table`]: ordered `(type, binding, callback)` entries and matching
//! - [`resumption`]: the chain of active resumption tables and its search
//! - [`filter`]: the enable/disable stack gating asynchronous delivery

pub mod filter;
pub mod resumption;
pub mod table;

pub use filter::{FilterEntry, FilterStack, TypeSet};
pub use resumption::{ResumeFrame, ResumeHandler, ResumeTable};
pub use table::{HandlerEntry, HandlerTable, TableId};
