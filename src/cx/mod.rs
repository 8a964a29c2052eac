//! Context handle and protected blocks.
//!
//! The [`Cx`] type is the handle through which a running context raises,
//! polls and inspects events. The [`Try`] type builds a protected block: the
//! handler tables that guard one body of code.
//!
//! # Module Contents
//!
//! - [`Cx`]: the per-context handle and delivery engine
//! - [`Try`]: builder for protected blocks

pub mod cx;
pub mod protect;

pub use cx::Cx;
pub(crate) use cx::ContextCore;
pub use protect::{TerminateHandler, Try};
