//! Error interface for this crate.
//!
//! Every error produced by the loader and the simulator implements [`Error`],
//! which extends [`std::error::Error`] with an optional hint
//! that a front end can display next to the message.
//!
//! The concrete error types are re-exported here:
//! - [`LexErr`]: errors raised while tokenizing an `.ls8` file
//! - [`ParseErr`]: errors raised while turning tokens into a program image
//! - [`SimErr`]: fatal errors raised by the simulator
use std::borrow::Cow;

pub use crate::parse::lex::LexErr;
pub use crate::parse::{ParseErr, ParseErrKind};
pub use crate::sim::SimErr;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// A clarifying message to help aid someone in how to fix the error.
    fn help(&self) -> Option<Cow<str>>;
}
