//! zbmodem-core: Core traits, types, and error definitions for zbmodem.
//!
//! This crate defines the link-agnostic abstractions the zbmodem driver is
//! built on. Applications depend on these types without pulling in any
//! specific transport or protocol backend.
//!
//! # Key types
//!
//! - [`ByteLink`] / [`ByteSource`] / [`ByteSink`] -- the duplex byte link
//!   and its split halves
//! - [`ModemEvent`] -- asynchronous state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod link;

// Re-export key types at crate root for ergonomic `use zbmodem_core::*`.
pub use error::{Error, Result};
pub use events::ModemEvent;
pub use link::{ByteLink, ByteSink, ByteSource};
