//! Test harness for zbmodem: deterministic in-memory mock link.
//!
//! See [`MockLink`] and [`MockLinkHandle`] for driving the driver's
//! request/response and unsolicited-frame paths without real hardware.

mod mock_link;

pub use mock_link::{mock_link, MockLink, MockLinkHandle};
