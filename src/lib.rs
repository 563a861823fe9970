//! consentsync - keep a user's consent decision in sync with the server
//!
//! The CLI pieces live here so they can be tested: a terminal surface, a
//! terminal stand-in for the host observer, and tracing setup.

pub mod console;
pub mod logging;

pub use console::{format_record, format_state, ConsoleObserver, ConsoleSurface};
pub use logging::init_tracing;
