//! autobreak - automatic pattern breakpoints over the Chrome DevTools Protocol
//!
//! Watches every script a page loads, places a breakpoint wherever one of
//! the configured patterns appears, and reports the evaluated patterns and
//! the call stack each time execution stops there.

pub mod cdp;
pub mod cli;
pub mod commands;
pub mod common;
pub mod engine;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use engine::{DebuggerProtocol, Engine};
