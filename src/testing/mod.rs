//! Test support
//!
//! [`FakeDebugger`] stands in for a live DevTools session in unit and
//! integration tests.

mod fake;

pub use fake::{Call, FakeDebugger};
