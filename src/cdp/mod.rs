//! Chrome DevTools Protocol (CDP) client
//!
//! WebSocket transport plus the message types for the `Debugger` and
//! `Runtime` domains. The engine only sees this through
//! [`crate::engine::DebuggerProtocol`].

pub mod client;
pub mod codec;
pub mod discovery;
pub mod types;

pub use client::CdpClient;
pub use types::*;
