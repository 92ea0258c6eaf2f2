//! The protocol surface the engine consumes

use async_trait::async_trait;

use crate::cdp::types::{BreakpointId, RemoteObject};
use crate::common::Result;

/// One line of a content search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 0-based line number
    pub line: u32,
    /// Full text of the line
    pub text: String,
    /// Offset of the match within the line, when the backend reports it
    pub column: Option<u32>,
}

/// Domain methods of a remote debugging session
///
/// Implemented by [`crate::cdp::CdpClient`] for real targets and by
/// [`crate::testing::FakeDebugger`] in tests. Events arrive separately over
/// a channel handed to [`super::Engine::run`].
#[async_trait]
pub trait DebuggerProtocol: Send + Sync {
    /// Enable the domain that reports scripts and pauses
    async fn enable_debugger(&self) -> Result<()>;

    /// Enable the domain used for expression evaluation
    async fn enable_runtime(&self) -> Result<()>;

    /// Plain substring search through one script's source
    async fn search_in_content(
        &self,
        script_id: &str,
        query: &str,
        case_sensitive: bool,
    ) -> Result<Vec<LineMatch>>;

    async fn set_breakpoint_by_url(&self, url: &str, line: u32, column: u32)
        -> Result<BreakpointId>;

    /// Evaluate in the scope of a paused call frame
    async fn evaluate_on_call_frame(&self, call_frame_id: &str, expression: &str)
        -> Result<RemoteObject>;

    async fn remove_breakpoint(&self, breakpoint_id: &BreakpointId) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// False once the session was closed by either side
    fn is_connected(&self) -> bool;
}
