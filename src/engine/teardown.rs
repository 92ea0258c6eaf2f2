//! Teardown coordinator

use serde::Serialize;

use super::registry::BreakpointRegistry;
use super::DebuggerProtocol;

/// What teardown did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeardownSummary {
    pub attempted: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Remove every placed breakpoint, then close the session
///
/// Each removal uses the id the backend issued at creation. A failed
/// removal is logged and the rest still run. Does nothing when there is no
/// live session.
pub async fn run<P: DebuggerProtocol + ?Sized>(
    protocol: Option<&P>,
    registry: &BreakpointRegistry,
) -> TeardownSummary {
    let mut summary = TeardownSummary::default();

    let Some(protocol) = protocol.filter(|p| p.is_connected()) else {
        tracing::debug!("No live session, skipping teardown");
        return summary;
    };

    tracing::info!(breakpoints = registry.len(), "Cleaning up");
    for record in registry.take_all() {
        summary.attempted += 1;
        match protocol.remove_breakpoint(&record.breakpoint_id).await {
            Ok(()) => {
                summary.removed += 1;
                tracing::debug!(breakpoint_id = %record.breakpoint_id, key = %record.key, "Breakpoint removed");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(breakpoint_id = %record.breakpoint_id, error = %e, "Cleanup error");
            }
        }
    }

    if let Err(e) = protocol.close().await {
        tracing::warn!(error = %e, "Failed to close session");
    }

    tracing::info!(
        removed = summary.removed,
        failed = summary.failed,
        "Shutdown complete"
    );
    summary
}
