//! Session manager: connection and domain setup

use tokio::sync::mpsc;

use crate::cdp::{CdpClient, Event};
use crate::common::config::ConnectionConfig;
use crate::common::Result;

use super::DebuggerProtocol;

/// Connect to the configured DevTools target
///
/// Returns the client together with its event stream. No retry: a failure
/// here ends the session before it starts.
#[tracing::instrument(skip_all, fields(endpoint = %config.ws_url.clone().unwrap_or_else(|| config.http_endpoint())))]
pub async fn connect(config: &ConnectionConfig) -> Result<(CdpClient, mpsc::UnboundedReceiver<Event>)> {
    let mut client = CdpClient::connect_with(config).await?;
    let events = client
        .take_event_receiver()
        .ok_or_else(|| crate::common::Error::Internal("Failed to get event receiver".to_string()))?;
    Ok((client, events))
}

/// Enable both required domains
///
/// Returns the readiness signal; on `false` the caller must not start any
/// other component.
pub async fn establish<P: DebuggerProtocol + ?Sized>(protocol: &P) -> bool {
    match tokio::try_join!(protocol.enable_debugger(), protocol.enable_runtime()) {
        Ok(_) => {
            tracing::debug!("Debugger and Runtime domains enabled");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to enable debugging domains");
            false
        }
    }
}
