//! CDP client for communicating with a DevTools endpoint
//!
//! One WebSocket per target. A background reader task routes responses to
//! the request that is waiting on them and forwards notifications to the
//! event channel, so any number of requests can be in flight at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::common::config::ConnectionConfig;
use crate::common::{Error, Result};
use crate::engine::{DebuggerProtocol, LineMatch};

use super::codec::{self, Incoming};
use super::discovery;
use super::types::*;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = HashMap<u64, oneshot::Sender<std::result::Result<Value, RpcError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// CDP client for one debugging target
pub struct CdpClient {
    /// Write half of the WebSocket
    writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    /// Id for the next command
    next_id: AtomicU64,
    /// Commands waiting for a response
    pending: Arc<Mutex<PendingMap>>,
    /// Cleared when the socket closes from either side
    connected: Arc<AtomicBool>,
    /// Receiver for events (given to the engine)
    event_rx: Option<mpsc::UnboundedReceiver<Event>>,
    /// Background reader
    reader: JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a WebSocket debugger url
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::debug!(%url, "Opening DevTools WebSocket");
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::connect_failed(url, e))?;

        let (writer, stream) = socket.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(PendingMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            stream,
            Arc::clone(&pending),
            event_tx,
            Arc::clone(&connected),
        ));

        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            next_id: AtomicU64::new(1),
            pending,
            connected,
            event_rx: Some(event_rx),
            reader,
        })
    }

    /// Resolve the target from configuration and connect
    ///
    /// The connect timeout covers discovery and the WebSocket handshake only.
    pub async fn connect_with(config: &ConnectionConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        tokio::time::timeout(timeout, async {
            let url = discovery::resolve_ws_url(config).await?;
            Self::connect(&url).await
        })
        .await
        .map_err(|_| Error::ConnectTimeout(config.connect_timeout_secs))?
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.event_rx.take()
    }

    /// Send a command and wait for its result
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let text = codec::encode_request(id, method, &params)?;
        tracing::trace!("CDP >>> {}", text);

        let sent = self.writer.lock().await.send(Message::Text(text)).await;
        if let Err(e) = sent {
            lock(&self.pending).remove(&id);
            return Err(Error::Protocol(format!("Failed to send {}: {}", method, e)));
        }

        let result = rx
            .await
            .map_err(|_| Error::SessionClosed)?
            .map_err(|e| Error::request_failed(method, e.code, &e.message))?;

        serde_json::from_value(result)
            .map_err(|e| Error::Protocol(format!("Failed to parse {} response: {}", method, e)))
    }

    /// Close the socket; idempotent
    pub async fn shutdown(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.writer
            .lock()
            .await
            .close()
            .await
            .map_err(|e| Error::Protocol(format!("Failed to close socket: {}", e)))
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Route incoming frames until the socket closes
async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: Arc<Mutex<PendingMap>>,
    event_tx: mpsc::UnboundedSender<Event>,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                tracing::debug!(?frame, "DevTools closed the connection");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "DevTools connection error");
                break;
            }
        };
        tracing::trace!("CDP <<< {}", text);

        match codec::decode_message(&text) {
            Ok(Incoming::Response { id, outcome }) => match lock(&pending).remove(&id) {
                Some(tx) => {
                    let _ = tx.send(outcome);
                }
                None => tracing::debug!(id, "Response for unknown request"),
            },
            Ok(Incoming::Notification { method, params }) => {
                // Receiver gone means the engine stopped listening; keep serving responses
                let _ = event_tx.send(Event::from_message(&method, params));
            }
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable frame"),
        }
    }

    connected.store(false, Ordering::SeqCst);
    // Dropping the senders fails every waiting request with SessionClosed
    lock(&pending).clear();
}

#[async_trait]
impl DebuggerProtocol for CdpClient {
    async fn enable_debugger(&self) -> Result<()> {
        self.call::<Value>("Debugger.enable", json!({})).await?;
        Ok(())
    }

    async fn enable_runtime(&self) -> Result<()> {
        self.call::<Value>("Runtime.enable", json!({})).await?;
        Ok(())
    }

    async fn search_in_content(
        &self,
        script_id: &str,
        query: &str,
        case_sensitive: bool,
    ) -> Result<Vec<LineMatch>> {
        let response: SearchInContentResult = self
            .call(
                "Debugger.searchInContent",
                json!({
                    "scriptId": script_id,
                    "query": query,
                    "caseSensitive": case_sensitive,
                    "isRegex": false,
                }),
            )
            .await?;

        // The backend reports whole lines without an offset
        Ok(response
            .result
            .into_iter()
            .map(|m| LineMatch {
                line: m.line_number,
                text: m.line_content,
                column: None,
            })
            .collect())
    }

    async fn set_breakpoint_by_url(&self, url: &str, line: u32, column: u32) -> Result<BreakpointId> {
        let response: SetBreakpointByUrlResult = self
            .call(
                "Debugger.setBreakpointByUrl",
                json!({
                    "url": url,
                    "lineNumber": line,
                    "columnNumber": column,
                }),
            )
            .await?;
        match response.locations.first() {
            Some(resolved) => tracing::debug!(
                breakpoint_id = %response.breakpoint_id,
                line = resolved.line_number,
                column = ?resolved.column_number,
                "Breakpoint resolved"
            ),
            None => tracing::debug!(
                breakpoint_id = %response.breakpoint_id,
                "Breakpoint not yet resolved"
            ),
        }
        Ok(response.breakpoint_id)
    }

    async fn evaluate_on_call_frame(
        &self,
        call_frame_id: &str,
        expression: &str,
    ) -> Result<RemoteObject> {
        let response: EvaluateResult = self
            .call(
                "Debugger.evaluateOnCallFrame",
                json!({
                    "callFrameId": call_frame_id,
                    "expression": expression,
                    "silent": true,
                }),
            )
            .await?;

        match response.exception_details {
            Some(details) => Err(Error::EvaluationThrew(details.message())),
            None => Ok(response.result),
        }
    }

    async fn remove_breakpoint(&self, breakpoint_id: &BreakpointId) -> Result<()> {
        self.call::<Value>(
            "Debugger.removeBreakpoint",
            json!({ "breakpointId": breakpoint_id }),
        )
        .await?;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.call::<Value>("Debugger.resume", json!({})).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shutdown().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
