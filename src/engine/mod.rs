//! Breakpoint orchestration engine
//!
//! Consumes debugger events on a single loop. Every notification is
//! handled in its own task, so handlers interleave at each protocol round
//! trip: a pause can be reported while a script search is still waiting.
//! The registry is the only shared mutable state.

pub mod matcher;
pub mod observer;
pub mod pause;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod session;
pub mod teardown;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cdp::types::Event;
use crate::common::config::EngineConfig;

pub use observer::ScriptDescriptor;
pub use protocol::{DebuggerProtocol, LineMatch};
pub use registry::{BreakpointKey, BreakpointRecord, BreakpointRegistry};
pub use report::{PauseReport, ReportSink, StdoutSink};
pub use teardown::TeardownSummary;

/// The orchestration engine for one session
pub struct Engine<P: DebuggerProtocol + 'static> {
    protocol: Arc<P>,
    config: Arc<EngineConfig>,
    registry: Arc<BreakpointRegistry>,
    sink: Arc<dyn ReportSink>,
    /// Best-effort wait for in-flight handlers at shutdown
    drain_timeout: Duration,
}

impl<P: DebuggerProtocol + 'static> Engine<P> {
    pub fn new(protocol: Arc<P>, config: EngineConfig, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            protocol,
            config: Arc::new(config),
            registry: Arc::new(BreakpointRegistry::new()),
            sink,
            drain_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Shared handle to the registry
    pub fn registry(&self) -> Arc<BreakpointRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run until `shutdown` fires or the event stream ends
    ///
    /// If the domains cannot be enabled nothing else happens and an empty
    /// summary is returned.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<Event>,
        shutdown: CancellationToken,
    ) -> TeardownSummary {
        if !session::establish(&*self.protocol).await {
            let _ = self.protocol.close().await;
            return TeardownSummary::default();
        }
        tracing::info!(targets = ?self.config.targets, "Initialized");

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event, &mut tasks),
                    None => {
                        tracing::info!("Event stream ended");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Event handler failed");
                    }
                }
            }
        }

        self.drain(&mut tasks).await;
        teardown::run(Some(&*self.protocol), &self.registry).await
    }

    /// Start the handler for one event
    fn dispatch(&self, event: Event, tasks: &mut JoinSet<()>) {
        match event {
            Event::ScriptParsed(parsed) => {
                let script = ScriptDescriptor::from(parsed);
                if !observer::is_eligible(&self.config, &script) {
                    tracing::trace!(url = %script.url, "Script filtered out");
                    return;
                }
                let protocol = Arc::clone(&self.protocol);
                let config = Arc::clone(&self.config);
                let registry = Arc::clone(&self.registry);
                tasks.spawn(async move {
                    let summary =
                        observer::process_script(&*protocol, &config, &registry, &script).await;
                    tracing::debug!(url = %script.url, ?summary, "Script processed");
                });
            }
            Event::Paused(paused) => {
                let protocol = Arc::clone(&self.protocol);
                let config = Arc::clone(&self.config);
                let sink = Arc::clone(&self.sink);
                tasks.spawn(async move {
                    pause::handle_pause(&*protocol, &config, &*sink, paused).await;
                });
            }
            Event::Resumed => tracing::trace!("Execution resumed"),
            Event::Other(method) => tracing::trace!(%method, "Ignoring event"),
        }
    }

    /// Let in-flight handlers finish, abort whatever is left at the deadline
    ///
    /// Breakpoint creations already sent are never cut off: the registry is
    /// closed and allowed to settle first, so every id the backend issued is
    /// recorded for teardown.
    async fn drain(&self, tasks: &mut JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }
        tracing::debug!(in_flight = tasks.len(), "Draining handlers");
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_ok() {
            return;
        }

        self.registry.close();
        let pending = self.registry.in_flight();
        if pending > 0 {
            tracing::info!(pending, "Waiting for breakpoint creations to complete");
            self.registry.settled().await;
        }
        tracing::warn!(remaining = tasks.len(), "Aborting unfinished handlers");
        tasks.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeDebugger};

    fn engine(fake: &Arc<FakeDebugger>, drain_timeout: Duration) -> Engine<FakeDebugger> {
        let (reports, _) = mpsc::unbounded_channel::<PauseReport>();
        let config = EngineConfig {
            targets: vec!["foo".to_string()],
            ..Default::default()
        };
        Engine::new(Arc::clone(fake), config, Arc::new(reports)).with_drain_timeout(drain_timeout)
    }

    #[tokio::test]
    async fn test_drain_keeps_breakpoint_answered_late() {
        let fake = Arc::new(
            FakeDebugger::new().with_breakpoint_reply_delay(Duration::from_millis(300)),
        );
        fake.add_script("1", "https://a.test/app.js", "let x = foo(bar);");
        let engine = engine(&fake, Duration::from_millis(50));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(engine.run(events_rx, shutdown.clone()));

        events_tx.send(fake.parsed_event("1").unwrap()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        let summary = run.await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(fake.active_breakpoints(), 0);
        assert_eq!(fake.count(|c| matches!(c, Call::RemoveBreakpoint(_))), 1);
    }

    #[tokio::test]
    async fn test_drain_aborts_slow_search_without_creating() {
        let fake = Arc::new(FakeDebugger::new().with_latency(Duration::from_secs(5)));
        fake.add_script("1", "https://a.test/app.js", "let x = foo(bar);");
        let engine = engine(&fake, Duration::from_millis(50));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(engine.run(events_rx, shutdown.clone()));

        events_tx.send(fake.parsed_event("1").unwrap()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        let summary = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("drain waited on a search")
            .unwrap();
        assert_eq!(summary, TeardownSummary::default());
        assert_eq!(fake.count(|c| matches!(c, Call::SetBreakpoint { .. })), 0);
    }
}
