//! CLI command handling
//!
//! Loads configuration, connects, and runs the engine until shutdown.

mod signal;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cdp::discovery;
use crate::commands::Options;
use crate::common::config::Config;
use crate::common::Result;
use crate::engine::{session, Engine, StdoutSink};

/// Run the command line
pub async fn dispatch(options: Options) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    options.apply(&mut config);
    config.engine = config.engine.validate()?;

    if options.list_targets {
        return list_targets(&config).await;
    }

    run(config).await
}

/// Print the debuggable targets
async fn list_targets(config: &Config) -> Result<()> {
    let targets = discovery::list_targets(&config.connection.http_endpoint()).await?;
    if targets.is_empty() {
        println!("No targets");
        return Ok(());
    }
    for target in targets {
        let attachable = if target.web_socket_debugger_url.is_some() { "" } else { " (attached elsewhere)" };
        println!("{:<16} {:<24} {}{}", target.target_type, target.id, target.url, attachable);
        if !target.title.is_empty() {
            println!("{:<16} {:<24} {}", "", "", target.title);
        }
    }
    Ok(())
}

/// Connect and run the engine until a signal arrives or the target goes away
///
/// A connection failure ends the run without an error.
pub async fn run(config: Config) -> Result<()> {
    let (client, events) = match session::connect(&config.connection).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!(error = %e, "Connection error");
            return Ok(());
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(signal::cancel_on_signal(shutdown.clone()));

    let sink = Arc::new(StdoutSink {
        format: config.output.format,
    });
    let engine = Engine::new(Arc::new(client), config.engine, sink)
        .with_drain_timeout(Duration::from_millis(config.shutdown.drain_timeout_ms));

    let summary = engine.run(events, shutdown.clone()).await;
    // Stops the signal listener when the run ended on its own
    shutdown.cancel();
    tracing::debug!(?summary, "Session finished");
    Ok(())
}
