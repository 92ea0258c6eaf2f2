//! Pause handler: evaluate, report, optionally resume

use futures_util::future::join_all;
use serde_json::Value;

use crate::cdp::types::{CallFrame, PausedEvent};
use crate::common::config::EngineConfig;

use super::report::{Evaluation, PauseReport, ReportSink, StackEntry, ANONYMOUS, EVALUATION_SENTINEL};
use super::DebuggerProtocol;

/// Format call frames for a report
pub fn format_stack_trace(frames: &[CallFrame]) -> Vec<StackEntry> {
    frames
        .iter()
        .map(|frame| StackEntry {
            function_name: if frame.function_name.is_empty() {
                ANONYMOUS.to_string()
            } else {
                frame.function_name.clone()
            },
            url: frame.url.clone(),
            line: frame.location.line_number,
            column: frame.location.column_number.unwrap_or(0),
        })
        .collect()
}

/// Evaluate every pattern in the top frame
///
/// Evaluations run concurrently and independently; a failure only replaces
/// that pattern's value with the sentinel.
pub async fn evaluate_patterns<P: DebuggerProtocol + ?Sized>(
    protocol: &P,
    config: &EngineConfig,
    frame: &CallFrame,
) -> Vec<Evaluation> {
    let requests = config.targets.iter().map(|pattern| async move {
        let value = match protocol
            .evaluate_on_call_frame(&frame.call_frame_id, pattern)
            .await
        {
            Ok(object) => object.display_value(),
            Err(e) => {
                tracing::debug!(pattern = %pattern, error = %e, "Evaluation failed");
                Value::String(EVALUATION_SENTINEL.to_string())
            }
        };
        Evaluation {
            pattern: pattern.clone(),
            value,
        }
    });
    join_all(requests).await
}

/// Handle one pause notification
pub async fn handle_pause<P: DebuggerProtocol + ?Sized>(
    protocol: &P,
    config: &EngineConfig,
    sink: &dyn ReportSink,
    event: PausedEvent,
) -> PauseReport {
    let stack_trace = format_stack_trace(&event.call_frames);

    let evaluations = match event.call_frames.first() {
        Some(frame) => evaluate_patterns(protocol, config, frame).await,
        None => Vec::new(),
    };

    let report = PauseReport {
        location: stack_trace.first().cloned(),
        reason: event.reason,
        hit_breakpoints: event.hit_breakpoints,
        evaluations,
        stack_trace,
    };

    tracing::info!(
        url = report.location.as_ref().map(|l| l.url.as_str()).unwrap_or(""),
        line = report.location.as_ref().map(|l| l.line),
        column = report.location.as_ref().map(|l| l.column),
        reason = %report.reason,
        "Break"
    );
    sink.publish(&report);

    if config.auto_resume {
        if let Err(e) = protocol.resume().await {
            tracing::warn!(error = %e, "Failed to resume");
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::types::Location;
    use crate::testing::{Call, FakeDebugger};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn frame(id: &str, function_name: &str, line: u32) -> CallFrame {
        CallFrame {
            call_frame_id: id.to_string(),
            function_name: function_name.to_string(),
            location: Location {
                script_id: "1".to_string(),
                line_number: line,
                column_number: Some(8),
            },
            url: "https://a.test/app.js".to_string(),
        }
    }

    fn paused(frames: Vec<CallFrame>) -> PausedEvent {
        PausedEvent {
            call_frames: frames,
            reason: "other".to_string(),
            hit_breakpoints: vec![],
        }
    }

    fn config(targets: &[&str], auto_resume: bool) -> EngineConfig {
        EngineConfig {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            auto_resume,
            ..Default::default()
        }
    }

    #[test]
    fn test_anonymous_frames() {
        let stack = format_stack_trace(&[frame("f0", "", 3), frame("f1", "main", 10)]);
        assert_eq!(stack[0].function_name, "<anonymous>");
        assert_eq!(stack[1].function_name, "main");
        assert_eq!((stack[1].line, stack[1].column), (10, 8));
    }

    #[tokio::test]
    async fn test_failed_evaluation_uses_sentinel() {
        let fake = FakeDebugger::new();
        fake.set_value("foo", json!(42));
        fake.fail_evaluation("bar");
        fake.set_value("baz", json!("ok"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = handle_pause(
            &fake,
            &config(&["foo", "bar", "baz"], false),
            &tx,
            paused(vec![frame("top", "handler", 3), frame("f1", "", 9)]),
        )
        .await;

        assert_eq!(report.evaluations.len(), 3);
        assert_eq!(report.evaluations[0].value, json!(42));
        assert!(report.evaluations[1].is_sentinel());
        assert_eq!(report.evaluations[2].value, json!("ok"));
        assert_eq!(report.location.as_ref().unwrap().function_name, "handler");
        assert_eq!(rx.try_recv().unwrap(), report);

        // Evaluated against the top frame only
        assert!(fake.calls().iter().all(|c| match c {
            Call::Evaluate { call_frame_id, .. } => call_frame_id == "top",
            _ => true,
        }));
        assert_eq!(fake.count(|c| matches!(c, Call::Resume)), 0);
    }

    #[tokio::test]
    async fn test_auto_resume() {
        let fake = FakeDebugger::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        handle_pause(&fake, &config(&["foo"], true), &tx, paused(vec![frame("top", "f", 1)])).await;

        let calls = fake.calls();
        let evaluated = calls.iter().position(|c| matches!(c, Call::Evaluate { .. })).unwrap();
        let resumed = calls.iter().position(|c| matches!(c, Call::Resume)).unwrap();
        assert!(evaluated < resumed);
    }

    #[tokio::test]
    async fn test_pause_without_frames() {
        let fake = FakeDebugger::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let report = handle_pause(&fake, &config(&["foo"], false), &tx, paused(vec![])).await;

        assert!(report.location.is_none());
        assert!(report.evaluations.is_empty());
        assert_eq!(fake.count(|c| matches!(c, Call::Evaluate { .. })), 0);
    }
}
