//! Pause reports and where they go

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cdp::types::BreakpointId;
use crate::common::config::OutputFormat;

/// Placeholder for frames without a function name
pub const ANONYMOUS: &str = "<anonymous>";

/// Value reported when an expression cannot be evaluated
pub const EVALUATION_SENTINEL: &str = "Unable to evaluate";

/// One formatted call frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEntry {
    pub function_name: String,
    pub url: String,
    pub line: u32,
    pub column: u32,
}

/// Result of evaluating one pattern at a pause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub pattern: String,
    pub value: Value,
}

impl Evaluation {
    pub fn is_sentinel(&self) -> bool {
        self.value.as_str() == Some(EVALUATION_SENTINEL)
    }
}

/// Everything reported for one pause
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseReport {
    /// Top frame location; absent when the pause carried no frames
    pub location: Option<StackEntry>,
    pub reason: String,
    pub hit_breakpoints: Vec<BreakpointId>,
    pub evaluations: Vec<Evaluation>,
    pub stack_trace: Vec<StackEntry>,
}

impl std::fmt::Display for PauseReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => writeln!(
                f,
                "{} {}:{}:{} ({})",
                "Break".red().bold(),
                loc.url,
                loc.line,
                loc.column,
                self.reason.dimmed()
            )?,
            None => writeln!(f, "{} ({})", "Break".red().bold(), self.reason.dimmed())?,
        }

        for eval in &self.evaluations {
            writeln!(f, "  {} = {}", eval.pattern.cyan(), eval.value)?;
        }

        for (i, frame) in self.stack_trace.iter().enumerate() {
            writeln!(
                f,
                "  #{:<2} {} {}:{}:{}",
                i,
                frame.function_name.bold(),
                frame.url.dimmed(),
                frame.line,
                frame.column
            )?;
        }
        Ok(())
    }
}

/// Destination for pause reports
pub trait ReportSink: Send + Sync {
    fn publish(&self, report: &PauseReport);
}

/// Prints reports to stdout
pub struct StdoutSink {
    pub format: OutputFormat,
}

impl ReportSink for StdoutSink {
    fn publish(&self, report: &PauseReport) {
        match self.format {
            OutputFormat::Text => print!("{}", report),
            OutputFormat::Json => match serde_json::to_string(report) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!(error = %e, "Failed to serialize pause report"),
            },
        }
    }
}

impl ReportSink for mpsc::UnboundedSender<PauseReport> {
    fn publish(&self, report: &PauseReport) {
        let _ = self.send(report.clone());
    }
}
