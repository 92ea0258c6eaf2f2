//! Scripted in-memory debugger
//!
//! Behaves like a V8 backend for the calls the engine makes: line based
//! content search, one breakpoint per location (a second one "already
//! exists"), evaluation from a table of canned values. Every call is
//! recorded so tests can assert on what went over the wire.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cdp::types::{
    BreakpointId, CallFrame, Event, Location, PausedEvent, RemoteObject, ScriptParsedEvent,
};
use crate::common::{Error, Result};
use crate::engine::{DebuggerProtocol, LineMatch};

/// A recorded protocol call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EnableDebugger,
    EnableRuntime,
    Search {
        script_id: String,
        query: String,
        case_sensitive: bool,
    },
    SetBreakpoint {
        url: String,
        line: u32,
        column: u32,
    },
    Evaluate {
        call_frame_id: String,
        expression: String,
    },
    RemoveBreakpoint(BreakpointId),
    Resume,
    Close,
}

#[derive(Debug)]
struct State {
    calls: Vec<Call>,
    connected: bool,
    fail_enable: bool,
    /// script id -> (url, source)
    scripts: HashMap<String, (String, String)>,
    /// script id -> canned search result
    search_overrides: HashMap<String, Vec<LineMatch>>,
    /// query -> error message
    failing_searches: HashMap<String, String>,
    failing_breakpoint_lines: HashSet<u32>,
    failing_evaluations: HashSet<String>,
    failing_removals: HashSet<BreakpointId>,
    values: HashMap<String, Value>,
    /// Locations that currently hold a breakpoint
    breakpoints: HashMap<(String, u32, u32), BreakpointId>,
    next_breakpoint: u32,
}

/// In-memory [`DebuggerProtocol`] for tests
#[derive(Debug)]
pub struct FakeDebugger {
    state: Mutex<State>,
    /// Delay before answering search and breakpoint requests
    latency: Duration,
    /// Delay between placing a breakpoint and reporting its id
    breakpoint_reply_delay: Duration,
}

impl Default for FakeDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDebugger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                calls: Vec::new(),
                connected: true,
                fail_enable: false,
                scripts: HashMap::new(),
                search_overrides: HashMap::new(),
                failing_searches: HashMap::new(),
                failing_breakpoint_lines: HashSet::new(),
                failing_evaluations: HashSet::new(),
                failing_removals: HashSet::new(),
                values: HashMap::new(),
                breakpoints: HashMap::new(),
                next_breakpoint: 1,
            }),
            latency: Duration::ZERO,
            breakpoint_reply_delay: Duration::ZERO,
        }
    }

    /// Answer searches and breakpoint requests only after `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Place breakpoints at once but answer only after `delay`
    pub fn with_breakpoint_reply_delay(mut self, delay: Duration) -> Self {
        self.breakpoint_reply_delay = delay;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    // === Scripting ===

    pub fn add_script(&self, script_id: &str, url: &str, source: &str) {
        self.state()
            .scripts
            .insert(script_id.to_string(), (url.to_string(), source.to_string()));
    }

    /// `Debugger.scriptParsed` for a script added with [`Self::add_script`]
    pub fn parsed_event(&self, script_id: &str) -> Option<Event> {
        self.state()
            .scripts
            .get(script_id)
            .map(|(url, _)| Self::script_parsed(script_id, url))
    }

    /// Return these matches for any search in the script
    pub fn override_search(&self, script_id: &str, matches: Vec<LineMatch>) {
        self.state()
            .search_overrides
            .insert(script_id.to_string(), matches);
    }

    pub fn fail_enable(&self) {
        self.state().fail_enable = true;
    }

    pub fn fail_search_for(&self, query: &str) {
        self.fail_search_with(query, "Search failed");
    }

    pub fn fail_search_with(&self, query: &str, message: &str) {
        self.state()
            .failing_searches
            .insert(query.to_string(), message.to_string());
    }

    pub fn fail_breakpoints_at(&self, line: u32) {
        self.state().failing_breakpoint_lines.insert(line);
    }

    pub fn fail_evaluation(&self, expression: &str) {
        self.state()
            .failing_evaluations
            .insert(expression.to_string());
    }

    pub fn fail_removal(&self, breakpoint_id: &BreakpointId) {
        self.state().failing_removals.insert(breakpoint_id.clone());
    }

    pub fn set_value(&self, expression: &str, value: Value) {
        self.state().values.insert(expression.to_string(), value);
    }

    /// Simulate the remote end going away
    pub fn disconnect(&self) {
        self.state().connected = false;
    }

    // === Inspection ===

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Breakpoints currently placed on the fake backend
    pub fn active_breakpoints(&self) -> usize {
        self.state().breakpoints.len()
    }

    // === Event builders ===

    pub fn script_parsed(script_id: &str, url: &str) -> Event {
        Event::ScriptParsed(ScriptParsedEvent {
            script_id: script_id.to_string(),
            url: url.to_string(),
        })
    }

    pub fn paused_at(call_frame_id: &str, url: &str, line: u32, column: u32) -> Event {
        Event::Paused(PausedEvent {
            call_frames: vec![CallFrame {
                call_frame_id: call_frame_id.to_string(),
                function_name: String::new(),
                location: Location {
                    script_id: "0".to_string(),
                    line_number: line,
                    column_number: Some(column),
                },
                url: url.to_string(),
            }],
            reason: "other".to_string(),
            hit_breakpoints: Vec::new(),
        })
    }
}

fn contains(line: &str, query: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        line.contains(query)
    } else {
        line.to_lowercase().contains(&query.to_lowercase())
    }
}

#[async_trait]
impl DebuggerProtocol for FakeDebugger {
    async fn enable_debugger(&self) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::EnableDebugger);
        if state.fail_enable {
            return Err(Error::request_failed("Debugger.enable", -32601, "'Debugger.enable' wasn't found"));
        }
        Ok(())
    }

    async fn enable_runtime(&self) -> Result<()> {
        self.record(Call::EnableRuntime);
        Ok(())
    }

    async fn search_in_content(
        &self,
        script_id: &str,
        query: &str,
        case_sensitive: bool,
    ) -> Result<Vec<LineMatch>> {
        self.record(Call::Search {
            script_id: script_id.to_string(),
            query: query.to_string(),
            case_sensitive,
        });
        self.delay().await;

        let state = self.state();
        if let Some(message) = state.failing_searches.get(query) {
            return Err(Error::request_failed("Debugger.searchInContent", -32000, message));
        }
        if let Some(matches) = state.search_overrides.get(script_id) {
            return Ok(matches.clone());
        }
        let (_, source) = state.scripts.get(script_id).ok_or_else(|| {
            Error::request_failed(
                "Debugger.searchInContent",
                -32000,
                &format!("No script for id: {}", script_id),
            )
        })?;

        Ok(source
            .lines()
            .enumerate()
            .filter(|(_, line)| contains(line, query, case_sensitive))
            .map(|(i, line)| LineMatch {
                line: i as u32,
                text: line.to_string(),
                column: None,
            })
            .collect())
    }

    async fn set_breakpoint_by_url(&self, url: &str, line: u32, column: u32) -> Result<BreakpointId> {
        self.record(Call::SetBreakpoint {
            url: url.to_string(),
            line,
            column,
        });
        self.delay().await;

        let placed = {
            let mut state = self.state();
            if state.failing_breakpoint_lines.contains(&line) {
                return Err(Error::request_failed(
                    "Debugger.setBreakpointByUrl",
                    -32000,
                    "Could not resolve breakpoint",
                ));
            }
            let location = (url.to_string(), line, column);
            if state.breakpoints.contains_key(&location) {
                return Err(Error::request_failed(
                    "Debugger.setBreakpointByUrl",
                    -32000,
                    "Breakpoint at specified location already exists.",
                ));
            }
            let id = BreakpointId(format!("{}:{}:{}:{}", state.next_breakpoint, line, column, url));
            state.next_breakpoint += 1;
            state.breakpoints.insert(location, id.clone());
            id
        };

        if !self.breakpoint_reply_delay.is_zero() {
            tokio::time::sleep(self.breakpoint_reply_delay).await;
        }
        Ok(placed)
    }

    async fn evaluate_on_call_frame(&self, call_frame_id: &str, expression: &str) -> Result<RemoteObject> {
        let mut state = self.state();
        state.calls.push(Call::Evaluate {
            call_frame_id: call_frame_id.to_string(),
            expression: expression.to_string(),
        });
        if state.failing_evaluations.contains(expression) {
            return Err(Error::EvaluationThrew(format!(
                "ReferenceError: {} is not defined",
                expression
            )));
        }
        Ok(match state.values.get(expression) {
            Some(value) => RemoteObject {
                object_type: json_type(value).to_string(),
                value: Some(value.clone()),
                ..Default::default()
            },
            None => RemoteObject {
                object_type: "undefined".to_string(),
                ..Default::default()
            },
        })
    }

    async fn remove_breakpoint(&self, breakpoint_id: &BreakpointId) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::RemoveBreakpoint(breakpoint_id.clone()));
        if state.failing_removals.contains(breakpoint_id) {
            return Err(Error::request_failed(
                "Debugger.removeBreakpoint",
                -32000,
                "Breakpoint not found",
            ));
        }
        state.breakpoints.retain(|_, id| id != breakpoint_id);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record(Call::Resume);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Close);
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}
