//! Script observer: filters parsed scripts and fans out per pattern

use crate::cdp::types::ScriptParsedEvent;
use crate::common::config::EngineConfig;

use super::matcher;
use super::registry::{BreakpointRegistry, Placement};
use super::DebuggerProtocol;

/// A script the debugger reported; source is fetched on demand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    pub script_id: String,
    pub url: String,
}

impl ScriptDescriptor {
    pub fn new(script_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            url: url.into(),
        }
    }
}

impl From<ScriptParsedEvent> for ScriptDescriptor {
    fn from(event: ScriptParsedEvent) -> Self {
        Self {
            script_id: event.script_id,
            url: event.url,
        }
    }
}

/// Whether a script should be searched
///
/// Scripts without a url (eval, inline snippets) cannot be targeted by
/// url and are always skipped.
pub fn is_eligible(config: &EngineConfig, script: &ScriptDescriptor) -> bool {
    if script.url.is_empty() {
        return false;
    }
    !config.js_files_only || script.url.ends_with(&config.url_pattern)
}

/// Counters for one processed script
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSummary {
    pub candidates: usize,
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Candidates dropped because shutdown had started
    pub skipped: usize,
    /// Patterns whose search failed
    pub search_errors: usize,
}

/// Search an eligible script for every pattern and place breakpoints
///
/// Each pattern is handled on its own: a failed search is logged and the
/// next pattern still runs.
pub async fn process_script<P: DebuggerProtocol + ?Sized>(
    protocol: &P,
    config: &EngineConfig,
    registry: &BreakpointRegistry,
    script: &ScriptDescriptor,
) -> ScriptSummary {
    tracing::info!(url = %script.url, script_id = %script.script_id, "Script detected");
    let mut summary = ScriptSummary::default();

    for pattern in &config.targets {
        let candidates = match matcher::find_candidates(protocol, config, script, pattern).await {
            Ok(candidates) => candidates,
            Err(e) => {
                summary.search_errors += 1;
                if !e.is_already_exists() {
                    tracing::warn!(url = %script.url, pattern = %pattern, error = %e, "Search error");
                }
                continue;
            }
        };

        if !candidates.is_empty() {
            tracing::debug!(url = %script.url, pattern = %pattern, count = candidates.len(), "Match found");
        }
        summary.candidates += candidates.len();

        for candidate in &candidates {
            match registry.place(protocol, candidate).await {
                Placement::Created(_) => summary.created += 1,
                Placement::Duplicate => summary.duplicates += 1,
                Placement::Failed => summary.failed += 1,
                Placement::Closed => summary.skipped += 1,
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeDebugger};

    fn config(targets: &[&str]) -> EngineConfig {
        EngineConfig {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_suffix_filter() {
        let config = config(&["foo"]);
        assert!(is_eligible(&config, &ScriptDescriptor::new("1", "https://a.test/app.js")));
        assert!(!is_eligible(&config, &ScriptDescriptor::new("2", "https://a.test/site.css")));
        assert!(!is_eligible(&config, &ScriptDescriptor::new("3", "")));

        let all = EngineConfig {
            js_files_only: false,
            ..config
        };
        assert!(is_eligible(&all, &ScriptDescriptor::new("2", "https://a.test/site.css")));
        assert!(!is_eligible(&all, &ScriptDescriptor::new("3", "")));
    }

    #[tokio::test]
    async fn test_one_search_per_pattern() {
        let fake = FakeDebugger::new();
        fake.add_script("1", "https://a.test/app.js", "let x = foo(bar);");
        let registry = BreakpointRegistry::new();
        let script = ScriptDescriptor::new("1", "https://a.test/app.js");

        let summary = process_script(&fake, &config(&["foo", "bar", "baz"]), &registry, &script).await;

        assert_eq!(fake.count(|c| matches!(c, Call::Search { .. })), 3);
        assert_eq!(summary.candidates, 2);
        assert_eq!(summary.created, 2);
    }

    #[tokio::test]
    async fn test_failing_pattern_does_not_block_others() {
        let fake = FakeDebugger::new();
        fake.add_script("1", "https://a.test/app.js", "foo(); bar();");
        fake.fail_search_for("foo");
        let registry = BreakpointRegistry::new();
        let script = ScriptDescriptor::new("1", "https://a.test/app.js");

        let summary = process_script(&fake, &config(&["foo", "bar"]), &registry, &script).await;

        assert_eq!(summary.search_errors, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(registry.records()[0].pattern, "bar");
    }

    #[tokio::test]
    async fn test_already_exists_search_error_is_isolated() {
        let fake = FakeDebugger::new();
        fake.add_script("1", "https://a.test/app.js", "foo(); bar();");
        fake.fail_search_with("foo", "Search for this script already exists");
        let registry = BreakpointRegistry::new();
        let script = ScriptDescriptor::new("1", "https://a.test/app.js");

        let summary = process_script(&fake, &config(&["foo", "bar"]), &registry, &script).await;

        assert_eq!(fake.count(|c| matches!(c, Call::Search { .. })), 2);
        assert_eq!(summary.search_errors, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(registry.records()[0].pattern, "bar");
    }
}
