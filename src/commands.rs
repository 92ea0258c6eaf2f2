//! CLI argument definitions
//!
//! Every flag overrides the matching setting from the config file.

use clap::Args;
use std::path::PathBuf;

use crate::common::config::{Config, OutputFormat};

#[derive(Args, Debug, Clone, Default)]
pub struct Options {
    /// Patterns to break on, pipe-delimited: "location.search|document.cookie"
    pub targets: Option<String>,

    /// DevTools host
    #[arg(long)]
    pub host: Option<String>,

    /// DevTools port (the browser's --remote-debugging-port)
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Attach to the first page whose url or title contains this text
    #[arg(long)]
    pub target: Option<String>,

    /// Connect to this WebSocket debugger url instead of discovering one
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Match patterns regardless of letter case
    #[arg(long, short)]
    pub ignore_case: bool,

    /// Resume execution right after reporting a pause
    #[arg(long)]
    pub auto_resume: bool,

    /// Search every script, not only those ending with the url pattern
    #[arg(long)]
    pub all_scripts: bool,

    /// Suffix a script url must end with to be searched (default: .js)
    #[arg(long)]
    pub url_pattern: Option<String>,

    /// Break on every occurrence within a line, not only the first
    #[arg(long)]
    pub all_occurrences: bool,

    /// Print pause reports as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List debuggable targets and exit
    #[arg(long)]
    pub list_targets: bool,

    /// Verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

impl Options {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(targets) = &self.targets {
            config.engine.set_targets_from(targets);
        }
        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if let Some(target) = &self.target {
            config.connection.target = Some(target.clone());
        }
        if let Some(ws_url) = &self.ws_url {
            config.connection.ws_url = Some(ws_url.clone());
        }
        if self.ignore_case {
            config.engine.case_sensitive = false;
        }
        if self.auto_resume {
            config.engine.auto_resume = true;
        }
        if self.all_scripts {
            config.engine.js_files_only = false;
        }
        if let Some(pattern) = &self.url_pattern {
            config.engine.url_pattern = pattern.clone();
        }
        if self.all_occurrences {
            config.engine.all_occurrences = true;
        }
        if self.json {
            config.output.format = OutputFormat::Json;
        }
    }
}
