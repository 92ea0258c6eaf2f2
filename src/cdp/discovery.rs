//! DevTools target discovery
//!
//! A browser started with `--remote-debugging-port` lists its debuggable
//! targets at `http://<host>:<port>/json/list`.

use crate::common::config::ConnectionConfig;
use crate::common::{Error, Result};

use super::types::TargetInfo;

/// Fetch all targets from the DevTools HTTP endpoint
pub async fn list_targets(endpoint: &str) -> Result<Vec<TargetInfo>> {
    let url = format!("{}/json/list", endpoint.trim_end_matches('/'));
    tracing::debug!(%url, "Querying DevTools targets");

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::discovery_failed(endpoint, e))?
        .error_for_status()
        .map_err(|e| Error::discovery_failed(endpoint, e))?;

    response
        .json::<Vec<TargetInfo>>()
        .await
        .map_err(|e| Error::discovery_failed(endpoint, e))
}

/// Pick the first page target matching the optional filter
///
/// The filter is a plain substring checked against both url and title.
pub fn select_target<'a>(targets: &'a [TargetInfo], filter: Option<&str>) -> Option<&'a TargetInfo> {
    targets
        .iter()
        .filter(|t| t.target_type == "page" && t.web_socket_debugger_url.is_some())
        .find(|t| match filter {
            Some(f) => t.url.contains(f) || t.title.contains(f),
            None => true,
        })
}

/// Resolve the WebSocket url to connect to
pub async fn resolve_ws_url(config: &ConnectionConfig) -> Result<String> {
    if let Some(url) = &config.ws_url {
        return Ok(url.clone());
    }

    let targets = list_targets(&config.http_endpoint()).await?;
    let target = select_target(&targets, config.target.as_deref()).ok_or_else(|| Error::NoTarget {
        filter: config.target.clone(),
    })?;

    tracing::info!(id = %target.id, url = %target.url, title = %target.title, "Selected target");
    target
        .web_socket_debugger_url
        .clone()
        .ok_or_else(|| Error::Internal("selected target has no WebSocket url".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, kind: &str, url: &str, ws: bool) -> TargetInfo {
        TargetInfo {
            id: id.to_string(),
            target_type: kind.to_string(),
            title: format!("title {id}"),
            url: url.to_string(),
            web_socket_debugger_url: ws.then(|| format!("ws://127.0.0.1:9222/devtools/page/{id}")),
        }
    }

    #[test]
    fn test_select_first_page() {
        let targets = vec![
            target("sw", "service_worker", "https://a.test/sw.js", true),
            target("p1", "page", "https://a.test/", true),
            target("p2", "page", "https://b.test/", true),
        ];
        assert_eq!(select_target(&targets, None).unwrap().id, "p1");
        assert_eq!(select_target(&targets, Some("b.test")).unwrap().id, "p2");
        assert_eq!(select_target(&targets, Some("title p2")).unwrap().id, "p2");
        assert!(select_target(&targets, Some("c.test")).is_none());
    }

    #[test]
    fn test_skips_targets_already_attached() {
        // DevTools omits the WebSocket url for targets another client holds
        let targets = vec![
            target("busy", "page", "https://a.test/", false),
            target("free", "page", "https://a.test/other", true),
        ];
        assert_eq!(select_target(&targets, None).unwrap().id, "free");
    }

    #[tokio::test]
    async fn test_explicit_ws_url_skips_discovery() {
        let config = ConnectionConfig {
            ws_url: Some("ws://localhost:1/devtools/page/X".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_ws_url(&config).await.unwrap(),
            "ws://localhost:1/devtools/page/X"
        );
    }
}
