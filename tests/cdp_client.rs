//! CDP client tests against an in-process WebSocket server

use std::time::Duration;

use autobreak::cdp::{BreakpointId, CdpClient, Event};
use autobreak::{DebuggerProtocol, Error};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// What the fake DevTools endpoint does with one command
enum Reply {
    /// Frames to send back, in order
    Frames(Vec<Value>),
    /// Drop the connection without answering
    Hangup,
}

/// Serve a single WebSocket connection; returns its url
async fn serve(handler: fn(&Value) -> Reply) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            let Message::Text(text) = frame else {
                continue;
            };
            let request: Value = serde_json::from_str(&text).unwrap();
            match handler(&request) {
                Reply::Frames(frames) => {
                    for frame in frames {
                        ws.send(Message::Text(frame.to_string())).await.unwrap();
                    }
                }
                Reply::Hangup => return,
            }
        }
    });

    format!("ws://{}/devtools/page/TEST", addr)
}

fn ok(request: &Value, result: Value) -> Value {
    json!({ "id": request["id"], "result": result })
}

fn devtools(request: &Value) -> Reply {
    let frames = match request["method"].as_str().unwrap() {
        "Debugger.enable" => vec![
            json!({
                "method": "Debugger.scriptParsed",
                "params": { "scriptId": "31", "url": "https://a.test/app.js", "startLine": 0 }
            }),
            ok(request, json!({ "debuggerId": "d1" })),
        ],
        "Debugger.searchInContent" => {
            assert_eq!(request["params"]["isRegex"], false);
            vec![ok(
                request,
                json!({ "result": [{ "lineNumber": 3, "lineContent": "let x = foo(bar);" }] }),
            )]
        }
        "Debugger.setBreakpointByUrl" => {
            let p = &request["params"];
            let id = format!("1:{}:{}:{}", p["lineNumber"], p["columnNumber"], p["url"].as_str().unwrap());
            vec![ok(request, json!({ "breakpointId": id, "locations": [] }))]
        }
        "Debugger.evaluateOnCallFrame" => vec![ok(
            request,
            json!({
                "result": { "type": "object", "subtype": "error", "description": "ReferenceError: nope is not defined" },
                "exceptionDetails": {
                    "exceptionId": 1, "text": "Uncaught", "lineNumber": 0, "columnNumber": 0,
                    "exception": { "type": "object", "subtype": "error", "description": "ReferenceError: nope is not defined" }
                }
            }),
        )],
        "Debugger.removeBreakpoint" => vec![json!({
            "id": request["id"],
            "error": { "code": -32000, "message": "Breakpoint not found" }
        })],
        "Debugger.resume" => return Reply::Hangup,
        _ => vec![ok(request, json!({}))],
    };
    Reply::Frames(frames)
}

#[tokio::test]
async fn test_requests_and_events() {
    let url = serve(devtools).await;
    let mut client = CdpClient::connect(&url).await.unwrap();
    let mut events = client.take_event_receiver().unwrap();
    assert!(client.take_event_receiver().is_none());

    client.enable_debugger().await.unwrap();
    client.enable_runtime().await.unwrap();

    match tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap() {
        Some(Event::ScriptParsed(script)) => {
            assert_eq!(script.script_id, "31");
            assert_eq!(script.url, "https://a.test/app.js");
        }
        other => panic!("Expected ScriptParsed, got {other:?}"),
    }

    let matches = client.search_in_content("31", "foo", true).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].line, 3);
    assert_eq!(matches[0].column, None);

    let id = client
        .set_breakpoint_by_url("https://a.test/app.js", 3, 8)
        .await
        .unwrap();
    assert_eq!(id, BreakpointId("1:3:8:https://a.test/app.js".to_string()));
}

#[tokio::test]
async fn test_error_responses() {
    let url = serve(devtools).await;
    let client = CdpClient::connect(&url).await.unwrap();

    match client.remove_breakpoint(&BreakpointId("x".to_string())).await {
        Err(Error::RequestFailed { method, code, message }) => {
            assert_eq!(method, "Debugger.removeBreakpoint");
            assert_eq!(code, -32000);
            assert_eq!(message, "Breakpoint not found");
        }
        other => panic!("Expected RequestFailed, got {other:?}"),
    }

    match client.evaluate_on_call_frame("frame-0", "nope").await {
        Err(Error::EvaluationThrew(message)) => {
            assert_eq!(message, "ReferenceError: nope is not defined")
        }
        other => panic!("Expected EvaluationThrew, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hangup_fails_pending_request() {
    let url = serve(devtools).await;
    let client = CdpClient::connect(&url).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), client.resume())
        .await
        .unwrap();
    assert!(matches!(result, Err(Error::SessionClosed)));

    // Reader notices the dropped socket
    for _ in 0..100 {
        if !client.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let url = serve(devtools).await;
    let client = CdpClient::connect(&url).await.unwrap();

    client.close().await.unwrap();
    assert!(!client.is_connected());
    client.close().await.unwrap();

    assert!(matches!(
        client.enable_runtime().await,
        Err(Error::SessionClosed)
    ));
}

#[tokio::test]
async fn test_connect_failure() {
    // Bind then drop to get a port nobody listens on
    let port = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let result = CdpClient::connect(&format!("ws://127.0.0.1:{port}/devtools/page/X")).await;
    assert!(matches!(result, Err(Error::ConnectFailed { .. })));
}
