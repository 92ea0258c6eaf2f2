//! CDP wire codec
//!
//! Each WebSocket text frame carries one JSON object:
//! ```text
//! command:      {"id": 1, "method": "Debugger.enable", "params": {}}
//! response:     {"id": 1, "result": {...}}  or  {"id": 1, "error": {"code": -32000, "message": "..."}}
//! notification: {"method": "Debugger.paused", "params": {...}}
//! ```

use serde_json::Value;

use crate::common::Error;

use super::types::{RequestMessage, RpcError};

/// Decoded incoming frame
#[derive(Debug)]
pub enum Incoming {
    Response {
        id: u64,
        outcome: Result<Value, RpcError>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

/// Encode a command frame
pub fn encode_request(id: u64, method: &str, params: &Value) -> Result<String, Error> {
    Ok(serde_json::to_string(&RequestMessage { id, method, params })?)
}

/// Decode one incoming frame
pub fn decode_message(text: &str) -> Result<Incoming, Error> {
    let mut msg: Value =
        serde_json::from_str(text).map_err(|e| Error::Protocol(format!("Invalid JSON: {}", e)))?;

    if let Some(id) = msg.get("id") {
        let id = id
            .as_u64()
            .ok_or_else(|| Error::Protocol(format!("Invalid message id: {}", id)))?;

        if let Some(error) = msg.get_mut("error") {
            let error: RpcError = serde_json::from_value(error.take())
                .map_err(|e| Error::Protocol(format!("Invalid error object: {}", e)))?;
            return Ok(Incoming::Response {
                id,
                outcome: Err(error),
            });
        }

        let result = msg
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null);
        return Ok(Incoming::Response {
            id,
            outcome: Ok(result),
        });
    }

    match msg.get("method").and_then(Value::as_str) {
        Some(method) => {
            let method = method.to_string();
            let params = msg
                .get_mut("params")
                .map(Value::take)
                .unwrap_or(Value::Null);
            Ok(Incoming::Notification { method, params })
        }
        None => Err(Error::Protocol(
            "Message has neither id nor method".to_string(),
        )),
    }
}
