//! JSON-RPC 2.0 framing
//!
//! Request bodies and response decoding, kept apart from the transport so
//! they can be exercised without a running registry.

use lighthouse_core::TrieEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lists every claim in the name trie
pub const METHOD_GET_NAMETRIE: &str = "get_nametrie";

/// Resolves the metadata published under a name
pub const METHOD_RESOLVE_NAME: &str = "resolve_name";

/// Why a call did not produce a result
#[derive(Debug, thiserror::Error)]
pub enum RpcFailure {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("registry returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("registry error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }

    pub fn get_nametrie(id: u64) -> Self {
        Self::new(id, METHOD_GET_NAMETRIE, None)
    }

    /// `resolve_name` takes a single keyword object: `[{"name": ...}]`
    pub fn resolve_name(id: u64, name: &str) -> Self {
        Self::new(
            id,
            METHOD_RESOLVE_NAME,
            Some(serde_json::json!([{ "name": name }])),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Extract the `result` member of a response body
///
/// An `error` member wins over `result`. A body with neither is malformed;
/// an explicit `"result": null` is returned as `Value::Null`.
pub fn decode_response(body: &[u8]) -> Result<Value, RpcFailure> {
    let raw: Value =
        serde_json::from_slice(body).map_err(|e| RpcFailure::Malformed(e.to_string()))?;
    let has_result = raw.get("result").is_some();

    let response: RpcResponse =
        serde_json::from_value(raw).map_err(|e| RpcFailure::Malformed(e.to_string()))?;

    if let Some(err) = response.error {
        return Err(RpcFailure::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    match response.result {
        Some(result) => Ok(result),
        None if has_result => Ok(Value::Null),
        None => Err(RpcFailure::Malformed("missing result".to_string())),
    }
}

/// Decode a `get_nametrie` result into trie entries
///
/// Every element needs string `name` and `txid` members; any other members
/// are kept on the entry untouched.
pub fn parse_nametrie(result: Value) -> Result<Vec<TrieEntry>, RpcFailure> {
    let Value::Array(items) = result else {
        return Err(RpcFailure::Malformed("name trie is not an array".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item)
                .map_err(|e| RpcFailure::Malformed(format!("trie entry {}: {}", i, e)))
        })
        .collect()
}
