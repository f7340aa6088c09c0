//! JSON-RPC 2.0 request and response envelopes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::RpcError;

/// Protocol tag carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved method name whose parameters are themselves requests.
pub const SEQUENCE_METHOD: &str = "sequence";

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Accept a missing or `null` params member as an empty list.
fn params_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A single call: `{ jsonrpc, id, method, params }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Opaque caller token, echoed back verbatim.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Parse a raw body.
    ///
    /// Bytes that are not JSON yield a parse error; JSON that does not have
    /// the request shape yields an invalid-request error.
    pub fn parse(body: &[u8]) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_slice(body).map_err(RpcError::parse_error)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        serde_json::from_value(value).map_err(RpcError::invalid_request)
    }

    pub fn is_sequence(&self) -> bool {
        self.method == SEQUENCE_METHOD
    }

    /// The sub-requests of a `sequence` call, still undecoded.
    ///
    /// Both `params: [[r1, r2]]` and `params: [r1, r2]` are accepted.
    pub fn sequence_items(&self) -> &[Value] {
        match self.params.as_slice() {
            [Value::Array(items)] => items,
            other => other,
        }
    }
}

/// Whether a response carries a result or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

/// `{ jsonrpc, id, result }` or `{ jsonrpc, id, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    pub fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(err) => Self::failure(id, err),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(err) => Some(err),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// The wire form as a JSON value. Infallible, unlike `serde_json::to_value`.
    pub fn into_value(self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".into(), Value::String(self.jsonrpc));
        obj.insert("id".into(), self.id);
        match self.outcome {
            Outcome::Result(value) => obj.insert("result".into(), value),
            Outcome::Error(err) => obj.insert("error".into(), err.into_value()),
        };
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::{INVALID_REQUEST, PARSE_ERROR};

    #[test]
    fn minimal_request_gets_defaults() {
        let req = RpcRequest::parse(br#"{"method":"ping"}"#).unwrap();
        assert_eq!(req.jsonrpc, "2.0");
        assert_eq!(req.id, Value::Null);
        assert!(req.params.is_empty());
    }

    #[test]
    fn null_params_are_empty() {
        let req = RpcRequest::parse(br#"{"method":"ping","params":null}"#).unwrap();
        assert!(req.params.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = RpcRequest::parse(b"{not json").unwrap_err();
        assert_eq!(err.code, PARSE_ERROR);
    }

    #[test]
    fn missing_method_is_invalid_request() {
        let err = RpcRequest::parse(br#"{"id":1,"params":[]}"#).unwrap_err();
        assert_eq!(err.code, INVALID_REQUEST);
    }

    #[test]
    fn sequence_items_accepts_both_encodings() {
        let flat = RpcRequest::new(
            json!(1),
            SEQUENCE_METHOD,
            vec![json!({"method":"ping"}), json!({"method":"ping"})],
        );
        assert_eq!(flat.sequence_items().len(), 2);

        let nested = RpcRequest::new(
            json!(1),
            SEQUENCE_METHOD,
            vec![json!([{"method":"ping"}, {"method":"ping"}, {"method":"ping"}])],
        );
        assert_eq!(nested.sequence_items().len(), 3);
    }

    #[test]
    fn success_serializes_result_member() {
        let resp = RpcResponse::success(json!(7), json!(true));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 7, "result": true}));
    }

    #[test]
    fn failure_serializes_error_member() {
        let resp = RpcResponse::failure(Value::Null, RpcError::method_not_found("bogus"));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["error"]["code"], -32601);
    }

    #[test]
    fn into_value_matches_serde() {
        let resp = RpcResponse::failure(json!("a"), RpcError::internal("boom"));
        assert_eq!(resp.clone().into_value(), serde_json::to_value(&resp).unwrap());
    }

    #[test]
    fn response_reads_back_from_wire() {
        let resp: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"x"}}"#)
                .unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.error().unwrap().code, -32000);
    }
}
