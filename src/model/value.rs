//! Values stored through a [`Context`](crate::Context).
//!
//! Everything goes over the wire as JSON text. Binary payloads are wrapped in
//! `{"isBinary": true, "bytes": [..]}` so they come back as bytes instead of
//! an array of numbers.

use serde::{ser, Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BinaryEnvelope {
    is_binary: bool,
    bytes: Vec<u8>,
}

impl Value {
    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            Value::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(json) => Some(json),
            Value::Binary(_) => None,
        }
    }

    /// Fails for JSON objects shaped exactly like the binary wrapper, since
    /// they could not be told apart from binary payloads on read.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Value::Json(json) if envelope_bytes(json).is_some() => Err(ser::Error::custom(
                "JSON value is indistinguishable from a binary payload",
            )),
            Value::Json(json) => serde_json::to_vec(json),
            Value::Binary(bytes) => serde_json::to_vec(&BinaryEnvelope {
                is_binary: true,
                bytes: bytes.clone(),
            }),
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let json: serde_json::Value = serde_json::from_slice(payload)?;

        Ok(match envelope_bytes(&json) {
            Some(bytes) => Value::Binary(bytes),
            None => Value::Json(json),
        })
    }
}

/// Bytes carried by `json` if it is exactly `{"isBinary": true, "bytes": [..]}`.
fn envelope_bytes(json: &serde_json::Value) -> Option<Vec<u8>> {
    json.get("isBinary")?;

    match serde_json::from_value::<BinaryEnvelope>(json.clone()) {
        Ok(envelope) if envelope.is_binary => Some(envelope.bytes),
        _ => None,
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Binary(bytes.to_vec())
    }
}
