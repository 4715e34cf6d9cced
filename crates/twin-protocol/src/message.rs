//! Message envelopes and their JSON codec.

use serde_json::{Value, json};

use crate::status::Status;

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    /// Caller-initiated request; `id` is assigned by the requester.
    Request { id: u64, value: Vec<Value> },
    /// Remote outcome for the request with the same `id`.
    Response { id: u64, status: Status },
    /// Unsolicited state push.
    Update { payload: Value },
}

impl ProtocolMessage {
    /// Encode to the wire object shape.
    #[must_use]
    pub fn encode(&self) -> Value {
        match self {
            Self::Request { id, value } => json!({"id": id, "value": value}),
            Self::Response { id, status } => json!({"id": id, "value": status.encode()}),
            Self::Update { payload } => json!({"updated": payload}),
        }
    }

    /// Encode to a text frame.
    #[must_use]
    pub fn encode_frame(&self) -> String {
        self.encode().to_string()
    }

    /// Decode a text frame.
    ///
    /// Returns `None` for anything that is not one of the three envelopes.
    /// An update whose payload also parses as a status object yields `None`
    /// as well: that shape is reserved for responses, and the ambiguity is
    /// resolved by refusing the update reading. Intentional, do not relax.
    #[must_use]
    pub fn decode_frame(frame: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(frame).ok()?;
        Self::decode(&value)
    }

    /// Decode from an already-parsed wire value. See [`Self::decode_frame`].
    #[must_use]
    pub fn decode(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        if let Some(payload) = object.get("updated") {
            if object.len() != 1 || !payload.is_object() {
                return None;
            }
            if Status::decode(payload).is_some() {
                return None;
            }
            return Some(Self::Update {
                payload: payload.clone(),
            });
        }

        let id = object.get("id")?.as_u64()?;
        let value = object.get("value")?;
        if let Some(items) = value.as_array() {
            return Some(Self::Request {
                id,
                value: items.clone(),
            });
        }
        let status = Status::decode(value)?;
        Some(Self::Response { id, status })
    }
}
