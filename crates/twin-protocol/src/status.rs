//! Protocol-level outcome type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known failure reasons reported by the remote side.
pub mod reasons {
    /// The remote could not parse the request envelope.
    pub const UNKNOWN_PROTOCOL: &str = "unknown protocol";
    /// Numeric code paired with [`UNKNOWN_PROTOCOL`].
    pub const UNKNOWN_PROTOCOL_CODE: i64 = 500;
    /// A record named a category the remote does not know.
    pub const UNKNOWN_DATA_CATEGORY: &str = "unknown data category";
    /// Unspecified remote-side fault.
    pub const INTERNAL_ERROR: &str = "internal error";
    /// The session's role may not touch the requested category.
    pub const UNAUTHORIZED_CATEGORY: &str = "unauthorized category";
}

/// Outcome reported by the remote side for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Status {
    /// Accepted; carries the identifiers created remotely (possibly none).
    Ok {
        #[serde(rename = "id")]
        ids: Vec<String>,
    },
    /// Rejected; the reason is always non-empty.
    Failed { reason: String },
}

impl Status {
    /// Successful outcome with the given created identifiers.
    #[must_use]
    pub fn ok(ids: Vec<String>) -> Self {
        Self::Ok { ids }
    }

    /// Failed outcome with a reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Encode to the wire object shape.
    #[must_use]
    pub fn encode(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode from a wire value.
    ///
    /// Returns `None` when the value is not shaped like a status object,
    /// including a `failed` status with an empty reason. Absence means
    /// "wrong message kind", never a fault.
    #[must_use]
    pub fn decode(value: &Value) -> Option<Self> {
        let status: Self = serde_json::from_value(value.clone()).ok()?;
        if let Self::Failed { reason } = &status {
            if reason.is_empty() {
                return None;
            }
        }
        Some(status)
    }
}
