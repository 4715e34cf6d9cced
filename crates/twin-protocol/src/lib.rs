//! Wire protocol for the citizen twin client.
//!
//! Three message envelopes travel as JSON text frames:
//! - Request: `{"id": <int>, "value": <array>}`
//! - Response: `{"id": <int>, "value": <StatusJson>}`
//! - Update: `{"updated": <object>}`
//!
//! plus the `Status` outcome type carried by responses. `WireClient` drives
//! the codec over an abstract frame transport, correlating requests with
//! responses and fanning out updates.

pub mod message;
pub mod status;
pub mod wire;

pub use message::ProtocolMessage;
pub use status::{Status, reasons};
pub use wire::{FrameTransport, WireClient};
