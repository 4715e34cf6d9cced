//! Core abstractions for the citizen twin client.
//!
//! This crate provides the fundamental building blocks:
//! - `Category` / `CategoryRegistry` - telemetry classification tags
//! - `DataRecord` / `RecordValue` - typed telemetry records
//! - `AuthenticationInfo` - the logged-in operator's session data
//! - Channel, authentication and view collaborator traits

pub mod auth;
pub mod category;
pub mod record;
pub mod traits;

pub use auth::{AuthenticationInfo, RenewedToken, Role};
pub use category::{Category, CategoryRegistry};
pub use record::{DataRecord, FormatError, RecordValue};
pub use traits::{
    AuthError, AuthService, ChannelError, ChannelResponse, UserChannel, View, ViewEvent,
};
