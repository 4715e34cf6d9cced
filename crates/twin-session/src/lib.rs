//! Session orchestration for the citizen twin client.
//!
//! `SessionController` composes the channel registry, the subscription
//! manager and the token refresh loop behind a single serialized state
//! lock, exposing login, subscribe/unsubscribe, insert and history
//! operations.

pub mod config;
pub mod controller;
pub mod registry;
pub mod subscriptions;

mod refresh;

pub use config::SessionConfig;
pub use controller::{InsertOutcome, LoginOutcome, SessionController, SessionError};
pub use registry::{ChannelFactory, ChannelRegistry};
pub use subscriptions::SubscriptionManager;
