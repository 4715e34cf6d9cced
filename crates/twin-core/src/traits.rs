//! Collaborator traits: transport channel, authentication service, view.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::auth::{AuthenticationInfo, RenewedToken};
use crate::category::Category;
use crate::record::DataRecord;

/// Channel error.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The remote side reported an application-level failure.
    #[error("remote failure: {0}")]
    Remote(String),
    /// The underlying transport is gone.
    #[error("transport closed")]
    Closed,
}

impl ChannelError {
    /// Human-readable reason string for the failure.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Remote(reason) => reason.clone(),
            Self::Closed => "transport closed".to_string(),
        }
    }
}

/// Plain response to a resource fetch.
#[derive(Debug, Clone)]
pub struct ChannelResponse {
    /// Transport status code.
    pub code: u16,
    /// Response body, when present.
    pub data: Option<Value>,
}

/// Remote per-user data endpoint.
///
/// One channel exists per remote user; the session layer caches and owns
/// them. Implementations handle the transport, callers never see wire
/// payloads.
#[async_trait]
pub trait UserChannel: Send + Sync {
    /// Fetch a plain resource.
    async fn get(&self, resource: &str) -> Result<ChannelResponse, ChannelError>;

    /// Open a live stream of updates for one category.
    async fn observe_state(
        &self,
        session: &AuthenticationInfo,
        category: &Category,
    ) -> Result<BoxStream<'static, DataRecord>, ChannelError>;

    /// Read a snapshot of the full current state.
    async fn read_state(
        &self,
        session: &AuthenticationInfo,
    ) -> Result<Vec<DataRecord>, ChannelError>;

    /// Push a batch of new records.
    async fn update_state(
        &self,
        session: &AuthenticationInfo,
        records: &[DataRecord],
    ) -> Result<(), ChannelError>;

    /// Read up to `limit` historical records for one category.
    async fn read_history(
        &self,
        session: &AuthenticationInfo,
        category: &Category,
        limit: usize,
    ) -> Result<Vec<DataRecord>, ChannelError>;

    /// Renew the session token through this channel.
    async fn refresh(&self, session: &AuthenticationInfo) -> Result<String, ChannelError>;
}

/// Authentication error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials or renewal rejected by the service.
    #[error("authentication rejected: {0}")]
    Rejected(String),
    /// The service could not be reached.
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

/// Remote authentication service.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticate an operator.
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationInfo, AuthError>;

    /// Renew the token of an active session.
    async fn refresh(&self, info: &AuthenticationInfo) -> Result<RenewedToken, AuthError>;
}

/// Event surfaced to the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// An operation required an active session and none exists.
    NotLoggedIn,
    /// A history request failed with the channel's reason.
    HistoryFailed { reason: String },
    /// A subscription's forwarding failed; the output stream stays open.
    SubscriptionFailed { user: String, reason: String },
}

/// One-way view notification sink; the core never consumes a return value.
pub trait View: Send + Sync {
    /// Bring the view to the foreground.
    fn show(&self);

    /// Surface an error event.
    fn show_error(&self, event: ViewEvent);
}
