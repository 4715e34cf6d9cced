//! The session and subscription controller.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use twin_core::{
    AuthService, AuthenticationInfo, Category, CategoryRegistry, ChannelError, DataRecord,
    RecordValue, Role, UserChannel, View, ViewEvent,
};

use crate::config::SessionConfig;
use crate::refresh::{self, RefreshHandle};
use crate::registry::{ChannelFactory, ChannelRegistry};
use crate::subscriptions::SubscriptionManager;

/// Outcome of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Authenticated and accepted; carries the operator identity.
    LoggedIn(String),
    /// Credentials were valid but the granted role is not on the allow-list.
    UnsupportedRole(Role),
    /// The authentication service rejected the attempt.
    Failed(String),
    /// A session is already active; the service was not contacted.
    AlreadyLogged,
}

/// Outcome of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The whole batch was accepted in one channel call.
    Inserted,
    /// Nothing was inserted.
    Failed(String),
}

/// Session operation error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// All mutable session state, confined behind one lock.
pub(crate) struct SessionState {
    pub(crate) session: Option<AuthenticationInfo>,
    pub(crate) channels: ChannelRegistry,
    pub(crate) subscriptions: SubscriptionManager,
    pub(crate) refresh: Option<RefreshHandle>,
}

/// Client-side session and subscription controller.
///
/// Composes the channel registry, the subscription manager and the token
/// refresh loop. Every state mutation goes through the single `state`
/// lock, which replaces ad hoc shared collections; channel I/O runs
/// outside the lock, only the bookkeeping that interprets its results is
/// serialized. The refresh loop lives on its own task and never runs on
/// the serialized path.
pub struct SessionController<A, V> {
    auth: Arc<A>,
    view: Arc<V>,
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl<A, V> SessionController<A, V>
where
    A: AuthService + 'static,
    V: View + 'static,
{
    /// Create a controller around its collaborators.
    #[must_use]
    pub fn new(
        auth: Arc<A>,
        view: Arc<V>,
        factory: Arc<dyn ChannelFactory>,
        categories: CategoryRegistry,
        config: SessionConfig,
    ) -> Self {
        let channels = ChannelRegistry::new(factory, categories, config.remote_addr.clone());
        Self {
            auth,
            view,
            config,
            state: Arc::new(Mutex::new(SessionState {
                session: None,
                channels,
                subscriptions: SubscriptionManager::new(),
                refresh: None,
            })),
        }
    }

    /// Authenticate an operator and open the session.
    ///
    /// Holds the state lock across the authentication call so that the
    /// logged-in check and the session store are atomic; a second login
    /// racing the first observes `AlreadyLogged`.
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        let mut state = self.state.lock().await;
        if state.session.is_some() {
            tracing::debug!(user = username, "login ignored, session already active");
            return LoginOutcome::AlreadyLogged;
        }

        let info = match self.auth.login(username, password).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(user = username, "login failed: {e}");
                return LoginOutcome::Failed(e.to_string());
            }
        };

        if !self.config.allowed_roles.contains(&info.role) {
            tracing::warn!(user = username, role = %info.role, "role not allowed");
            return LoginOutcome::UnsupportedRole(info.role);
        }

        let user = info.user.clone();
        state.session = Some(info);
        state.refresh = Some(refresh::spawn(
            Arc::clone(&self.auth),
            Arc::clone(&self.state),
            self.config.refresh_lead,
        ));
        tracing::info!(user = %user, "logged in");
        LoginOutcome::LoggedIn(user)
    }

    /// Open a merged, unbounded stream of records for the given categories
    /// of one user.
    ///
    /// Per category, a forwarding task pipes the channel's live updates
    /// into the output; one more task reads a full state snapshot and
    /// forwards the matching records once. Snapshot and live records
    /// interleave with no ordering guarantee. The stream is not
    /// restartable; call [`Self::unsubscribe_from`] to stop it.
    ///
    /// Without an active session the view is notified with
    /// [`ViewEvent::NotLoggedIn`] and the returned stream is inert.
    pub async fn subscribe_to(
        &self,
        user: &str,
        categories: &[Category],
    ) -> UnboundedReceiverStream<DataRecord> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().await;
        let Some(session) = state.session.clone() else {
            tracing::debug!(user, "subscribe without an active session");
            self.view.show_error(ViewEvent::NotLoggedIn);
            return UnboundedReceiverStream::new(rx);
        };

        let channel = state.channels.lookup_or_create(user);
        let mut tasks = Vec::with_capacity(categories.len() + 1);

        for category in categories {
            tasks.push(self.spawn_live_forwarder(
                Arc::clone(&channel),
                session.clone(),
                category.clone(),
                user.to_string(),
                tx.clone(),
            ));
        }
        tasks.push(self.spawn_snapshot_forwarder(
            channel,
            session,
            categories.to_vec(),
            user.to_string(),
            tx,
        ));

        state.subscriptions.add_tasks(user, tasks);
        UnboundedReceiverStream::new(rx)
    }

    fn spawn_live_forwarder(
        &self,
        channel: Arc<dyn UserChannel>,
        session: AuthenticationInfo,
        category: Category,
        user: String,
        tx: mpsc::UnboundedSender<DataRecord>,
    ) -> tokio::task::JoinHandle<()> {
        let view = Arc::clone(&self.view);
        tokio::spawn(async move {
            match channel.observe_state(&session, &category).await {
                Ok(mut live) => {
                    while let Some(record) = live.next().await {
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(user = %user, category = %category, "live subscription failed: {e}");
                    view.show_error(ViewEvent::SubscriptionFailed {
                        user,
                        reason: e.reason(),
                    });
                }
            }
        })
    }

    fn spawn_snapshot_forwarder(
        &self,
        channel: Arc<dyn UserChannel>,
        session: AuthenticationInfo,
        categories: Vec<Category>,
        user: String,
        tx: mpsc::UnboundedSender<DataRecord>,
    ) -> tokio::task::JoinHandle<()> {
        let view = Arc::clone(&self.view);
        tokio::spawn(async move {
            match channel.read_state(&session).await {
                Ok(records) => {
                    for record in records {
                        if !categories.contains(&record.category) {
                            continue;
                        }
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(user = %user, "state snapshot failed: {e}");
                    view.show_error(ViewEvent::SubscriptionFailed {
                        user,
                        reason: e.reason(),
                    });
                }
            }
        })
    }

    /// Cancel every forwarding task for the user and evict the cached
    /// channel. Silent no-op when nothing is registered.
    pub async fn unsubscribe_from(&self, user: &str) {
        let mut state = self.state.lock().await;
        state.subscriptions.cancel_all(user);
        state.channels.evict(user);
    }

    /// Format and insert a batch of raw values, one record per
    /// `(values, category)` pair.
    ///
    /// Any formatting failure aborts the whole batch before the channel is
    /// touched; on success the batch travels in a single channel call.
    pub async fn add_new_data(
        &self,
        inputs: Vec<(Vec<String>, Category)>,
        user: &str,
    ) -> InsertOutcome {
        let (session, channel, records) = {
            let mut state = self.state.lock().await;
            let Some(session) = state.session.clone() else {
                tracing::debug!(user, "insert without an active session");
                return InsertOutcome::Failed("not logged in".to_string());
            };

            let timestamp = now_millis();
            let mut records = Vec::with_capacity(inputs.len());
            for (raw, category) in inputs {
                match RecordValue::format(&category, &raw) {
                    Ok(value) => records.push(DataRecord {
                        feeder: session.user.clone(),
                        timestamp,
                        value,
                        category,
                        id: String::new(),
                    }),
                    Err(e) => {
                        tracing::warn!(user, "batch aborted: {e}");
                        return InsertOutcome::Failed(e.to_string());
                    }
                }
            }

            (session, state.channels.lookup_or_create(user), records)
        };

        match channel.update_state(&session, &records).await {
            Ok(()) => InsertOutcome::Inserted,
            Err(e) => {
                tracing::warn!(user, "insert rejected: {e}");
                InsertOutcome::Failed(e.reason())
            }
        }
    }

    /// Read up to `limit` historical records for one category, ascending
    /// by timestamp.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] without an active session,
    /// [`SessionError::Channel`] when the channel reports a failure; both
    /// are also surfaced to the view.
    pub async fn request_history(
        &self,
        user: &str,
        category: &Category,
        limit: usize,
    ) -> Result<Vec<DataRecord>, SessionError> {
        let (session, channel) = {
            let mut state = self.state.lock().await;
            let Some(session) = state.session.clone() else {
                tracing::debug!(user, "history without an active session");
                self.view.show_error(ViewEvent::NotLoggedIn);
                return Err(SessionError::NotLoggedIn);
            };
            (session, state.channels.lookup_or_create(user))
        };

        match channel.read_history(&session, category, limit).await {
            Ok(mut records) => {
                records.sort_by_key(|r| r.timestamp);
                // The remote promised at most `limit`; enforce it anyway.
                records.truncate(limit);
                Ok(records)
            }
            Err(e) => {
                tracing::warn!(user, category = %category, "history failed: {e}");
                self.view.show_error(ViewEvent::HistoryFailed { reason: e.reason() });
                Err(e.into())
            }
        }
    }

    /// Close the session: stop the refresh loop, cancel every
    /// subscription, drop all cached channels and clear the session data.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if state.session.take().is_none() {
            tracing::debug!("logout without an active session");
        }
        if let Some(refresh) = state.refresh.take() {
            refresh.stop();
        }
        state.subscriptions.cancel_everything();
        state.channels.clear();
        tracing::info!("session closed");
    }

    /// Whether a session is active.
    pub async fn is_logged_in(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// Snapshot of the current session data, when logged in.
    pub async fn current_session(&self) -> Option<AuthenticationInfo> {
        self.state.lock().await.session.clone()
    }
}
