//! End-to-end demo against in-memory collaborators.
//!
//! Run with: cargo run -p session-demo

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twin_core::{
    AuthError, AuthService, AuthenticationInfo, Category, CategoryRegistry, ChannelError,
    ChannelResponse, DataRecord, RenewedToken, Role, UserChannel, View, ViewEvent,
};
use twin_session::{ChannelFactory, SessionConfig, SessionController};

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// In-memory channel: stored state plus a broadcast for live updates.
struct MemoryChannel {
    user: String,
    state: StdMutex<Vec<DataRecord>>,
    live: broadcast::Sender<DataRecord>,
}

impl MemoryChannel {
    fn new(user: &str) -> Self {
        let (live, _) = broadcast::channel(64);
        Self {
            user: user.to_string(),
            state: StdMutex::new(Vec::new()),
            live,
        }
    }
}

#[async_trait]
impl UserChannel for MemoryChannel {
    async fn get(&self, _resource: &str) -> Result<ChannelResponse, ChannelError> {
        Ok(ChannelResponse {
            code: 200,
            data: None,
        })
    }

    async fn observe_state(
        &self,
        _session: &AuthenticationInfo,
        category: &Category,
    ) -> Result<BoxStream<'static, DataRecord>, ChannelError> {
        let category = category.clone();
        Ok(BroadcastStream::new(self.live.subscribe())
            .filter_map(|r| async move { r.ok() })
            .filter(move |r| {
                let matches = r.category == category;
                async move { matches }
            })
            .boxed())
    }

    async fn read_state(
        &self,
        _session: &AuthenticationInfo,
    ) -> Result<Vec<DataRecord>, ChannelError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn update_state(
        &self,
        _session: &AuthenticationInfo,
        records: &[DataRecord],
    ) -> Result<(), ChannelError> {
        tracing::info!(user = %self.user, count = records.len(), "storing batch");
        let mut state = self.state.lock().unwrap();
        for (n, record) in records.iter().enumerate() {
            let mut record = record.clone();
            record.id = format!("{}-{}", self.user, state.len() + n);
            let _ = self.live.send(record.clone());
            state.push(record);
        }
        Ok(())
    }

    async fn read_history(
        &self,
        _session: &AuthenticationInfo,
        category: &Category,
        limit: usize,
    ) -> Result<Vec<DataRecord>, ChannelError> {
        let mut records: Vec<DataRecord> = self
            .state
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.category == *category)
            .cloned()
            .collect();
        records.truncate(limit);
        Ok(records)
    }

    async fn refresh(&self, session: &AuthenticationInfo) -> Result<String, ChannelError> {
        Ok(format!("{}-renewed", session.token))
    }
}

struct MemoryFactory;

impl ChannelFactory for MemoryFactory {
    fn create(
        &self,
        user: &str,
        _categories: &CategoryRegistry,
        remote_addr: &str,
    ) -> Arc<dyn UserChannel> {
        tracing::info!(user, remote_addr, "creating in-memory channel");
        Arc::new(MemoryChannel::new(user))
    }
}

/// Accepts any credentials and issues short-lived citizen tokens.
struct StaticAuth;

#[async_trait]
impl AuthService for StaticAuth {
    async fn login(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<AuthenticationInfo, AuthError> {
        Ok(AuthenticationInfo {
            token: "demo-token".to_string(),
            user: username.to_string(),
            role: Role::Citizen,
            expires_at: now_secs() + 3600,
        })
    }

    async fn refresh(&self, info: &AuthenticationInfo) -> Result<RenewedToken, AuthError> {
        Ok(RenewedToken {
            token: format!("{}-renewed", info.token),
            expires_at: now_secs() + 3600,
        })
    }
}

struct LogView;

impl View for LogView {
    fn show(&self) {}

    fn show_error(&self, event: ViewEvent) {
        tracing::error!(?event, "view notification");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let controller = SessionController::new(
        Arc::new(StaticAuth),
        Arc::new(LogView),
        Arc::new(MemoryFactory),
        CategoryRegistry::from_value(serde_json::json!({"categories": ["heart_rate", "position"]})),
        SessionConfig::default(),
    );

    let outcome = controller.login("ada", "secret").await;
    tracing::info!(?outcome, "login");

    let mut stream = controller
        .subscribe_to("u1", &[Category::heart_rate(), Category::position()])
        .await;
    let printer = tokio::spawn(async move {
        while let Some(record) = stream.next().await {
            tracing::info!(
                category = %record.category,
                id = %record.id,
                value = ?record.value,
                "record received"
            );
        }
    });

    // Give the forwarders a beat to attach before producing data.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = controller
        .add_new_data(
            vec![
                (vec!["80".to_string()], Category::heart_rate()),
                (
                    vec!["45.1".to_string(), "9.2".to_string()],
                    Category::position(),
                ),
                (vec!["37.2".to_string()], Category::body_temperature()),
            ],
            "u1",
        )
        .await;
    tracing::info!(?outcome, "insert");

    // Let the forwarders drain before asking for history.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let history = controller
        .request_history("u1", &Category::heart_rate(), 10)
        .await?;
    tracing::info!(count = history.len(), "history");

    controller.unsubscribe_from("u1").await;
    controller.logout().await;
    printer.await?;

    Ok(())
}
