use std::sync::Arc;

use anyhow::Result;
use matchday_auth::TokenVerifier;
use matchday_chat::{ChatRegistry, ChatSocketState, MessageRouter};
use matchday_config::AppConfig;
use matchday_database::{initialize_database, ConversationRepository, NotificationRepository};
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the server binary needs, wired together once at startup.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub verifier: Arc<TokenVerifier>,
    pub registry: Arc<ChatRegistry>,
    pub router: Arc<MessageRouter>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database).await?;

        let verifier = Arc::new(TokenVerifier::new(&config.auth.jwt_secret));
        let registry = Arc::new(ChatRegistry::new());
        let router = Arc::new(MessageRouter::new(
            registry.clone(),
            ConversationRepository::new(db_pool.clone()),
            NotificationRepository::new(db_pool.clone()),
        ));

        info!("chat core ready");

        Ok(Self {
            db_pool,
            verifier,
            registry,
            router,
        })
    }

    /// State handed to the chat WebSocket routes.
    pub fn socket_state(&self) -> ChatSocketState {
        ChatSocketState::new(self.verifier.clone(), self.router.clone())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
