use std::sync::Arc;

use crate::channel::{create_registry, ChannelRegistry};
use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::directory::{MemoryRecipientDirectory, PostgresRecipientDirectory, RecipientDirectory};
use crate::error::Result;
use crate::notification::{ChannelDispatcher, NotificationTrigger};
use crate::postgres::PostgresPool;
use crate::store::{create_store, NotificationStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub postgres: Option<Arc<PostgresPool>>,
    pub connection_manager: Arc<ConnectionManager>,
    pub registry: Arc<ChannelRegistry>,
    pub dispatcher: Arc<ChannelDispatcher>,
    pub trigger: Arc<NotificationTrigger>,
}

impl AppState {
    /// Build the service, connecting to PostgreSQL when a database URL is configured
    pub async fn new(settings: Settings) -> Result<Self> {
        let postgres = match settings.database.url {
            Some(_) => {
                let pool = PostgresPool::new(&settings.database).await?;
                tracing::info!(url = %pool.database_url_masked(), "PostgreSQL pool ready");
                Some(Arc::new(pool))
            }
            None => {
                tracing::warn!("No database URL configured, using in-memory store and directory");
                None
            }
        };

        let store = create_store(postgres.clone());
        let directory: Arc<dyn RecipientDirectory> = match &postgres {
            Some(pool) => Arc::new(PostgresRecipientDirectory::new(
                pool.pool().clone(),
                &settings.database.users_table,
            )),
            None => Arc::new(MemoryRecipientDirectory::new()),
        };

        Ok(Self::with_components(settings, postgres, store, directory))
    }

    /// Build the service from an explicit store and directory
    pub fn with_components(
        settings: Settings,
        postgres: Option<Arc<PostgresPool>>,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn RecipientDirectory>,
    ) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let registry = Arc::new(create_registry(
            &settings.channels,
            connection_manager.clone(),
        ));
        let dispatcher = Arc::new(ChannelDispatcher::new(registry.clone()));
        let trigger = Arc::new(
            NotificationTrigger::new(store, directory, dispatcher.clone())
                .with_batch_size(settings.broadcast.batch_size),
        );

        Self {
            settings: Arc::new(settings),
            postgres,
            connection_manager,
            registry,
            dispatcher,
            trigger,
        }
    }

    /// Release external resources
    pub async fn close(&self) {
        if let Some(pool) = &self.postgres {
            pool.close().await;
        }
    }
}
