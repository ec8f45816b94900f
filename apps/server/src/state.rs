//! Application state shared by all handlers

use anyhow::Context;
use medqueue_core::{Clock, SystemClock};
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::db::{self, InMemoryQueueStore, PostgresQueueStore, QueueStore};
use crate::services::{
    AnalyticsService, CounterService, DispatchService, DisplayService, IssuanceService,
    LoadBalancer, LoggingNotifier, NotificationDispatcher, QueueConfigService, QueueContext,
    QueueNotifier, StatusService, WaitEstimator,
};

/// Which store backs the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl From<StoreBackend> for StoreKind {
    fn from(backend: StoreBackend) -> Self {
        match backend {
            StoreBackend::Postgres => StoreKind::Postgres,
            StoreBackend::Memory => StoreKind::Memory,
        }
    }
}

/// Overrides for [`AppState::with_options`]; `None` fields take the production default.
#[derive(Debug, Clone)]
pub struct AppStateOptions {
    pub store: StoreKind,
    pub clock: Option<Arc<dyn Clock>>,
    pub notifier: Option<Arc<dyn QueueNotifier>>,
}

impl AppStateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store: config.database.backend.into(),
            clock: None,
            notifier: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn QueueStore>,

    pub issuance: IssuanceService,
    pub dispatch: DispatchService,
    pub display: DisplayService,
    pub status: StatusService,
    pub analytics: AnalyticsService,
    pub counters: CounterService,
    pub queue_configs: QueueConfigService,
}

impl AppState {
    /// Build the state described by `config`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let options = AppStateOptions::from_config(&config);
        Self::with_options(config, options).await
    }

    pub async fn with_options(config: Config, options: AppStateOptions) -> anyhow::Result<Self> {
        let store: Arc<dyn QueueStore> = match options.store {
            StoreKind::Postgres => {
                let pool = db::create_pool(&config.database)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                if config.database.run_migrations {
                    db::run_migrations(&pool)
                        .await
                        .context("Failed to run database migrations")?;
                }
                Arc::new(PostgresQueueStore::new(pool))
            }
            StoreKind::Memory => {
                tracing::warn!("Using the in-memory queue store; state is lost on restart");
                Arc::new(InMemoryQueueStore::new())
            }
        };

        let clock = options.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let notifier = options
            .notifier
            .unwrap_or_else(|| Arc::new(LoggingNotifier));

        Ok(Self::assemble(config, store, clock, notifier))
    }

    fn assemble(
        config: Config,
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn QueueNotifier>,
    ) -> Self {
        let ctx = QueueContext::new(store.clone(), clock, config.queue.clone());

        let queue_configs = QueueConfigService::new(ctx.clone());
        let estimator = WaitEstimator::new(ctx.clone(), queue_configs.clone());
        let balancer = LoadBalancer::new(ctx.clone());
        let analytics = AnalyticsService::new(ctx.clone());
        let notifications = NotificationDispatcher::spawn(notifier);

        Self {
            issuance: IssuanceService::new(
                ctx.clone(),
                queue_configs.clone(),
                estimator.clone(),
                balancer,
                analytics.clone(),
            ),
            dispatch: DispatchService::new(ctx.clone(), analytics.clone(), notifications),
            display: DisplayService::new(ctx.clone()),
            status: StatusService::new(ctx.clone(), queue_configs.clone(), estimator),
            counters: CounterService::new(ctx),
            analytics,
            queue_configs,
            config: Arc::new(config),
            store,
        }
    }
}
