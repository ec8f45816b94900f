use std::sync::Arc;
use medqueue::config::StoreBackend;
use medqueue::Config;
use tokio::sync::OnceCell;

static SHARED: OnceCell<Arc<SharedTestResources>> = OnceCell::const_new();

/// Set to run the Postgres-backed tests.
pub const TEST_DATABASE_ENV: &str = "MEDQUEUE_TEST_DATABASE_URL";

pub struct SharedTestResources {
    pub base_config: Config,
}

pub async fn shared() -> anyhow::Result<Arc<SharedTestResources>> {
    SHARED
        .get_or_try_init(|| async {
            init_tracing();

            // Built-in defaults only; a developer's config file must not leak into tests
            let mut config = Config::default();
            config.database.backend = StoreBackend::Memory;
            config.database.run_migrations = false;

            // Keep tests deterministic and fast
            config.queue.issue_retry_base_ms = 1;
            config.logging.opentelemetry_enabled = false;

            Ok(Arc::new(SharedTestResources {
                base_config: config,
            }))
        })
        .await
        .cloned()
}

pub fn test_database_url() -> Option<String> {
    std::env::var(TEST_DATABASE_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

fn init_tracing() {
    use std::sync::OnceLock;
    use tracing_subscriber::prelude::*;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "medqueue=info,sqlx=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
