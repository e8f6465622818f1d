use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use rcvtest::AppState;
use rcvtest::api::{create_router, load_tokens};
use rcvtest::config::{Settings, StorageDriver};
use rcvtest::db::{self, MockReceiverStore, ReceiverStore, Repository};
use rcvtest::notifier::{MultiOrgDispatcher, NotifierDispatcher};
use rcvtest::observability::{AuditLogWriter, init_metrics, init_tracing};
use rcvtest::schema::SchemaRegistry;
use rcvtest::secrets::{EnvelopeSecrets, SecretsService};
use rcvtest::testing::ReceiverTestingService;

#[derive(Parser)]
#[command(name = "rcvtestd", about = "Receiver integration test service")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/rcvtest/rcvtest.yaml", env = "RCVTEST_CONFIG")]
    config: PathBuf,

    /// Override listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;

    init_tracing(
        settings.observability.log_format,
        &settings.observability.log_level,
    );
    init_metrics();

    tracing::info!(
        config = %cli.config.display(),
        auth_mode = ?settings.http.auth.mode,
        storage = ?settings.storage.driver,
        "starting rcvtestd"
    );

    let secrets: Arc<dyn SecretsService> =
        Arc::new(EnvelopeSecrets::from_env(&settings.secrets.key_env)?);

    let (receivers, pool) = match settings.storage.driver {
        StorageDriver::Postgres => {
            tracing::info!("initializing PostgreSQL receiver store");
            let connection_string = settings
                .storage
                .connection_string
                .as_deref()
                .unwrap_or_default();
            let pool =
                db::init_postgres_pool(connection_string, settings.storage.max_connections).await?;
            let repo = Repository::new(pool.clone()).with_secrets(Arc::clone(&secrets));
            (Arc::new(repo) as Arc<dyn ReceiverStore>, Some(pool))
        }
        StorageDriver::Memory => {
            tracing::warn!("using in-memory receiver store; only ad-hoc integrations can be tested");
            let store = MockReceiverStore::new().with_secrets(Arc::clone(&secrets));
            (Arc::new(store) as Arc<dyn ReceiverStore>, None)
        }
    };

    let dispatchers = Arc::new(MultiOrgDispatcher::new());
    let http_timeout = Duration::from_secs(settings.dispatch.http_timeout_seconds);
    for &org_id in &settings.dispatch.orgs {
        dispatchers
            .register(org_id, Arc::new(NotifierDispatcher::new(org_id, http_timeout)))
            .await;
    }
    tracing::info!(orgs = ?dispatchers.orgs().await, "dispatchers registered");

    let service = ReceiverTestingService::new(
        receivers,
        dispatchers,
        secrets,
        Arc::new(SchemaRegistry::builtin()),
    );

    let tokens = load_tokens(&settings.http.auth)?;
    let mut state = AppState::new(settings.clone(), service).with_tokens(tokens);
    if let Some(pool) = pool {
        state = state.with_db_pool(pool);
    }
    if let Some(path) = &settings.observability.audit_log_path {
        state = state.with_audit_log(AuditLogWriter::new(path)?);
        tracing::info!(path = %path, "audit log enabled");
    }
    let state = state.into_shared();

    let listen = cli.listen.unwrap_or_else(|| settings.http.listen.clone());
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(listen = %listen, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("rcvtestd stopped");
    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let drain_timeout = state.settings.shutdown.drain_timeout_seconds;
    tracing::info!(
        drain_timeout_seconds = drain_timeout,
        "shutdown signal received, refusing new tests while draining"
    );

    state.trigger_shutdown();

    if drain_timeout > 0 {
        tokio::time::sleep(Duration::from_secs(drain_timeout as u64)).await;
    }
}
