use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biolink_api::backend::{MemoryBackend, PageBackend, PgBackend};
use biolink_api::config::{ServerConfig, StoreBackend};
use biolink_api::router::build_app_router;
use biolink_api::state::AppState;
use biolink_events::{ActivityRecorder, EventBus};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "biolink_api=debug,biolink_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store_backend = config.store_backend.as_str(),
        debounce_ms = config.pipeline.debounce.as_millis() as u64,
        "Loaded server configuration",
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Store ---
    let mut recorder_handle = None;
    let backend: Arc<dyn PageBackend> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = biolink_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            biolink_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            biolink_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            // Activity log (writes every page event to the database).
            recorder_handle = Some(tokio::spawn(ActivityRecorder::run(
                pool.clone(),
                event_bus.subscribe(),
            )));

            Arc::new(PgBackend::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory page store; nothing survives a restart");
            Arc::new(MemoryBackend::new(&event_bus))
        }
    };

    // --- App state ---
    let state = AppState::new(config.clone(), backend, Arc::clone(&event_bus));
    let sessions = Arc::clone(&state.sessions);

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Pending autosaves are cancelled; saves already in flight finish.
    sessions.close_all().await;
    drop(sessions);

    // Dropping the last bus handle closes the channel and stops the recorder.
    drop(event_bus);
    if let Some(handle) = recorder_handle {
        let _ = tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), handle).await;
        tracing::info!("Activity recorder stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
