// src/main.rs

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quiz_backend::config::Config;
use quiz_backend::routes;
use quiz_backend::seed::seed_quizzes;
use quiz_backend::state::AppState;
use quiz_backend::store::{StoreBackend, memory::MemoryBackend, postgres::PgBackend};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let backend: Arc<dyn StoreBackend> = match &config.database_url {
        Some(url) => {
            let pool = connect_with_retry(url).await;

            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Migrations applied successfully.");

            Arc::new(PgBackend::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping attempts and results in memory");
            Arc::new(MemoryBackend::new())
        }
    };

    if let Some(dir) = &config.quiz_seed_dir {
        match seed_quizzes(backend.catalog().as_ref(), Path::new(dir)).await {
            Ok(count) => tracing::info!("Loaded {} quizzes from {}", count, dir),
            Err(e) => tracing::error!("Failed to seed quizzes: {}", e),
        }
    }

    let port = config.port;
    let state = AppState::new(config, backend);
    tracing::info!("Store backend: {}", state.stores.backend_name());

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    axum::serve(listener, app).await.unwrap();
}

async fn connect_with_retry(url: &str) -> PgPool {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return pool;
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
