#[tokio::main]
async fn main() {
    use gatehouse_platform_access::{AuthorizationGate, GateStore, JsonFileStore};
    use gatehouse_server::{
        app::build_router,
        auth::{AppState, DiscordClient, PgStore},
        bootstrap,
        config::{ServerConfig, StoreConfig},
    };
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let store: Arc<dyn GateStore> = match &config.store {
        StoreConfig::File { path } => {
            tracing::info!(path = %path.display(), "Using JSON file store");
            Arc::new(JsonFileStore::new(path.clone()))
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let db_pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await
                .expect("failed to connect to database");

            // Run migrations
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .expect("failed to run migrations");

            Arc::new(PgStore::new(db_pool))
        }
    };

    bootstrap::apply(store.as_ref(), &config.bootstrap)
        .await
        .expect("failed to apply bootstrap configuration");

    // Cleanup expired sessions on startup
    match store.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    // Spawn periodic session cleanup task
    let cleanup_store = store.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_store.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    let discord_client =
        DiscordClient::new(config.discord).expect("failed to create Discord client");
    tracing::info!(
        api_base = %discord_client.config().api_base(),
        flow = ?discord_client.config().flow(),
        "Discord client ready"
    );

    let gate = AuthorizationGate::new(
        Arc::new(discord_client),
        store,
        chrono::Duration::minutes(config.session.duration_minutes),
    );
    let app_state = Arc::new(AppState::new(gate, config.session));
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .expect("server error");
}
