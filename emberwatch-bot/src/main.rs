use emberwatch_bot::config::Config;
use emberwatch_bot::create_app;
use emberwatch_bot::discord::DiscordMessages;
use emberwatch_bot::panel::PanelClient;
use emberwatch_bot::reconciler::{Reconciler, ReconcilerConfig};
use emberwatch_db::Database;
use serenity::http::Http;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Emberwatch...");

    // Load configuration from environment variables or use defaults
    let config = Config::from_env();
    tracing::info!(
        "Configuration: port={}, db_path={}, tick={}s, refresh={}s, retention_days={}",
        config.port,
        config.database_path,
        config.tick_interval.as_secs(),
        config.refresh_interval.as_secs(),
        config.sample_retention_days,
    );

    let db = Database::open(&config.database_path).await.unwrap();

    let panel = PanelClient::new(
        config.panel_base_url.as_deref().unwrap(),
        config.panel_api_key.as_deref().unwrap(),
        config.panel_timeout,
    )
    .expect("Error building panel client");

    // Fail fast on a bad panel URL or API key before touching Discord
    match panel.server_count().await {
        Ok(count) => tracing::info!("Panel reachable, {} servers visible", count),
        Err(err) => {
            tracing::error!("Panel check failed: {}", err);
            std::process::exit(1);
        }
    }

    let http = Arc::new(Http::new(config.discord_token.as_deref().unwrap()));
    let bot_user = http
        .get_current_user()
        .await
        .expect("Error validating Discord token");
    tracing::info!("Logged in as {}", bot_user.name);

    let messages = DiscordMessages::new(Arc::clone(&http), bot_user.id);
    let reconciler = Reconciler::new(
        db.clone(),
        messages,
        panel,
        ReconcilerConfig::new(&config),
    );

    let app = create_app(db, config.request_timeout);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.unwrap();
    tracing::info!("Introspection server listening on {}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        _ = reconciler.run() => {
            tracing::error!("Reconciler loop exited");
        }
    }
}
