use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidtube_server::{
    build_router,
    cli::{Cli, Commands},
    config::{ServerConfig, StoreBackend},
    media::CloudinaryMediaHost,
    state::ServerState,
    storage::{MemoryUserStore, PostgresUserStore, UserStore},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidtube_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize storage
    let user_store: Arc<dyn UserStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required for the postgres store")?;
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;

            let store = PostgresUserStore::new(pool);
            store.initialize().await?;
            info!("✅ Database connected and schema initialized");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            info!("Using in-memory user store; accounts are lost on exit");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Handle CLI commands
    match cli.command {
        Some(Commands::User(cmd)) => {
            return cmd.execute(user_store).await;
        }
        Some(Commands::Serve) | None => {
            // Continue to run server
        }
    }

    // Server mode
    info!("🚀 Starting VidTube Server v{}", VERSION);
    info!("📋 Configuration loaded:");
    info!("   Port: {}", config.port);
    info!("   Bind address: {}", config.bind_addr);
    info!("   User store: {:?}", config.store_backend);
    info!("   Access token TTL: {}s", config.access_token_ttl_seconds);
    info!("   Refresh token TTL: {}s", config.refresh_token_ttl_seconds);
    info!("   Secure cookies: {}", config.cookie_secure);
    info!("   Upload directory: {:?}", config.upload_directory);
    let media_config = config.media_host()?.clone();
    info!("   Media host: {}", media_config.base_url);

    tokio::fs::create_dir_all(&config.upload_directory).await?;

    let media_host = Arc::new(CloudinaryMediaHost::new(media_config)?);

    // Create server state
    let state = Arc::new(ServerState::new(config.clone(), user_store, media_host));

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("🎧 Listening on http://{}", addr);
    info!("🔑 Health endpoint: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
