use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradekey::artifact::{ArtifactCodec, ArtifactStore};
use tradekey::config::Config;
use tradekey::db::{AppState, create_pool, init_db, queries};
use tradekey::handlers;
use tradekey::models::{CreateProduct, PurchaseCompleted};

#[derive(Parser, Debug)]
#[command(name = "tradekey")]
#[command(about = "Licensing core for a trading-product marketplace")]
struct Cli {
    /// Seed the database with dev data (product and a sample license)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing: one product and one
/// perpetual license. Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let mut conn = state
        .db
        .get()
        .expect("Failed to get db connection for seeding");

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
        .expect("Failed to count products");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let product = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Dev Trading Robot".to_string(),
            max_activations: 2,
        },
    )
    .expect("Failed to create dev product");

    let license = queries::issue_license(
        &mut conn,
        &PurchaseCompleted {
            transaction_id: "dev-txn-1".to_string(),
            user_id: "dev-user".to_string(),
            product_id: product.id.clone(),
            is_rental: false,
            rental_duration_days: None,
        },
    )
    .expect("Failed to issue dev license");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED");
    tracing::info!("Product: {} (id: {})", product.name, product.id);
    tracing::info!("License: {}", license.license_id);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradekey=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        codec: ArtifactCodec::new(config.signing_key.as_bytes()),
        artifacts: ArtifactStore::new(&config.artifacts_dir),
        webhook_secret: config.webhook_secret.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set TRADEKEY_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router(
            config.rate_limit_standard_rpm,
            config.rate_limit_relaxed_rpm,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Tradekey server listening on {}", addr);

    // Connect info enables the per-IP rate limiter's key extractor.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
