use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creditvision_dashboard::api;
use creditvision_dashboard::config::{Config, REQUEST_TIMEOUT};
use creditvision_dashboard::db::Database;
use creditvision_dashboard::db_storage::ReportStorage;
use creditvision_dashboard::geocoding::{
    coordinate_cache, BatchPolicy, CoordinateResolver, Geocoder,
};
use creditvision_dashboard::handlers::{self, AppState};
use creditvision_dashboard::reporting::ReportService;
use creditvision_dashboard::services::ZippopotamService;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection pool.
/// - ZIP coordinate cache and geocoding client.
/// - HTTP routes and middleware (CORS, Rate Limiting, Timeouts).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creditvision_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database).await?;
    tracing::info!(
        "Database connection pool established ({} connections max)",
        config.database.max_connections
    );

    // ZIP -> coordinate cache, lives for the whole process
    let cache = coordinate_cache(config.geocoder.cache_capacity);
    tracing::info!(
        "Coordinate cache initialized ({} capacity)",
        config.geocoder.cache_capacity
    );

    let geocoder: Option<Arc<dyn Geocoder>> = if config.geocoder.enabled {
        match ZippopotamService::new(&config.geocoder) {
            Ok(client) => {
                tracing::info!("✓ Geocoding client initialized: {}", config.geocoder.base_url);
                Some(Arc::new(client) as Arc<dyn Geocoder>)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to initialize geocoding client, using offline fallback: {}",
                    e
                );
                None
            }
        }
    } else {
        tracing::info!("Geocoding disabled, using offline ZIP fallback only");
        None
    };

    let resolver = Arc::new(CoordinateResolver::new(
        cache,
        geocoder,
        BatchPolicy {
            batch_size: config.geocoder.batch_size,
            batch_delay: config.geocoder.batch_delay,
            deadline: config.geocoder.batch_deadline,
        },
    ));

    let store = Arc::new(ReportStorage::new(
        db.pool.clone(),
        config.database.query_timeout,
    ));

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        reports: ReportService::new(store, resolver),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = api::routes().layer(
        ServiceBuilder::new()
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .merge(api::docs_routes())
        .with_state(app_state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
