use std::io;
use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use widgetrank::handlers;
use widgetrank::services::{
    AdminAuth, InMemoryCatalog, InMemoryMetricStore, ItemCatalog, LeaderboardCache,
    MetricEventSource, MetricSnapshotStore, PgCatalog, PgMetricStore, Ranker, ScoreCalculator,
    ScoreWeights, TrendingJob, TrendingJobConfig, TrendingService, load_seed_file,
};
use widgetrank::{AppState, Config};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "widgetrank"
    }))
}

/// Pick Postgres or in-memory backends depending on `DATABASE_URL`
async fn build_backends(
    config: &Config,
) -> io::Result<(Arc<dyn ItemCatalog>, Arc<dyn MetricEventSource>)> {
    if let Some(database_url) = &config.database_url {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(database_url)
            .await
            .map_err(io::Error::other)?;
        info!("Database connection pool established");

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .map_err(io::Error::other)?;
        info!("Database migrations completed");

        let catalog: Arc<dyn ItemCatalog> = Arc::new(PgCatalog::new(db_pool.clone()));
        let source: Arc<dyn MetricEventSource> = Arc::new(PgMetricStore::new(db_pool));
        return Ok((catalog, source));
    }

    warn!("DATABASE_URL not set, using in-memory catalog and metric store");
    let catalog = Arc::new(InMemoryCatalog::new());
    let store = Arc::new(InMemoryMetricStore::new());

    if let Some(seed_path) = &config.seed_path {
        load_seed_file(seed_path, &catalog, &store)
            .await
            .map_err(io::Error::other)?;
    }

    let catalog: Arc<dyn ItemCatalog> = catalog;
    let source: Arc<dyn MetricEventSource> = store;
    Ok((catalog, source))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "widgetrank=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(io::Error::other)?;

    info!("Starting WidgetRank server on {}:{}", config.host, config.port);

    let (catalog, source) = build_backends(&config).await?;

    let trending = TrendingService::new(
        catalog,
        MetricSnapshotStore::new(source),
        Ranker::new(ScoreCalculator::new(
            ScoreWeights::default(),
            config.rating_aggregation,
        )),
        Arc::new(LeaderboardCache::new(config.cache_ttl())),
    );

    // Start trending recompute background job
    let trending_job = TrendingJob::new(
        trending.clone(),
        TrendingJobConfig {
            interval: config.recompute_interval(),
            enabled: true,
        },
    );
    let trending_shutdown = trending_job.start();
    info!("Trending recompute job started");

    let admin_auth = AdminAuth::from_hash(config.admin_token_hash.clone());
    if admin_auth.is_enabled() {
        info!("Admin authentication initialized");
    } else {
        warn!("ADMIN_TOKEN_HASH not set. Manual recompute will be rejected.");
    }
    let admin_auth = web::Data::new(admin_auth);

    let server_addr = format!("{}:{}", config.host, config.port);

    let app_state = web::Data::new(AppState { config, trending });

    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(admin_auth.clone())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure_trending_routes)
    })
    .bind(&server_addr)?
    .run()
    .await;

    let _ = trending_shutdown.send(true);
    result
}
