//! Trending handlers
//!
//! HTTP handlers for trending and featured widget discovery.

use actix_web::{HttpResponse, web};

use crate::AppState;
use crate::error::AppError;
use crate::models::{FeaturedResponse, RecalculateResponse, TrendingQuery};
use crate::services::{AdminCaller, TrendingService};

/// GET /api/widgets/trending
///
/// Query Parameters:
/// - period: Lookback in days (1, 7, 30). Default: 7
/// - limit: Maximum number of results (1..=50). Default: 6
///
/// Both parameters are validated before anything is computed.
pub async fn get_trending(
    state: web::Data<AppState>,
    query: web::Query<TrendingQuery>,
) -> Result<HttpResponse, AppError> {
    let period = TrendingService::parse_period(query.period.as_deref())?;
    let limit = TrendingService::parse_limit(query.limit.as_deref())?;

    let response = state.trending.get_trending(period, limit).await?;

    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/widgets/featured
pub async fn get_featured(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let featured = state.trending.get_featured().await?;

    Ok(HttpResponse::Ok().json(FeaturedResponse {
        success: true,
        featured,
    }))
}

/// POST /api/widgets/trending/calculate
///
/// Recomputes every period synchronously and swaps the cache. Admin only.
pub async fn recalculate(
    state: web::Data<AppState>,
    admin: AdminCaller,
) -> Result<HttpResponse, AppError> {
    tracing::info!("Manual trending recompute requested by admin {}", admin.fingerprint);

    let computed_at = state.trending.recalculate().await?;

    Ok(HttpResponse::Ok().json(RecalculateResponse {
        success: true,
        computed_at,
    }))
}

/// Configure trending routes
pub fn configure_trending_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/widgets")
            .route("/trending", web::get().to(get_trending))
            .route("/trending/calculate", web::post().to(recalculate))
            .route("/featured", web::get().to(get_featured)),
    );
}
