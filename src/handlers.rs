use crate::config::Config;
use crate::errors::{ApiFailure, ApiResultExt, ErrorBody};
use crate::models::*;
use crate::pagination::{PageRequest, DEFAULT_CAMPAIGN_LIMIT, DEFAULT_CUSTOMER_LIMIT};
use crate::reporting::ReportService;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Query layer plus coordinate resolver.
    pub reports: ReportService,
}

/// Health check endpoint.
///
/// Returns the service status and version. Does not touch the database.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/customers
///
/// Paginated customer listing, optionally filtered by a name substring.
#[utoipa::path(
    get,
    path = "/api/customers",
    params(CustomerQueryParams),
    responses(
        (status = 200, description = "Page of customer records", body = CustomerPage),
        (status = 500, description = "Query failed", body = ErrorBody)
    )
)]
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Paginated<CustomerRecord>>, ApiFailure> {
    let params = CustomerQueryParams::from_pairs(&pairs);
    let page = PageRequest::from_query(
        params.page.as_deref(),
        params.limit.as_deref(),
        DEFAULT_CUSTOMER_LIMIT,
        state.config.max_page_size,
    );

    let result = state
        .reports
        .list_customers(page, params.search.as_deref())
        .await
        .or_api_failure("Failed to fetch customers", state.config.mode)?;

    Ok(Json(result))
}

/// GET /api/campaigns
///
/// Per-campaign aggregates, paginated over campaigns.
#[utoipa::path(
    get,
    path = "/api/campaigns",
    params(CampaignQueryParams),
    responses(
        (status = 200, description = "Page of campaign aggregates", body = CampaignPage),
        (status = 500, description = "Query failed", body = ErrorBody)
    )
)]
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Paginated<CampaignAggregate>>, ApiFailure> {
    let params = CampaignQueryParams::from_pairs(&pairs);
    let page = PageRequest::from_query(
        params.page.as_deref(),
        params.limit.as_deref(),
        DEFAULT_CAMPAIGN_LIMIT,
        state.config.max_page_size,
    );

    let result = state
        .reports
        .list_campaign_stats(page)
        .await
        .or_api_failure("Failed to fetch campaign statistics", state.config.mode)?;

    Ok(Json(result))
}

/// GET /api/dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Global statistics", body = DashboardAggregate),
        (status = 500, description = "Query failed", body = ErrorBody)
    )
)]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardAggregate>, ApiFailure> {
    let stats = state
        .reports
        .dashboard_stats()
        .await
        .or_api_failure("Failed to fetch dashboard statistics", state.config.mode)?;

    Ok(Json(stats))
}

/// GET /api/addresses
///
/// Up to 500 addresses with approximate coordinates for the heatmap.
#[utoipa::path(
    get,
    path = "/api/addresses",
    responses(
        (status = 200, description = "Addresses with coordinates", body = [AddressPoint]),
        (status = 500, description = "Query failed", body = ErrorBody)
    )
)]
pub async fn addresses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AddressPoint>>, ApiFailure> {
    let points = state
        .reports
        .address_points()
        .await
        .or_api_failure("Failed to fetch address data", state.config.mode)?;

    tracing::info!("Returning {} address points", points.len());
    Ok(Json(points))
}
