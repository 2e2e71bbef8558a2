//! HTTP surface: API routes and their OpenAPI description.

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::errors::{ErrorBody, ErrorDetails};
use crate::handlers::{self, AppState};
use crate::models::{
    AddressPoint, CampaignAggregate, CampaignPage, CustomerPage, CustomerRecord,
    DashboardAggregate, Pagination,
};

#[derive(OpenApi)]
#[openapi(
    info(title = "CreditVision Dashboard API"),
    paths(
        handlers::list_customers,
        handlers::list_campaigns,
        handlers::dashboard,
        handlers::addresses
    ),
    components(schemas(
        CustomerRecord,
        CampaignAggregate,
        DashboardAggregate,
        AddressPoint,
        Pagination,
        CustomerPage,
        CampaignPage,
        ErrorBody,
        ErrorDetails
    ))
)]
pub struct ApiDoc;

/// The four dashboard endpoints, without rate limiting or tracing layers.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/customers", get(handlers::list_customers))
        .route("/api/campaigns", get(handlers::list_campaigns))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/addresses", get(handlers::addresses))
}

/// Swagger UI plus the generated OpenAPI document.
pub fn docs_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.json", get(serve_openapi_document))
}

async fn serve_openapi_document() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page, configured to load the generated document.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CreditVision Dashboard API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}
