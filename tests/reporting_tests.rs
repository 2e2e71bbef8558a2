/// Reporting and HTTP tests over an in-memory store
/// Exercises pagination, search, campaign grouping, dashboard buckets and the error envelope
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;

use common::{customer, sample_rows, MemoryStore};
use creditvision_dashboard::api;
use creditvision_dashboard::config::Config;
use creditvision_dashboard::db_storage::ReportStore;
use creditvision_dashboard::errors::AppError;
use creditvision_dashboard::geocoding::{
    coordinate_cache, fallback_coordinate, BatchPolicy, Coordinate, CoordinateResolver, Geocoder,
    PostalCode,
};
use creditvision_dashboard::handlers::AppState;
use creditvision_dashboard::pagination::PageRequest;
use creditvision_dashboard::reporting::{ReportService, ADDRESS_SAMPLE_LIMIT};

fn service(store: MemoryStore) -> ReportService {
    let store: Arc<dyn ReportStore> = Arc::new(store);
    let resolver = Arc::new(CoordinateResolver::offline(coordinate_cache(1_000)));
    ReportService::new(store, resolver)
}

fn test_config(app_env: &str) -> Config {
    let env = app_env.to_string();
    Config::from_lookup(move |key| match key {
        "DATABASE_URL" => Some("mysql://reporter@localhost/CreditVision".to_string()),
        "APP_ENV" => Some(env.clone()),
        "GEOCODER_ENABLED" => Some("false".to_string()),
        _ => None,
    })
    .expect("test config")
}

fn app(store: MemoryStore, app_env: &str) -> axum::Router {
    let state = Arc::new(AppState {
        config: test_config(app_env),
        reports: service(store),
    });
    api::routes().with_state(state)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_customer_pages_cover_every_row_once() {
    let reports = service(MemoryStore::new(sample_rows(125, 7)));

    let mut seen = Vec::new();
    for page in 1..=3 {
        let result = reports
            .list_customers(PageRequest::new(page, 50), None)
            .await
            .unwrap();
        assert_eq!(result.pagination.total, 125);
        assert_eq!(result.pagination.total_pages, 3);
        assert!(result.data.len() <= 50);
        seen.extend(result.data.into_iter().map(|r| r.id));
    }

    assert_eq!(seen, (1..=125).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let reports = service(MemoryStore::new(sample_rows(10, 2)));

    let result = reports
        .list_customers(PageRequest::new(5, 50), None)
        .await
        .unwrap();

    assert!(result.data.is_empty());
    assert_eq!(result.pagination.total, 10);
    assert_eq!(result.pagination.total_pages, 1);
}

#[tokio::test]
async fn test_search_is_case_insensitive_over_full_name() {
    let rows = vec![
        customer(1, ("John", None, "Smith"), "a.csv", Some(40), Some(650), "100.00"),
        customer(2, ("Jane", Some("Ann"), "Smithers"), "a.csv", Some(25), Some(720), "50.00"),
        customer(3, ("Carlos", None, "Diaz"), "b.csv", Some(61), Some(580), "10.00"),
    ];
    let reports = service(MemoryStore::new(rows));

    let result = reports
        .list_customers(PageRequest::new(1, 50), Some("SMITH"))
        .await
        .unwrap();
    let ids: Vec<i64> = result.data.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(result.pagination.total, 2);

    let result = reports
        .list_customers(PageRequest::new(1, 50), Some("ann smith"))
        .await
        .unwrap();
    assert_eq!(result.pagination.total, 1);
    assert_eq!(result.data[0].id, 2);
}

#[tokio::test]
async fn test_empty_search_means_no_filter() {
    let reports = service(MemoryStore::new(sample_rows(12, 3)));

    let result = reports
        .list_customers(PageRequest::new(1, 50), Some(""))
        .await
        .unwrap();

    assert_eq!(result.pagination.total, 12);
}

#[tokio::test]
async fn test_campaign_pages_group_by_file() {
    let reports = service(MemoryStore::new(sample_rows(100, 25)));

    let first = reports
        .list_campaign_stats(PageRequest::new(1, 20))
        .await
        .unwrap();
    assert_eq!(first.data.len(), 20);
    assert_eq!(first.pagination.total, 25);
    assert_eq!(first.pagination.total_pages, 2);

    let second = reports
        .list_campaign_stats(PageRequest::new(2, 20))
        .await
        .unwrap();
    assert_eq!(second.data.len(), 5);

    let counted: i64 = first
        .data
        .iter()
        .chain(second.data.iter())
        .map(|c| c.record_count)
        .sum();
    assert_eq!(counted, 100);
}

#[tokio::test]
async fn test_campaign_score_buckets_never_exceed_count() {
    let reports = service(MemoryStore::new(sample_rows(90, 4)));

    let result = reports
        .list_campaign_stats(PageRequest::new(1, 20))
        .await
        .unwrap();

    for campaign in result.data {
        let bucketed =
            campaign.score_below_600 + campaign.score_600_700 + campaign.score_700_plus;
        assert!(bucketed <= campaign.record_count, "{:?}", campaign.campaign_id);
    }
}

#[tokio::test]
async fn test_dashboard_buckets_partition_known_values() {
    let rows = sample_rows(143, 5);
    let with_age = rows.iter().filter(|r| r.age.is_some()).count() as i64;
    let with_score = rows.iter().filter(|r| r.vantage.is_some()).count() as i64;
    let reports = service(MemoryStore::new(rows));

    let stats = reports.dashboard_stats().await.unwrap();

    assert_eq!(stats.total_rows, 143);
    assert_eq!(stats.age_bucketed_rows, with_age);
    assert_eq!(
        stats.age_up_to_30 + stats.age_31_45 + stats.age_46_60 + stats.age_over_60,
        with_age
    );
    assert_eq!(
        stats.score_below_600 + stats.score_600_700 + stats.score_700_plus,
        with_score
    );
    assert!(stats.min_score <= stats.max_score);
    assert!(stats.avg_debt.unwrap() > 0.0);
}

#[tokio::test]
async fn test_dashboard_on_empty_table() {
    let reports = service(MemoryStore::default());

    let stats = reports.dashboard_stats().await.unwrap();

    assert_eq!(stats.total_rows, 0);
    assert_eq!(stats.avg_age, None);
    assert_eq!(stats.total_debt, None);
    assert_eq!(stats.avg_debt, None);
    assert_eq!(stats.min_score, None);
    assert_eq!(stats.age_bucketed_rows, 0);
}

#[tokio::test]
async fn test_address_points_are_capped_and_finite() {
    let mut rows = sample_rows(620, 3);
    rows[0].zip = None;
    rows[1].zip = Some("abc".to_string());
    rows[2].zip = Some("10001-1234".to_string());
    let reports = service(MemoryStore::new(rows));

    let points = reports.address_points().await.unwrap();

    assert_eq!(points.len(), ADDRESS_SAMPLE_LIMIT as usize);
    assert!(points.iter().all(|p| p.lat.is_finite() && p.lng.is_finite()));
    // Missing ZIPs land on the sentinel coordinate
    assert_eq!((points[0].lat, points[0].lng), (42.5, -71.5));
    assert_eq!(points[2].zip.as_deref(), Some("10001-1234"));
}

#[tokio::test]
async fn test_customers_endpoint_uses_defaults_for_bad_params() {
    let (status, body) = get_json(
        app(MemoryStore::new(sample_rows(60, 2)), "production"),
        "/api/customers?page=abc&limit=-1",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 50);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 50);
    assert!(body["data"][0].get("ZIP").is_some());
}

#[tokio::test]
async fn test_limit_is_capped() {
    let (status, body) = get_json(
        app(MemoryStore::new(sample_rows(10, 2)), "production"),
        "/api/campaigns?limit=100000",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["limit"], 200);
    assert!(body["data"][0]["count"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_dashboard_endpoint_field_names() {
    let (status, body) = get_json(
        app(MemoryStore::new(sample_rows(20, 2)), "production"),
        "/api/dashboard",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    for field in [
        "totalRows",
        "avgVantage",
        "minVantage",
        "maxVantage",
        "age18_30",
        "age60Plus",
        "vantage700Plus",
        "totalDebt",
        "avgDebt",
    ] {
        assert!(body.get(field).is_some(), "missing {}", field);
    }
}

#[tokio::test]
async fn test_failure_hides_details_in_production() {
    let (status, body) =
        get_json(app(MemoryStore::failing(), "production"), "/api/customers").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch customers");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_failure_shows_details_in_development() {
    let (status, body) =
        get_json(app(MemoryStore::failing(), "development"), "/api/dashboard").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch dashboard statistics");
    assert_eq!(body["details"]["kind"], "database");
}

#[tokio::test]
async fn test_every_endpoint_reports_its_own_failure() {
    for (uri, message) in [
        ("/api/customers", "Failed to fetch customers"),
        ("/api/campaigns", "Failed to fetch campaign statistics"),
        ("/api/dashboard", "Failed to fetch dashboard statistics"),
        ("/api/addresses", "Failed to fetch address data"),
    ] {
        let (status, body) = get_json(app(MemoryStore::failing(), "production"), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], message);
    }
}

#[tokio::test]
async fn test_empty_table_listing() {
    let (status, body) = get_json(
        app(MemoryStore::default(), "production"),
        "/api/customers?page=1&limit=10&search=",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({
            "data": [],
            "pagination": { "total": 0, "page": 1, "limit": 10, "totalPages": 0 }
        })
    );
}

#[tokio::test]
async fn test_repeated_query_keys_use_first_value() {
    let (status, body) = get_json(
        app(MemoryStore::new(sample_rows(30, 3)), "production"),
        "/api/customers?page=1&page=2&limit=5&limit=abc",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 5);
    assert_eq!(body["data"][0]["id"], 1);

    let (status, body) = get_json(
        app(MemoryStore::new(sample_rows(30, 3)), "production"),
        "/api/campaigns?page=x&page=1&limit=2&limit=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 2);
}

/// Answers every ZIP, but only after `latency`.
struct SlowGeocoder {
    latency: Duration,
}

#[async_trait]
impl Geocoder for SlowGeocoder {
    async fn lookup(&self, _zip: &str) -> Result<Option<Coordinate>, AppError> {
        tokio::time::sleep(self.latency).await;
        Ok(Some(Coordinate::new(1.0, 1.0)))
    }
}

#[tokio::test]
async fn test_slow_geocoder_cannot_outlast_request_timeout() {
    let mut rows = sample_rows(50, 2);
    for row in rows.iter_mut() {
        row.zip = Some(format!("{:05}", 20_000 + row.id));
    }
    let zips: Vec<String> = rows.iter().filter_map(|r| r.zip.clone()).collect();

    let geocoder = Arc::new(SlowGeocoder {
        latency: Duration::from_millis(600),
    });
    let resolver = Arc::new(CoordinateResolver::new(
        coordinate_cache(1_000),
        Some(geocoder as Arc<dyn Geocoder>),
        BatchPolicy {
            batch_size: 10,
            batch_delay: Duration::ZERO,
            deadline: Duration::from_millis(700),
        },
    ));
    let store: Arc<dyn ReportStore> = Arc::new(MemoryStore::new(rows));
    let state = Arc::new(AppState {
        config: test_config("production"),
        reports: ReportService::new(store, resolver),
    });
    let router = api::routes()
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(1)));

    let started = Instant::now();
    let (status, body) = get_json(router, "/api/addresses").await;

    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(1));

    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 50);
    for (i, point) in points.iter().enumerate() {
        let code = PostalCode::parse(Some(&zips[i]));
        let expected = if i < 10 {
            Coordinate::new(1.0, 1.0)
        } else {
            fallback_coordinate(&code)
        };
        assert!((point["lat"].as_f64().unwrap() - expected.lat).abs() < 1e-9, "row {}", i);
        assert!((point["lng"].as_f64().unwrap() - expected.lng).abs() < 1e-9, "row {}", i);
    }
}
