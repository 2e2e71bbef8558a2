//! CreditVision Dashboard API Library
//!
//! Read-only reporting backend for the credit-campaign dashboard: paginated
//! customer listings, per-campaign and global aggregates over
//! `KuberFinalMailFiles`, and approximate coordinates for the address heatmap.
//!
//! # Modules
//!
//! - `api`: Router and OpenAPI document.
//! - `circuit_breaker`: Circuit breaker for the geocoding upstream.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Parameterized read queries.
//! - `errors`: Error handling types and the API error envelope.
//! - `geocoding`: ZIP code to coordinate resolution.
//! - `handlers`: HTTP request handlers.
//! - `models`: Row and response models.
//! - `pagination`: Page/limit parsing and page math.
//! - `reporting`: Query orchestration behind the handlers.
//! - `services`: External service clients (Zippopotam.us).

pub mod api;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod geocoding;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod reporting;
pub mod services;
