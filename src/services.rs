use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::circuit_breaker::{create_geocoder_circuit_breaker, GeocoderCircuitBreaker};
use crate::config::GeocoderConfig;
use crate::errors::AppError;
use crate::geocoding::{Coordinate, Geocoder};

/// Response of `GET /us/{zip}` on the Zippopotam.us API.
#[derive(Debug, Deserialize)]
pub struct ZippopotamResponse {
    #[serde(default)]
    pub places: Vec<ZippopotamPlace>,
}

#[derive(Debug, Deserialize)]
pub struct ZippopotamPlace {
    #[serde(rename = "place name")]
    pub place_name: Option<String>,
    /// Degrees, sent as a string.
    pub latitude: String,
    /// Degrees, sent as a string.
    pub longitude: String,
}

impl ZippopotamPlace {
    fn coordinate(&self) -> Result<Coordinate, AppError> {
        let lat = self.latitude.trim().parse::<f64>();
        let lng = self.longitude.trim().parse::<f64>();
        match (lat, lng) {
            (Ok(lat), Ok(lng)) if lat.is_finite() && lng.is_finite() => {
                Ok(Coordinate::new(lat, lng))
            }
            _ => Err(AppError::ExternalApiError(format!(
                "Zippopotam returned unparseable coordinates: {:?}/{:?}",
                self.latitude, self.longitude
            ))),
        }
    }
}

/// Geocoder backed by the Zippopotam.us postal code API.
#[derive(Clone)]
pub struct ZippopotamService {
    client: Client,
    base_url: String,
    breaker: GeocoderCircuitBreaker,
}

impl ZippopotamService {
    pub fn new(config: &GeocoderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create geocoding client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            breaker: create_geocoder_circuit_breaker(),
        })
    }

    async fn fetch(&self, zip: &str) -> Result<Option<Coordinate>, AppError> {
        let url = format!("{}/us/{}", self.base_url, zip);
        tracing::debug!("Geocoding ZIP {} via {}", zip, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Zippopotam request failed: {}", e))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApiError(format!(
                "Zippopotam returned status {} for ZIP {}",
                status, zip
            )));
        }

        let body: ZippopotamResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Zippopotam response: {}", e))
        })?;

        match body.places.first() {
            Some(place) => {
                let coord = place.coordinate()?;
                tracing::debug!(
                    "ZIP {} resolved to {:?} ({})",
                    zip,
                    coord,
                    place.place_name.as_deref().unwrap_or("unnamed place")
                );
                Ok(Some(coord))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Geocoder for ZippopotamService {
    async fn lookup(&self, zip: &str) -> Result<Option<Coordinate>, AppError> {
        match self.breaker.call(self.fetch(zip)).await {
            Ok(found) => Ok(found),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::ExternalApiError(
                "Geocoding circuit open, skipping upstream lookup".to_string(),
            )),
        }
    }
}
