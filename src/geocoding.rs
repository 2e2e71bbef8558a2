//! ZIP code to approximate coordinate resolution for the address heatmap.
//!
//! Resolution order for a postal code:
//!
//! 1. The injected in-process cache.
//! 2. A live [`Geocoder`] lookup (if one is configured). Any failure here is
//!    logged and swallowed.
//! 3. A table of well-known 3-digit prefixes for major cities.
//! 4. A deterministic approximation derived from the digits themselves.
//!
//! Steps 3 and 4 never fail, so [`CoordinateResolver::resolve`] is total.

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::AppError;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Geographic center of the contiguous US; base for prefixes outside every
/// known range.
pub const US_CENTER: Coordinate = Coordinate::new(39.8283, -98.5795);

/// A normalized 5-character postal code.
///
/// Longer values (ZIP+4, stray suffixes) are truncated to their first five
/// characters; missing or shorter values become [`PostalCode::SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostalCode(String);

impl PostalCode {
    pub const SENTINEL: &'static str = "00000";

    pub fn parse(raw: Option<&str>) -> Self {
        let trimmed = raw.map(str::trim).unwrap_or("");
        let code: String = trimmed.chars().take(5).collect();
        if code.chars().count() < 5 {
            return PostalCode(Self::SENTINEL.to_string());
        }
        PostalCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == Self::SENTINEL
    }

    /// Five ASCII digits and not the sentinel: worth asking a geocoder about.
    pub fn is_geocodable(&self) -> bool {
        !self.is_sentinel() && self.0.len() == 5 && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// First three characters.
    pub fn prefix(&self) -> &str {
        char_slice(&self.0, 0, 3)
    }

    /// Characters four and five.
    pub fn suffix(&self) -> &str {
        char_slice(&self.0, 3, 5)
    }
}

fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let byte_at = |n: usize| s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    &s[byte_at(start)..byte_at(end)]
}

/// Known ZIP prefixes of major cities.
const KNOWN_PREFIXES: &[(&str, Coordinate)] = &[
    ("100", Coordinate::new(40.7128, -74.0060)),  // Manhattan
    ("112", Coordinate::new(40.6782, -73.9442)),  // Brooklyn
    ("900", Coordinate::new(34.0522, -118.2437)), // Los Angeles
    ("606", Coordinate::new(41.8781, -87.6298)),  // Chicago
    ("770", Coordinate::new(29.7604, -95.3698)),  // Houston
    ("850", Coordinate::new(33.4484, -112.0740)), // Phoenix
    ("191", Coordinate::new(39.9526, -75.1652)),  // Philadelphia
    ("782", Coordinate::new(29.4241, -98.4936)),  // San Antonio
    ("921", Coordinate::new(32.7157, -117.1611)), // San Diego
    ("752", Coordinate::new(32.7767, -96.7970)),  // Dallas
    ("941", Coordinate::new(37.7749, -122.4194)), // San Francisco
    ("787", Coordinate::new(30.2672, -97.7431)),  // Austin
    ("981", Coordinate::new(47.6062, -122.3321)), // Seattle
    ("802", Coordinate::new(39.7392, -104.9903)), // Denver
    ("021", Coordinate::new(42.3601, -71.0589)),  // Boston
    ("331", Coordinate::new(25.7617, -80.1918)),  // Miami
];

/// Inclusive prefix ranges and their regional base coordinate. First match wins.
const REGIONS: &[(u16, u16, Coordinate)] = &[
    (0, 6, Coordinate::new(42.5, -71.5)),      // New England
    (10, 29, Coordinate::new(42.0, -71.5)),    // Massachusetts, Rhode Island
    (100, 119, Coordinate::new(40.7, -74.0)),  // New York City
    (120, 149, Coordinate::new(42.5, -76.0)),  // Upstate New York
    (150, 196, Coordinate::new(40.5, -77.5)),  // Pennsylvania
    (197, 249, Coordinate::new(38.5, -77.0)),  // Delaware, Maryland, DC, Virginia
    (270, 299, Coordinate::new(35.0, -80.0)),  // Carolinas
    (300, 319, Coordinate::new(33.0, -83.5)),  // Georgia
    (320, 349, Coordinate::new(28.0, -82.0)),  // Florida
    (350, 379, Coordinate::new(34.0, -86.5)),  // Alabama, Tennessee
    (480, 499, Coordinate::new(43.0, -84.5)),  // Michigan
    (430, 458, Coordinate::new(40.0, -82.5)),  // Ohio
    (400, 429, Coordinate::new(38.0, -85.5)),  // Kentucky, Indiana
    (570, 599, Coordinate::new(45.0, -103.0)), // Dakotas, Montana
    (500, 569, Coordinate::new(42.0, -89.0)),  // Wisconsin, Illinois, Iowa
    (600, 658, Coordinate::new(41.0, -93.0)),  // Missouri, Iowa, Minnesota
    (660, 699, Coordinate::new(39.0, -97.0)),  // Kansas, Nebraska
    (700, 749, Coordinate::new(33.0, -93.0)),  // Louisiana, Arkansas, Oklahoma
    (750, 799, Coordinate::new(31.0, -98.0)),  // Texas
    (800, 899, Coordinate::new(37.0, -106.0)), // Mountain west
    (900, 961, Coordinate::new(34.0, -118.0)), // California
    (970, 999, Coordinate::new(43.0, -116.0)), // Pacific northwest, Nevada, Utah
];

const LAT_STEP: f64 = 0.01;
const LNG_STEP: f64 = 0.015;

/// Coordinate of a well-known city prefix, if any.
pub fn known_prefix_coordinate(code: &PostalCode) -> Option<Coordinate> {
    let prefix = code.prefix();
    KNOWN_PREFIXES
        .iter()
        .find(|(known, _)| *known == prefix)
        .map(|(_, coord)| *coord)
}

/// Regional base coordinate nudged by the last two digits.
///
/// Codes sharing a prefix but not a suffix land at distinct nearby points.
pub fn approximate_coordinate(code: &PostalCode) -> Coordinate {
    let base = code
        .prefix()
        .parse::<u16>()
        .ok()
        .and_then(|prefix| {
            REGIONS
                .iter()
                .find(|(lo, hi, _)| (*lo..=*hi).contains(&prefix))
                .map(|(_, _, coord)| *coord)
        })
        .unwrap_or(US_CENTER);

    let step = code
        .suffix()
        .parse::<u8>()
        .map(|digits| f64::from(digits % 10))
        .unwrap_or(0.0);

    Coordinate::new(base.lat + step * LAT_STEP, base.lng + step * LNG_STEP)
}

/// Offline resolution: known prefix first, approximation otherwise.
pub fn fallback_coordinate(code: &PostalCode) -> Coordinate {
    known_prefix_coordinate(code).unwrap_or_else(|| approximate_coordinate(code))
}

/// A live postal code lookup.
///
/// `Ok(None)` means the upstream does not know the code; `Err` is any
/// transport, status or payload failure.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, zip: &str) -> Result<Option<Coordinate>, AppError>;
}

/// Windowing used when many codes are resolved at once.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub batch_delay: Duration,
    /// Budget for all live lookups of one `resolve_many` call. Codes still
    /// pending when it runs out get their offline coordinate.
    pub deadline: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(100),
            deadline: Duration::from_secs(20),
        }
    }
}

pub fn coordinate_cache(capacity: u64) -> Cache<String, Coordinate> {
    Cache::builder().max_capacity(capacity).build()
}

pub struct CoordinateResolver {
    cache: Cache<String, Coordinate>,
    geocoder: Option<Arc<dyn Geocoder>>,
    batch: BatchPolicy,
}

impl CoordinateResolver {
    pub fn new(
        cache: Cache<String, Coordinate>,
        geocoder: Option<Arc<dyn Geocoder>>,
        batch: BatchPolicy,
    ) -> Self {
        Self {
            cache,
            geocoder,
            batch: BatchPolicy {
                batch_size: batch.batch_size.max(1),
                ..batch
            },
        }
    }

    /// Resolver that never leaves the process.
    pub fn offline(cache: Cache<String, Coordinate>) -> Self {
        Self::new(cache, None, BatchPolicy::default())
    }

    /// Resolves a raw ZIP value. Never fails.
    pub async fn resolve(&self, raw: &str) -> Coordinate {
        self.resolve_code(&PostalCode::parse(Some(raw))).await
    }

    pub async fn resolve_code(&self, code: &PostalCode) -> Coordinate {
        if code.is_geocodable() {
            if let Some(hit) = self.cache.get(code.as_str()).await {
                return hit;
            }
            if let Some(coord) = self.lookup_live(code).await {
                return coord;
            }
        }
        fallback_coordinate(code)
    }

    async fn lookup_live(&self, code: &PostalCode) -> Option<Coordinate> {
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.lookup(code.as_str()).await {
            Ok(Some(coord)) if coord.is_finite() => {
                self.cache.insert(code.as_str().to_string(), coord).await;
                Some(coord)
            }
            Ok(Some(coord)) => {
                tracing::warn!(
                    "Geocoder returned non-finite coordinate for ZIP {}: {:?}",
                    code.as_str(),
                    coord
                );
                None
            }
            Ok(None) => {
                tracing::debug!("Geocoder has no place for ZIP {}", code.as_str());
                None
            }
            Err(e) => {
                tracing::warn!("Geocoding failed for ZIP {}: {}", code.as_str(), e);
                None
            }
        }
    }

    /// Resolves every distinct code among `raw_codes` exactly once.
    ///
    /// With a live geocoder, unique codes are resolved in concurrent windows
    /// of `batch_size` with `batch_delay` between windows. Once the batch
    /// deadline passes, the remaining codes are answered from the cache or
    /// the offline fallback.
    pub async fn resolve_many<'a, I>(&self, raw_codes: I) -> HashMap<PostalCode, Coordinate>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<PostalCode> = raw_codes
            .into_iter()
            .map(PostalCode::parse)
            .filter(|code| seen.insert(code.clone()))
            .collect();

        tracing::info!("Found {} unique ZIP codes", unique.len());

        let mut resolved = HashMap::with_capacity(unique.len());
        let (live, offline): (Vec<_>, Vec<_>) = unique
            .into_iter()
            .partition(|code| self.geocoder.is_some() && code.is_geocodable());

        for code in offline {
            let coord = fallback_coordinate(&code);
            resolved.insert(code, coord);
        }

        let started = Instant::now();
        let mut windows = live.chunks(self.batch.batch_size).peekable();
        while let Some(window) = windows.next() {
            let remaining = self.batch.deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }

            let lookups =
                futures::future::join_all(window.iter().map(|code| self.resolve_code(code)));
            match tokio::time::timeout(remaining, lookups).await {
                Ok(coords) => resolved.extend(window.iter().cloned().zip(coords)),
                Err(_) => break,
            }

            if windows.peek().is_some() && !self.batch.batch_delay.is_zero() {
                tokio::time::sleep(self.batch.batch_delay).await;
            }
        }

        let mut cut_off = 0usize;
        for code in live {
            if resolved.contains_key(&code) {
                continue;
            }
            cut_off += 1;
            let coord = match self.cache.get(code.as_str()).await {
                Some(hit) => hit,
                None => fallback_coordinate(&code),
            };
            resolved.insert(code, coord);
        }
        if cut_off > 0 {
            tracing::warn!(
                "Geocoding deadline of {:?} reached, {} ZIP codes use the offline fallback",
                self.batch.deadline,
                cut_off
            );
        }

        resolved
    }
}
