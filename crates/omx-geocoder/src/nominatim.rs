//! Nominatim (OpenStreetMap) geocoder
//!
//! The public instance's usage policy asks for an identifying User-Agent and
//! at most one request per second; both are enforced here.

use crate::rate_limit::{RateLimiter, DEFAULT_MIN_INTERVAL};
use crate::GeocodeError;
use omx_domain::{Coordinates, Geocoder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Public Nominatim endpoint
pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("omx/", env!("CARGO_PKG_VERSION"));

/// HTTP timeout for a single lookup (10 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Geocoder backed by the Nominatim search API
pub struct NominatimGeocoder {
    endpoint: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

#[derive(Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    /// Create a geocoder for `endpoint` identifying itself as `user_agent`
    pub fn new(
        endpoint: impl Into<String>,
        user_agent: &str,
        min_interval: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
            limiter: RateLimiter::new(min_interval),
        })
    }

    /// Create a geocoder for the public instance with default settings
    pub fn public() -> Result<Self, GeocodeError> {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, DEFAULT_MIN_INTERVAL)
    }

    /// The configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Take the best (first) hit of a search response
fn parse_results(body: &str, address: &str) -> Result<Coordinates, GeocodeError> {
    let results: Vec<SearchResult> = serde_json::from_str(body)
        .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| GeocodeError::NotFound(address.to_string()))?;

    let latitude: f64 = first
        .lat
        .parse()
        .map_err(|_| GeocodeError::InvalidResponse(format!("bad latitude '{}'", first.lat)))?;
    let longitude: f64 = first
        .lon
        .parse()
        .map_err(|_| GeocodeError::InvalidResponse(format!("bad longitude '{}'", first.lon)))?;

    Coordinates::new(latitude, longitude).ok_or_else(|| {
        GeocodeError::InvalidResponse(format!(
            "coordinates out of range: {}, {}",
            latitude, longitude
        ))
    })
}

impl Geocoder for NominatimGeocoder {
    type Error = GeocodeError;

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        self.limiter.acquire().await;

        let url = format!("{}/search", self.endpoint);
        debug!(address, "Geocoding address");

        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Communication(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        let coordinates = parse_results(&body, address)?;
        info!(address, %coordinates, "Geocoding successful");
        Ok(coordinates)
    }
}
