//! OMX Geocoding Layer
//!
//! Implementations of the `Geocoder` trait from `omx-domain`, used to place
//! an extracted property address on a map.
//!
//! # Providers
//!
//! - `NominatimGeocoder`: OpenStreetMap's public search API, rate limited
//! - `MockGeocoder`: Deterministic lookups for testing
//!
//! Geocoding is best-effort: callers attach a [`GeocodeError`] to the
//! extraction record as a warning instead of failing the extraction.

#![warn(missing_docs)]

pub mod nominatim;
pub mod rate_limit;

use omx_domain::{Coordinates, Geocoder};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use nominatim::NominatimGeocoder;
pub use rate_limit::RateLimiter;

/// Errors that can occur during geocoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    /// No blank addresses
    #[error("Address is empty")]
    EmptyAddress,

    /// The service knows no location for the address
    #[error("No location found for '{0}'")]
    NotFound(String),

    /// The service refused the request due to its usage policy
    #[error("Geocoding rate limit exceeded")]
    RateLimited,

    /// Network or HTTP failure
    #[error("Communication error: {0}")]
    Communication(String),

    /// Unexpected payload
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        GeocodeError::Communication(e.to_string())
    }
}

/// Mock geocoder for deterministic testing
///
/// An address resolves to the first entry whose key it contains.
#[derive(Debug, Clone, Default)]
pub struct MockGeocoder {
    entries: Arc<Mutex<Vec<(String, Coordinates)>>>,
    call_count: Arc<Mutex<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGeocoder {
    /// Create an empty mock; every lookup fails with `NotFound`
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve addresses containing `needle` to `coordinates`
    pub fn with_location(self, needle: impl Into<String>, coordinates: Coordinates) -> Self {
        lock(&self.entries).push((needle.into(), coordinates));
        self
    }

    /// Number of geocode calls made
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }
}

impl Geocoder for MockGeocoder {
    type Error = GeocodeError;

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        *lock(&self.call_count) += 1;

        if address.trim().is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        lock(&self.entries)
            .iter()
            .find(|(needle, _)| address.contains(needle.as_str()))
            .map(|(_, coordinates)| *coordinates)
            .ok_or_else(|| GeocodeError::NotFound(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_geocoder_hit() {
        let austin = Coordinates::new(30.2672, -97.7431).unwrap();
        let geocoder = MockGeocoder::new().with_location("Austin", austin);

        let result = geocoder.geocode("100 Congress Ave, Austin, TX").await;
        assert_eq!(result.unwrap(), austin);
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_geocoder_miss() {
        let geocoder = MockGeocoder::new();
        let result = geocoder.geocode("Nowhere").await;
        assert_eq!(result, Err(GeocodeError::NotFound("Nowhere".into())));
    }

    #[tokio::test]
    async fn test_mock_geocoder_empty_address() {
        let geocoder = MockGeocoder::new();
        assert_eq!(geocoder.geocode("  ").await, Err(GeocodeError::EmptyAddress));
    }
}
