//! Geocoding enrichment of a merged record

use crate::types::ExtractionRecord;
use omx_domain::Geocoder;
use tracing::{info, warn};

/// The lookup string for a record: "address, city, state" from whichever
/// parts were found. None without a property address.
pub fn geocode_query(record: &ExtractionRecord) -> Option<String> {
    let text = |name: &str| {
        record
            .value(name)
            .and_then(|v| v.as_text())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let address = text("property_address")?;
    let mut parts = vec![address];
    let lowered = address.to_lowercase();
    for name in ["city", "state"] {
        if let Some(part) = text(name) {
            // Skip parts the address line already carries
            if !lowered.contains(&part.to_lowercase()) {
                parts.push(part);
            }
        }
    }
    Some(parts.join(", "))
}

/// Geocode the record's address and attach the coordinates
///
/// A failed lookup is recorded as a warning on the record and never
/// affects the extracted fields.
pub async fn attach_location<G: Geocoder>(record: &mut ExtractionRecord, geocoder: &G) {
    let Some(query) = geocode_query(record) else {
        return;
    };

    match geocoder.geocode(&query).await {
        Ok(coordinates) => {
            info!(query = %query, %coordinates, "Property located");
            record.location = Some(coordinates);
        }
        Err(e) => {
            warn!(query = %query, error = %e, "Geocoding failed");
            record.warnings.push(format!("Geocoding failed for '{}': {}", query, e));
        }
    }
}
