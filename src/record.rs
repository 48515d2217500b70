use crate::ip::NormalizedIp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat payload returned by the geolocation endpoint.
///
/// Only the fields the application displays are named; everything else the
/// API sends is kept verbatim in `extra` so the bookmark file round-trips
/// whatever the service returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Coordinates as a `"lat,lon"` string, the endpoint's native format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IpDetails {
    /// `(latitude, longitude)` parsed from `loc`, or `None` when the field
    /// is absent or malformed. Callers skip map rendering on `None` rather
    /// than treating it as a failed lookup.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lon) = self.loc.as_deref()?.split_once(',')?;
        Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
    }
}

/// One entry of the bookmark list, persisted as a single JSON object with
/// the detail fields flattened next to `ip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub ip: NormalizedIp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: IpDetails,
}
