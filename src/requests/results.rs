//! Typed views over the responses of fetch-style requests.
use serde_json::Value;

use crate::requests::request::{ApiRequest, RequestStatus};

/// One geofence definition from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedGeofence {
    /// Company the geofence belongs to.
    pub company_id: String,
    /// Backend-assigned geofence id.
    pub id: String,
    /// Center latitude.
    pub latitude: f64,
    /// Center longitude.
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
}

/// Outcome of a geofence fetch request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchGeofencesResult {
    /// Geofences successfully fetched and parsed.
    Success(Vec<FetchedGeofence>),
    /// Not available yet: the request hasn't been sent, is in flight, or hit a
    /// retryable/server-side condition.
    Unavailable,
    /// The request was rejected or the response wasn't valid geofence data.
    Failure,
}

/// Outcome of resolving a click-track destination.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveDestinationResult {
    /// Destination URL successfully resolved.
    Success {
        /// Where the tracked link actually leads.
        destination_url: String,
        /// The tracking URL that was resolved.
        tracking_url: String,
    },
    /// Not available yet: the request hasn't been sent, is in flight, or hit a
    /// retryable/server-side condition.
    Unavailable {
        /// The tracking URL in question.
        tracking_url: String,
    },
    /// The tracking URL expired, the request failed, or the response carried no
    /// destination.
    Failure {
        /// The tracking URL in question.
        tracking_url: String,
    },
}

impl ApiRequest {
    /// Interpret this request's outcome as a geofence fetch result.
    pub fn geofences_result(&self, company_id: &str) -> FetchGeofencesResult {
        match self.status() {
            RequestStatus::Complete => match self.parse_geofences(company_id) {
                Some(data) => FetchGeofencesResult::Success(data),
                None => FetchGeofencesResult::Failure,
            },
            RequestStatus::Unsent | RequestStatus::Inflight => FetchGeofencesResult::Unavailable,
            _ => match self.response_code() {
                // Rate limits and server errors may clear up on their own.
                Some(429) | Some(500..=599) => FetchGeofencesResult::Unavailable,
                _ => FetchGeofencesResult::Failure,
            },
        }
    }

    /// Interpret this request's outcome as a click-track destination result.
    pub fn destination_result(&self) -> ResolveDestinationResult {
        let tracking_url = self.base_url.clone().unwrap_or_default();

        match self.status() {
            RequestStatus::Complete => match self.parse_destination() {
                Some(destination_url) => ResolveDestinationResult::Success {
                    destination_url,
                    tracking_url,
                },
                None => ResolveDestinationResult::Failure { tracking_url },
            },
            RequestStatus::Unsent | RequestStatus::Inflight => {
                ResolveDestinationResult::Unavailable { tracking_url }
            }
            _ => match self.response_code() {
                Some(429) | Some(500..=599) => {
                    ResolveDestinationResult::Unavailable { tracking_url }
                }
                _ => ResolveDestinationResult::Failure { tracking_url },
            },
        }
    }

    fn parse_geofences(&self, company_id: &str) -> Option<Vec<FetchedGeofence>> {
        let body: Value = serde_json::from_str(self.response_body()?)
            .map_err(|err| {
                log::warn!(target: "beacon", "failed to parse geofences response: {err}");
            })
            .ok()?;

        let entries = body.get("data")?.as_array()?;
        // Entries that don't parse are skipped rather than failing the whole fetch.
        Some(
            entries
                .iter()
                .filter_map(|entry| parse_geofence(entry, company_id))
                .collect(),
        )
    }

    fn parse_destination(&self) -> Option<String> {
        let body: Value = serde_json::from_str(self.response_body()?)
            .map_err(|err| {
                log::warn!(target: "beacon", "failed to parse destination response: {err}");
            })
            .ok()?;

        body.get("original_destination")?
            .as_str()
            .filter(|destination| !destination.is_empty())
            .map(str::to_owned)
    }
}

fn parse_geofence(entry: &Value, company_id: &str) -> Option<FetchedGeofence> {
    let attributes = entry.get("attributes")?;
    let geofence = FetchedGeofence {
        company_id: company_id.to_owned(),
        id: entry.get("id")?.as_str()?.to_owned(),
        latitude: attributes.get("latitude")?.as_f64()?,
        longitude: attributes.get("longitude")?.as_f64()?,
        radius: attributes.get("radius")?.as_f64()?,
    };
    Some(geofence)
}
