//! Per-endpoint request construction.
//!
//! Each constructor is a pure builder: it computes final headers, query and body from
//! snapshots of the domain objects at construction time and never re-reads them afterwards.
use std::collections::HashMap;
use std::ops::RangeInclusive;

use base64::prelude::*;
use serde_json::{json, Map, Value};

use crate::clock::Clock;
use crate::config::Config;
use crate::model::{Event, EventKey, Profile, ProfileKey};
use crate::requests::request::{ApiRequest, RequestMethod, HEADER_REVISION};

// Body keywords shared across endpoints.
const DATA: &str = "data";
const TYPE: &str = "type";
const ATTRIBUTES: &str = "attributes";
const PROPERTIES: &str = "properties";
const LOCATION: &str = "location";
const COMPANY_ID: &str = "company_id";

// Push token body keywords.
const TOKEN: &str = "token";
const PLATFORM: &str = "platform";
const VENDOR: &str = "vendor";
const DEVICE_METADATA: &str = "device_metadata";
const ENABLEMENT_STATUS: &str = "enablement_status";
const NOTIFICATIONS_ENABLED: &str = "AUTHORIZED";
const NOTIFICATIONS_DISABLED: &str = "UNAUTHORIZED";
const BACKGROUND: &str = "background";
const BACKGROUND_AVAILABLE: &str = "AVAILABLE";
const BACKGROUND_UNAVAILABLE: &str = "UNAVAILABLE";

/// Base64-encoded profile identifiers attached to click-track requests.
pub(crate) const HEADER_PROFILE_INFO: &str = "X-Beacon-Profile-Info";
/// Marks a click-track request that has been re-armed for queued retry.
pub(crate) const HEADER_CLICK_TIMESTAMP: &str = "X-Beacon-Click-Event-Timestamp";
/// Geofence filter expression header.
const HEADER_API_FILTERS: &str = "X-Beacon-API-Filters";

/// Geofence fetching rides a pre-release API revision.
const GEOFENCES_REVISION: &str = "2025-10-15.pre";
const GEOFENCES_PAGE_SIZE: u32 = 30;

/// Which endpoint an [`ApiRequest`] targets. Carries the endpoint's success-code range and
/// attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Upsert profile data.
    CreateProfile,
    /// Track one behavioral event.
    CreateEvent,
    /// Register a push token for a profile.
    RegisterPushToken,
    /// Remove a push token from a profile.
    UnregisterPushToken,
    /// Submit a pre-aggregated analytics payload.
    AggregateEvent,
    /// Resolve and record a tracked link click.
    ClickTrack,
    /// Fetch geofence definitions.
    FetchGeofences,
    /// Fallback for persisted entries with an unrecognized discriminator.
    Generic,
}

impl RequestKind {
    /// Discriminator stored in the persisted `request_type` field.
    pub fn discriminator(&self) -> &'static str {
        match self {
            RequestKind::CreateProfile => "profile",
            RequestKind::CreateEvent => "event",
            RequestKind::RegisterPushToken => "push_token",
            RequestKind::UnregisterPushToken => "unregister_push_token",
            RequestKind::AggregateEvent => "aggregate_event",
            RequestKind::ClickTrack => "click_track",
            RequestKind::FetchGeofences => "fetch_geofences",
            RequestKind::Generic => "generic",
        }
    }

    /// Resolve a persisted discriminator. Unknown values decode as [`RequestKind::Generic`].
    pub fn from_discriminator(discriminator: &str) -> RequestKind {
        match discriminator {
            "profile" => RequestKind::CreateProfile,
            "event" => RequestKind::CreateEvent,
            "push_token" => RequestKind::RegisterPushToken,
            "unregister_push_token" => RequestKind::UnregisterPushToken,
            "aggregate_event" => RequestKind::AggregateEvent,
            "click_track" => RequestKind::ClickTrack,
            "fetch_geofences" => RequestKind::FetchGeofences,
            _ => RequestKind::Generic,
        }
    }

    /// Descriptive title, e.g. for logging.
    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::CreateProfile => "Identify Profile",
            RequestKind::CreateEvent => "Create Event",
            RequestKind::RegisterPushToken => "Push Token",
            RequestKind::UnregisterPushToken => "Unregister Push Token",
            RequestKind::AggregateEvent => "Create Aggregate Event",
            RequestKind::ClickTrack => "Click Track",
            RequestKind::FetchGeofences => "Fetch Geofences",
            RequestKind::Generic => "API Request",
        }
    }

    /// Response codes this endpoint treats as success. The write endpoints expect exactly
    /// 202 Accepted; geofence fetching expects exactly 200 OK.
    pub(crate) fn success_codes(&self) -> RangeInclusive<u16> {
        match self {
            RequestKind::CreateProfile
            | RequestKind::CreateEvent
            | RequestKind::RegisterPushToken
            | RequestKind::UnregisterPushToken
            | RequestKind::AggregateEvent => 202..=202,
            RequestKind::FetchGeofences => 200..=200,
            RequestKind::ClickTrack | RequestKind::Generic => 200..=299,
        }
    }

    /// Attempt budget for this endpoint. Fetch-style requests attempt once; a click-track
    /// request gets the full budget only after being re-armed for the queue.
    pub(crate) fn max_attempts(&self, config: &Config, headers: &HashMap<String, String>) -> u32 {
        match self {
            RequestKind::FetchGeofences => 1,
            RequestKind::ClickTrack if !headers.contains_key(HEADER_CLICK_TIMESTAMP) => 1,
            _ => config.network_max_attempts,
        }
    }
}

impl ApiRequest {
    /// Build a profile upsert request from a snapshot of `profile`.
    pub fn create_profile(config: &Config, clock: &dyn Clock, profile: &Profile) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::CreateProfile,
            "client/profiles",
            RequestMethod::Post,
            config,
            clock,
        );
        request.query = company_query(config);
        request.body = Some(json!({
            DATA: {
                TYPE: "profile",
                ATTRIBUTES: profile_attributes(profile),
            }
        }));
        request
    }

    /// Build an event tracking request from snapshots of `event` and `profile`.
    pub fn create_event(
        config: &Config,
        clock: &dyn Clock,
        event: &Event,
        profile: &Profile,
    ) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::CreateEvent,
            "client/events/",
            RequestMethod::Post,
            config,
            clock,
        );

        let mut properties = event.properties().clone();
        let value = properties
            .remove(&EventKey::Value)
            .map(|value| value.to_json())
            .unwrap_or(Value::Null);
        let remaining: Map<String, Value> = properties
            .iter()
            .map(|(key, value)| (key.name().to_owned(), value.to_json()))
            .collect();

        let attributes = filtered_json_map(
            vec![
                ("profile", identifiers_json(profile)),
                ("metric", json!({ "name": event.metric().name() })),
                ("value", value),
                (
                    "time",
                    Value::String(clock.iso_time(request.queued_time)),
                ),
                (PROPERTIES, Value::Object(remaining)),
            ],
            // An event with no properties still sends an explicit empty bag.
            true,
        );

        request.query = company_query(config);
        request.body = Some(json!({
            DATA: {
                TYPE: "event",
                ATTRIBUTES: attributes,
            }
        }));
        request
    }

    /// Build a push token registration request for `token` and a snapshot of `profile`.
    pub fn register_push_token(
        config: &Config,
        clock: &dyn Clock,
        token: &str,
        profile: &Profile,
    ) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::RegisterPushToken,
            "client/push-tokens",
            RequestMethod::Post,
            config,
            clock,
        );

        let device = &config.device;
        let metadata: Map<String, Value> = device
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        let attributes = filtered_json_map(
            vec![
                (TOKEN, Value::String(token.to_owned())),
                (PLATFORM, Value::String(device.platform.clone())),
                (VENDOR, Value::String(device.push_vendor.clone())),
                (
                    ENABLEMENT_STATUS,
                    Value::String(
                        if device.notification_permission {
                            NOTIFICATIONS_ENABLED
                        } else {
                            NOTIFICATIONS_DISABLED
                        }
                        .to_owned(),
                    ),
                ),
                (
                    BACKGROUND,
                    Value::String(
                        if device.background_data {
                            BACKGROUND_AVAILABLE
                        } else {
                            BACKGROUND_UNAVAILABLE
                        }
                        .to_owned(),
                    ),
                ),
                (DEVICE_METADATA, Value::Object(metadata)),
                (
                    "profile",
                    json!({
                        DATA: {
                            TYPE: "profile",
                            ATTRIBUTES: profile_attributes(profile),
                        }
                    }),
                ),
            ],
            false,
        );

        request.query = company_query(config);
        request.body = Some(json!({
            DATA: {
                TYPE: "push-token",
                ATTRIBUTES: attributes,
            }
        }));
        request
    }

    /// Build a push token removal request. `api_key` is explicit so a token can be
    /// unregistered from a previous company after a key rotation.
    pub fn unregister_push_token(
        config: &Config,
        clock: &dyn Clock,
        api_key: &str,
        token: &str,
        profile: &Profile,
    ) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::UnregisterPushToken,
            "client/push-token-unregister",
            RequestMethod::Post,
            config,
            clock,
        );

        let device = &config.device;
        let attributes = filtered_json_map(
            vec![
                (
                    "profile",
                    json!({
                        DATA: {
                            TYPE: "profile",
                            ATTRIBUTES: profile_attributes(profile),
                        }
                    }),
                ),
                (TOKEN, Value::String(token.to_owned())),
                (PLATFORM, Value::String(device.platform.clone())),
                (VENDOR, Value::String(device.push_vendor.clone())),
            ],
            false,
        );

        request.query = HashMap::from([(COMPANY_ID.to_owned(), api_key.to_owned())]);
        request.body = Some(json!({
            DATA: {
                TYPE: "push-token-unregister",
                ATTRIBUTES: attributes,
            }
        }));
        request
    }

    /// Build a pre-aggregated analytics request. The payload passes through untouched.
    pub fn aggregate_event(config: &Config, clock: &dyn Clock, payload: Value) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::AggregateEvent,
            "onsite/track-analytics",
            RequestMethod::Post,
            config,
            clock,
        );
        request.query = company_query(config);
        request.body = Some(payload);
        request
    }

    /// Build a click-track request against the full `tracking_url`.
    ///
    /// The initial attempt runs once only, so a user following a link isn't kept waiting
    /// behind retries; call [`ApiRequest::prepare_for_queue`] to re-arm a failed request
    /// for normal queued retry behavior.
    pub fn click_track(
        config: &Config,
        clock: &dyn Clock,
        tracking_url: &str,
        profile: &Profile,
    ) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::ClickTrack,
            "",
            RequestMethod::Get,
            config,
            clock,
        );
        request.base_url = Some(tracking_url.to_owned());
        request.max_attempts = 1;

        let identifiers = identifiers_json(profile).to_string();
        request.headers.insert(
            HEADER_PROFILE_INFO.to_owned(),
            BASE64_STANDARD.encode(identifiers),
        );
        request
    }

    /// Build a geofence fetch request, optionally filtered by proximity to a coordinate.
    pub fn fetch_geofences(
        config: &Config,
        clock: &dyn Clock,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> ApiRequest {
        let mut request = ApiRequest::new(
            RequestKind::FetchGeofences,
            "client/geofences",
            RequestMethod::Get,
            config,
            clock,
        );
        request.max_attempts = 1;
        request
            .headers
            .insert(HEADER_REVISION.to_owned(), GEOFENCES_REVISION.to_owned());
        if let (Some(lat), Some(lng)) = (latitude, longitude) {
            request
                .headers
                .insert(HEADER_API_FILTERS.to_owned(), location_filter(lat, lng));
        }

        request.query = company_query(config);
        request
            .query
            .insert("page[size]".to_owned(), GEOFENCES_PAGE_SIZE.to_string());
        request
    }

    /// Re-arm a failed click-track request for the durable queue: stamp the original click
    /// time so the backend can account for the delay, and restore the full attempt budget.
    pub fn prepare_for_queue(&mut self, config: &Config) -> &mut ApiRequest {
        self.headers.insert(
            HEADER_CLICK_TIMESTAMP.to_owned(),
            (self.queued_time / 1_000).to_string(),
        );
        self.max_attempts = config.network_max_attempts;
        self.reset_attempts();
        self
    }
}

fn company_query(config: &Config) -> HashMap<String, String> {
    HashMap::from([(COMPANY_ID.to_owned(), config.api_key.clone())])
}

/// Filter expression for proximity-based geofence filtering. Coordinates are trimmed to
/// three decimal places for consistency.
fn location_filter(latitude: f64, longitude: f64) -> String {
    format!("and(equals(lat,{latitude:.3}),equals(lng,{longitude:.3}))")
}

/// Build the `attributes` object of a profile body.
///
/// The enumerated keys are popped from a working copy of the property map as the body is
/// assembled; whatever remains becomes free-form `properties`. No field can appear twice
/// and custom keys can never collide with reserved ones.
fn profile_attributes(profile: &Profile) -> Value {
    let mut properties = profile.properties().clone();

    let location = filtered_json_map(
        vec![
            ("address1", pop(&mut properties, ProfileKey::Address1)),
            ("address2", pop(&mut properties, ProfileKey::Address2)),
            ("city", pop(&mut properties, ProfileKey::City)),
            ("country", pop(&mut properties, ProfileKey::Country)),
            ("latitude", pop(&mut properties, ProfileKey::Latitude)),
            ("longitude", pop(&mut properties, ProfileKey::Longitude)),
            ("region", pop(&mut properties, ProfileKey::Region)),
            ("zip", pop(&mut properties, ProfileKey::Zip)),
            ("timezone", pop(&mut properties, ProfileKey::Timezone)),
        ],
        false,
    );

    let identifiers = vec![
        ("external_id", pop(&mut properties, ProfileKey::ExternalId)),
        ("email", pop(&mut properties, ProfileKey::Email)),
        ("phone_number", pop(&mut properties, ProfileKey::PhoneNumber)),
        ("anonymous_id", pop(&mut properties, ProfileKey::AnonymousId)),
        ("first_name", pop(&mut properties, ProfileKey::FirstName)),
        ("last_name", pop(&mut properties, ProfileKey::LastName)),
        ("organization", pop(&mut properties, ProfileKey::Organization)),
        ("title", pop(&mut properties, ProfileKey::Title)),
        ("image", pop(&mut properties, ProfileKey::Image)),
    ];

    let remaining: Map<String, Value> = properties
        .iter()
        .map(|(key, value)| (key.name().to_owned(), value.to_json()))
        .collect();

    let mut entries = identifiers;
    entries.push((LOCATION, location));
    entries.push((PROPERTIES, Value::Object(remaining)));

    filtered_json_map(entries, false)
}

/// JSON object of the profile's identifier fields only, empty values dropped.
fn identifiers_json(profile: &Profile) -> Value {
    let identifiers = profile.identifiers();
    filtered_json_map(
        vec![
            ("external_id", pop_ref(&identifiers, &ProfileKey::ExternalId)),
            ("email", pop_ref(&identifiers, &ProfileKey::Email)),
            ("phone_number", pop_ref(&identifiers, &ProfileKey::PhoneNumber)),
            ("anonymous_id", pop_ref(&identifiers, &ProfileKey::AnonymousId)),
        ],
        false,
    )
}

fn pop(
    properties: &mut HashMap<ProfileKey, crate::model::PropertyValue>,
    key: ProfileKey,
) -> Value {
    properties
        .remove(&key)
        .map(|value| value.to_json())
        .unwrap_or(Value::Null)
}

fn pop_ref(profile: &Profile, key: &ProfileKey) -> Value {
    profile
        .get(key)
        .map(|value| value.to_json())
        .unwrap_or(Value::Null)
}

/// Assemble a JSON object, dropping entries whose value is null, an empty string, or
/// (unless `allow_empty_maps`) an empty nested object.
fn filtered_json_map(entries: Vec<(&str, Value)>, allow_empty_maps: bool) -> Value {
    let filtered: Map<String, Value> = entries
        .into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Object(map) => allow_empty_maps || !map.is_empty(),
            _ => true,
        })
        .map(|(key, value)| (key.to_owned(), value))
        .collect();

    Value::Object(filtered)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::fixtures::VirtualClock;
    use crate::model::{Event, EventKey, EventMetric, Profile, ProfileKey};
    use crate::requests::{ApiRequest, RequestKind, RequestMethod};
    use crate::Config;

    use super::{filtered_json_map, HEADER_CLICK_TIMESTAMP, HEADER_PROFILE_INFO};

    fn config() -> Config {
        Config::new("pk_test")
    }

    #[test]
    fn filtered_map_drops_empty_values() {
        let filtered = filtered_json_map(
            vec![
                ("keep", json!("x")),
                ("empty_string", json!("")),
                ("null", Value::Null),
                ("empty_map", json!({})),
                ("zero", json!(0.0)),
            ],
            false,
        );

        assert_eq!(filtered, json!({ "keep": "x", "zero": 0.0 }));
    }

    #[test]
    fn filtered_map_can_keep_empty_maps() {
        let filtered = filtered_json_map(vec![("empty_map", json!({}))], true);

        assert_eq!(filtered, json!({ "empty_map": {} }));
    }

    #[test]
    fn profile_body_extracts_known_keys_first() {
        let clock = VirtualClock::new();
        let mut profile = Profile::new();
        profile.set_email("a@b.com");
        profile.set(ProfileKey::FirstName, "Ada");
        profile.set(ProfileKey::City, "London");
        profile.set(ProfileKey::Custom("plan".to_owned()), "premium");

        let request = ApiRequest::create_profile(&config(), &clock, &profile);
        let attributes = &request.body().unwrap()[super::DATA][super::ATTRIBUTES];

        assert_eq!(attributes["email"], json!("a@b.com"));
        assert_eq!(attributes["first_name"], json!("Ada"));
        assert_eq!(attributes["location"]["city"], json!("London"));
        assert_eq!(attributes["properties"], json!({ "plan": "premium" }));
        // Extracted keys must not leak into the free-form bucket.
        assert_eq!(attributes["properties"].get("email"), None);
    }

    #[test]
    fn profile_body_omits_empty_location() {
        let clock = VirtualClock::new();
        let mut profile = Profile::new();
        profile.set_email("a@b.com");

        let request = ApiRequest::create_profile(&config(), &clock, &profile);
        let attributes = &request.body().unwrap()[super::DATA][super::ATTRIBUTES];

        assert_eq!(attributes.get("location"), None);
        assert_eq!(attributes.get("properties"), None);
    }

    #[test]
    fn profile_request_narrows_success_to_202() {
        let clock = VirtualClock::new();
        let request = ApiRequest::create_profile(&config(), &clock, &Profile::new());

        assert_eq!(request.kind(), RequestKind::CreateProfile);
        assert_eq!(request.method(), RequestMethod::Post);
        assert_eq!(request.url_path(), "client/profiles");
        assert_eq!(request.query().get("company_id").unwrap(), "pk_test");
        assert_eq!(*request.success_codes.start(), 202);
        assert_eq!(*request.success_codes.end(), 202);
    }

    #[test]
    fn snapshot_isolation_from_profile_mutation() {
        let clock = VirtualClock::new();
        let mut profile = Profile::new();
        profile.set_email("a@b.com");

        let request = ApiRequest::create_profile(&config(), &clock, &profile);
        let body_before = request.to_json();

        profile.set_email("changed@b.com");
        profile.set(ProfileKey::FirstName, "Mallory");

        assert_eq!(request.to_json(), body_before);
    }

    #[test]
    fn event_body_carries_metric_time_and_identifiers() {
        let clock = VirtualClock::at(1_700_000_000_000);
        let mut profile = Profile::new();
        profile.set_email("a@b.com");
        let mut event = Event::new(EventMetric::ViewedProduct);
        event.set_value(19.99);
        event.set(EventKey::Custom("sku".to_owned()), "A-1");

        let request = ApiRequest::create_event(&config(), &clock, &event, &profile);
        let attributes = &request.body().unwrap()[super::DATA][super::ATTRIBUTES];

        assert_eq!(attributes["metric"]["name"], json!("Viewed Product"));
        assert_eq!(attributes["value"], json!(19.99));
        assert_eq!(attributes["time"], json!("2023-11-14T22:13:20+0000"));
        assert_eq!(attributes["profile"]["email"], json!("a@b.com"));
        assert_eq!(attributes["properties"]["sku"], json!("A-1"));
        // The extracted value must not also ride along as a property.
        assert_eq!(attributes["properties"].get("$value"), None);
    }

    #[test]
    fn event_body_keeps_empty_property_bag() {
        let clock = VirtualClock::new();
        let event = Event::new(EventMetric::OpenedApp);

        let request = ApiRequest::create_event(&config(), &clock, &event, &Profile::new());
        let attributes = &request.body().unwrap()[super::DATA][super::ATTRIBUTES];

        assert_eq!(attributes["properties"], json!({}));
    }

    #[test]
    fn snapshot_isolation_from_event_mutation() {
        let clock = VirtualClock::new();
        let mut event = Event::new(EventMetric::OpenedApp);

        let request = ApiRequest::create_event(&config(), &clock, &event, &Profile::new());
        let body_before = request.body().cloned();

        event.set(EventKey::Custom("later".to_owned()), "value");

        assert_eq!(request.body().cloned(), body_before);
    }

    #[test]
    fn push_token_body_includes_device_facts() {
        let clock = VirtualClock::new();
        let mut profile = Profile::new();
        profile.set_email("a@b.com");

        let request = ApiRequest::register_push_token(&config(), &clock, "tok-1", &profile);
        let attributes = &request.body().unwrap()[super::DATA][super::ATTRIBUTES];

        assert_eq!(request.url_path(), "client/push-tokens");
        assert_eq!(attributes["token"], json!("tok-1"));
        assert_eq!(attributes["platform"], json!("android"));
        assert_eq!(attributes["vendor"], json!("FCM"));
        assert_eq!(attributes["enablement_status"], json!("UNAUTHORIZED"));
        assert_eq!(attributes["background"], json!("UNAVAILABLE"));
        assert_eq!(
            attributes["profile"]["data"]["attributes"]["email"],
            json!("a@b.com")
        );
    }

    #[test]
    fn unregister_uses_explicit_api_key() {
        let clock = VirtualClock::new();

        let request = ApiRequest::unregister_push_token(
            &config(),
            &clock,
            "pk_previous",
            "tok-1",
            &Profile::new(),
        );

        assert_eq!(request.url_path(), "client/push-token-unregister");
        assert_eq!(request.query().get("company_id").unwrap(), "pk_previous");
        assert_eq!(
            request.body().unwrap()[super::DATA][super::TYPE],
            json!("push-token-unregister")
        );
    }

    #[test]
    fn aggregate_event_passes_payload_through() {
        let clock = VirtualClock::new();
        let payload = json!({ "data": { "type": "aggregate-event", "attributes": { "n": 3.0 } } });

        let request = ApiRequest::aggregate_event(&config(), &clock, payload.clone());

        assert_eq!(request.url_path(), "onsite/track-analytics");
        assert_eq!(request.body(), Some(&payload));
    }

    #[test]
    fn click_track_overrides_base_url_and_attempts_once() {
        let clock = VirtualClock::new();
        let mut profile = Profile::new();
        profile.set_email("a@b.com");

        let request = ApiRequest::click_track(
            &config(),
            &clock,
            "https://links.example.com/u/abc",
            &profile,
        );

        assert_eq!(request.max_attempts(), 1);
        assert!(request.headers().contains_key(HEADER_PROFILE_INFO));
        assert_eq!(
            request.url(&config()).unwrap().as_str(),
            "https://links.example.com/u/abc"
        );
    }

    #[test]
    fn prepare_for_queue_rearms_click_track() {
        let clock = VirtualClock::at(12_000);
        let config = config();
        let mut request =
            ApiRequest::click_track(&config, &clock, "https://links.example.com/u/abc", &Profile::new());

        request.prepare_for_queue(&config);

        assert_eq!(request.max_attempts(), config.network_max_attempts);
        assert_eq!(request.attempts(), 0);
        assert_eq!(
            request.headers().get(HEADER_CLICK_TIMESTAMP).unwrap(),
            "12"
        );
    }

    #[test]
    fn fetch_geofences_narrows_success_to_200() {
        let clock = VirtualClock::new();

        let request = ApiRequest::fetch_geofences(&config(), &clock, Some(40.7128), Some(-74.006));

        assert_eq!(request.url_path(), "client/geofences");
        assert_eq!(request.max_attempts(), 1);
        assert_eq!(*request.success_codes.start(), 200);
        assert_eq!(*request.success_codes.end(), 200);
        assert_eq!(request.query().get("page[size]").unwrap(), "30");
        assert_eq!(
            request.headers().get(super::HEADER_API_FILTERS).unwrap(),
            "and(equals(lat,40.713),equals(lng,-74.006))"
        );
    }

    #[test]
    fn fetch_geofences_without_coordinates_has_no_filter() {
        let clock = VirtualClock::new();

        let request = ApiRequest::fetch_geofences(&config(), &clock, None, None);

        assert!(!request.headers().contains_key(super::HEADER_API_FILTERS));
    }
}
