//! Closed key sets for profile and event property maps.
use std::fmt;

/// All profile keys recognized by the Beacon APIs.
///
/// Custom properties use the [`ProfileKey::Custom`] variant with any name that isn't already
/// reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileKey {
    // Identifiers. Prefer the explicit setter on state for each of these.
    /// External (host-assigned) user id.
    ExternalId,
    /// Email address.
    Email,
    /// Phone number.
    PhoneNumber,
    /// SDK-generated anonymous id.
    AnonymousId,

    // Push properties.
    /// Push notification token.
    PushToken,
    /// Serialized push registration state.
    PushState,

    // Personal information.
    /// First name.
    FirstName,
    /// Last name.
    LastName,
    /// Organization.
    Organization,
    /// Job title.
    Title,
    /// Avatar image URL.
    Image,

    // Location attributes.
    /// Address line 1.
    Address1,
    /// Address line 2.
    Address2,
    /// City.
    City,
    /// Country.
    Country,
    /// Latitude.
    Latitude,
    /// Longitude.
    Longitude,
    /// Region/state.
    Region,
    /// Postal code.
    Zip,
    /// Time zone.
    Timezone,

    /// Custom property with any non-reserved name.
    Custom(String),
}

impl ProfileKey {
    /// Wire name of this key.
    pub fn name(&self) -> &str {
        match self {
            ProfileKey::ExternalId => "external_id",
            ProfileKey::Email => "email",
            ProfileKey::PhoneNumber => "phone_number",
            ProfileKey::AnonymousId => "anonymous_id",
            ProfileKey::PushToken => "push_token",
            ProfileKey::PushState => "push_state",
            ProfileKey::FirstName => "first_name",
            ProfileKey::LastName => "last_name",
            ProfileKey::Organization => "organization",
            ProfileKey::Title => "title",
            ProfileKey::Image => "image",
            ProfileKey::Address1 => "address1",
            ProfileKey::Address2 => "address2",
            ProfileKey::City => "city",
            ProfileKey::Country => "country",
            ProfileKey::Latitude => "latitude",
            ProfileKey::Longitude => "longitude",
            ProfileKey::Region => "region",
            ProfileKey::Zip => "zip",
            ProfileKey::Timezone => "timezone",
            ProfileKey::Custom(name) => name,
        }
    }

    /// Resolve a wire name back to a key. Unreserved names become [`ProfileKey::Custom`].
    pub fn from_name(name: &str) -> ProfileKey {
        match name {
            "external_id" => ProfileKey::ExternalId,
            "email" => ProfileKey::Email,
            "phone_number" => ProfileKey::PhoneNumber,
            "anonymous_id" => ProfileKey::AnonymousId,
            "push_token" => ProfileKey::PushToken,
            "push_state" => ProfileKey::PushState,
            "first_name" => ProfileKey::FirstName,
            "last_name" => ProfileKey::LastName,
            "organization" => ProfileKey::Organization,
            "title" => ProfileKey::Title,
            "image" => ProfileKey::Image,
            "address1" => ProfileKey::Address1,
            "address2" => ProfileKey::Address2,
            "city" => ProfileKey::City,
            "country" => ProfileKey::Country,
            "latitude" => ProfileKey::Latitude,
            "longitude" => ProfileKey::Longitude,
            "region" => ProfileKey::Region,
            "zip" => ProfileKey::Zip,
            "timezone" => ProfileKey::Timezone,
            other => ProfileKey::Custom(other.to_owned()),
        }
    }

    /// Whether this key identifies the profile (as opposed to describing it).
    pub fn is_identifier(&self) -> bool {
        matches!(
            self,
            ProfileKey::ExternalId
                | ProfileKey::Email
                | ProfileKey::PhoneNumber
                | ProfileKey::AnonymousId
        )
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All event property keys recognized by the Beacon APIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKey {
    /// Client-generated unique id for server-side deduplication.
    EventId,
    /// Monetary or numeric value of the event.
    Value,
    /// Device token, appended to push-open events.
    PushToken,
    /// Timestamp property added when the event is recorded.
    Time,
    /// Custom property with any non-reserved name.
    Custom(String),
}

impl EventKey {
    /// Wire name of this key.
    pub fn name(&self) -> &str {
        match self {
            EventKey::EventId => "$event_id",
            EventKey::Value => "$value",
            EventKey::PushToken => "push_token",
            EventKey::Time => "_time",
            EventKey::Custom(name) => name,
        }
    }

    /// Resolve a wire name back to a key.
    pub fn from_name(name: &str) -> EventKey {
        match name {
            "$event_id" => EventKey::EventId,
            "$value" => EventKey::Value,
            "push_token" => EventKey::PushToken,
            "_time" => EventKey::Time,
            other => EventKey::Custom(other.to_owned()),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common client-side event metrics. Custom metrics use [`EventMetric::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventMetric {
    /// A push notification was opened.
    OpenedPush,
    /// The app was opened.
    OpenedApp,
    /// A product page was viewed.
    ViewedProduct,
    /// A product was added to the cart.
    AddedToCart,
    /// Checkout was started.
    StartedCheckout,
    /// Custom metric with any name.
    Custom(String),
}

impl EventMetric {
    /// Wire name of this metric.
    pub fn name(&self) -> &str {
        match self {
            EventMetric::OpenedPush => "$opened_push",
            EventMetric::OpenedApp => "Opened App",
            EventMetric::ViewedProduct => "Viewed Product",
            EventMetric::AddedToCart => "Added to Cart",
            EventMetric::StartedCheckout => "Started Checkout",
            EventMetric::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for EventMetric {
    fn from(name: &str) -> EventMetric {
        EventMetric::Custom(name.to_owned())
    }
}
