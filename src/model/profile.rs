//! Profile data model.
use std::collections::HashMap;

use super::{ProfileKey, PropertyValue};

/// Attributes of one user profile: identifiers plus an open property bag.
///
/// A `Profile` is a plain value object. Requests built from one take a snapshot at
/// construction, so mutating the profile afterwards never affects an already-built request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    properties: HashMap<ProfileKey, PropertyValue>,
}

impl Profile {
    /// Create an empty profile.
    pub fn new() -> Profile {
        Profile::default()
    }

    /// Look up a property.
    pub fn get(&self, key: &ProfileKey) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Set a property. Custom properties can use any key name that isn't already reserved.
    pub fn set(&mut self, key: ProfileKey, value: impl Into<PropertyValue>) -> &mut Profile {
        self.properties.insert(key, value.into());
        self
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &ProfileKey) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    /// The backing property map.
    pub fn properties(&self) -> &HashMap<ProfileKey, PropertyValue> {
        &self.properties
    }

    /// External (host-assigned) user id.
    pub fn external_id(&self) -> Option<&str> {
        self.get(&ProfileKey::ExternalId).and_then(PropertyValue::as_str)
    }

    /// Set the external user id.
    pub fn set_external_id(&mut self, external_id: impl Into<String>) -> &mut Profile {
        self.set(ProfileKey::ExternalId, external_id.into())
    }

    /// Email address.
    pub fn email(&self) -> Option<&str> {
        self.get(&ProfileKey::Email).and_then(PropertyValue::as_str)
    }

    /// Set the email address.
    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Profile {
        self.set(ProfileKey::Email, email.into())
    }

    /// Phone number.
    pub fn phone_number(&self) -> Option<&str> {
        self.get(&ProfileKey::PhoneNumber).and_then(PropertyValue::as_str)
    }

    /// Set the phone number.
    pub fn set_phone_number(&mut self, phone_number: impl Into<String>) -> &mut Profile {
        self.set(ProfileKey::PhoneNumber, phone_number.into())
    }

    /// SDK-generated anonymous id.
    pub fn anonymous_id(&self) -> Option<&str> {
        self.get(&ProfileKey::AnonymousId).and_then(PropertyValue::as_str)
    }

    pub(crate) fn set_anonymous_id(&mut self, anonymous_id: impl Into<String>) -> &mut Profile {
        self.set(ProfileKey::AnonymousId, anonymous_id.into())
    }

    /// Copy of this profile restricted to its identifier keys.
    pub fn identifiers(&self) -> Profile {
        Profile {
            properties: self
                .properties
                .iter()
                .filter(|(key, _)| key.is_identifier())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Merge properties from `other` into this profile, overwriting on conflict.
    pub fn merge(&mut self, other: &Profile) -> &mut Profile {
        for (key, value) in &other.properties {
            self.properties.insert(key.clone(), value.clone());
        }
        self
    }
}
