//! The in-memory + persisted record of the current user.
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::data_store::DataStore;
use crate::model::{Event, EventKey, Profile, ProfileKey, PropertyValue};
use crate::observers::{ObserverSet, SubscriptionHandle};
use crate::requests::ApiRequest;
use crate::state::buffers::{RecentEventBuffer, WindowedEventBuffer};
use crate::state::change::StateChange;
use crate::state::property::{PersistentAttributes, PersistentString};

// Storage keys.
const API_KEY: &str = "api_key";
const EXTERNAL_ID: &str = "external_id";
const EMAIL: &str = "email";
const PHONE_NUMBER: &str = "phone_number";
const ANONYMOUS_ID: &str = "anonymous_id";
const ATTRIBUTES: &str = "attributes";
const PUSH_TOKEN: &str = "push_token";
const PUSH_STATE: &str = "push_state";

/// Stores information on the currently active user: identifiers, the custom attribute
/// bucket, and push registration state.
///
/// Every field is persisted independently through the injected [`DataStore`], hydrated
/// lazily on first access and cached thereafter. Mutations go through validating setters
/// and broadcast a [`StateChange`] to subscribed observers.
///
/// One `UserState` per process; concurrent reads are safe, but the design assumes a single
/// writer per key.
pub struct UserState {
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    data_store: Arc<dyn DataStore>,

    api_key: PersistentString,
    external_id: PersistentString,
    email: PersistentString,
    phone_number: PersistentString,
    anonymous_id: PersistentString,
    attributes: PersistentAttributes,
    push_token: PersistentString,
    push_state: PersistentString,

    observers: ObserverSet<StateChange>,
    profile_event_observers: ObserverSet<Event>,
    recent_events: RecentEventBuffer,
    pending_events: WindowedEventBuffer,
}

impl UserState {
    /// Create the state store for this process.
    pub fn new(
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        data_store: Arc<dyn DataStore>,
    ) -> UserState {
        UserState {
            api_key: PersistentString::new(API_KEY),
            external_id: PersistentString::new(EXTERNAL_ID),
            email: PersistentString::new(EMAIL),
            phone_number: PersistentString::new(PHONE_NUMBER),
            anonymous_id: PersistentString::with_fallback(ANONYMOUS_ID, || {
                uuid::Uuid::new_v4().to_string()
            }),
            attributes: PersistentAttributes::new(ATTRIBUTES),
            push_token: PersistentString::new(PUSH_TOKEN),
            push_state: PersistentString::new(PUSH_STATE),
            observers: ObserverSet::new(),
            profile_event_observers: ObserverSet::new(),
            recent_events: RecentEventBuffer::new(config.recent_event_capacity),
            pending_events: WindowedEventBuffer::new(clock.clone(), config.event_buffer_ttl),
            config,
            clock,
            data_store,
        }
    }

    /// Register an observer notified on every state change, in occurrence order.
    pub fn on_state_change(
        &self,
        observer: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.observers.subscribe(observer)
    }

    /// De-register a state change observer. Idempotent.
    pub fn off_state_change(&self, handle: SubscriptionHandle) {
        self.observers.unsubscribe(handle);
    }

    /// The active public API key: the value in state if one was set, else the configured
    /// key.
    pub fn api_key(&self) -> String {
        self.api_key
            .get(self.store())
            .unwrap_or_else(|| self.config.api_key.clone())
    }

    /// Rotate the public API key.
    pub fn set_api_key(&self, api_key: &str) {
        if let Some(old) = self.api_key.set(self.store(), api_key) {
            let old = old.or_else(|| Some(self.config.api_key.clone()));
            self.broadcast(StateChange::ApiKey { old });
        }
    }

    /// External (host-assigned) user id.
    pub fn external_id(&self) -> Option<String> {
        self.external_id.get(self.store())
    }

    /// Set the external user id.
    pub fn set_external_id(&self, external_id: &str) {
        if let Some(old) = self.external_id.set(self.store(), external_id) {
            self.broadcast(StateChange::Identifier {
                key: ProfileKey::ExternalId,
                old,
            });
        }
    }

    /// Email address.
    pub fn email(&self) -> Option<String> {
        self.email.get(self.store())
    }

    /// Set the email address.
    pub fn set_email(&self, email: &str) {
        if let Some(old) = self.email.set(self.store(), email) {
            self.broadcast(StateChange::Identifier {
                key: ProfileKey::Email,
                old,
            });
        }
    }

    /// Phone number.
    pub fn phone_number(&self) -> Option<String> {
        self.phone_number.get(self.store())
    }

    /// Set the phone number.
    pub fn set_phone_number(&self, phone_number: &str) {
        if let Some(old) = self.phone_number.set(self.store(), phone_number) {
            self.broadcast(StateChange::Identifier {
                key: ProfileKey::PhoneNumber,
                old,
            });
        }
    }

    /// SDK-generated anonymous id. Synthesized and persisted on first access; regenerated
    /// after [`UserState::reset`].
    pub fn anonymous_id(&self) -> String {
        self.anonymous_id.get(self.store()).unwrap_or_default()
    }

    /// Current push token.
    pub fn push_token(&self) -> Option<String> {
        self.push_token.get(self.store())
    }

    /// Current push registration state: the canonical serialized registration body, used to
    /// detect when re-registration is needed.
    pub fn push_state(&self) -> Option<String> {
        self.push_state.get(self.store())
    }

    /// Set the push token. Also recomputes the push state from the current profile, which
    /// is what actually drives a registration request.
    pub fn set_push_token(&self, token: &str) {
        if let Some(old) = self.push_token.set(self.store(), token) {
            self.broadcast(StateChange::KeyValue {
                key: ProfileKey::PushToken,
                old,
            });
        }

        let body = ApiRequest::register_push_token(
            &self.config,
            self.clock.as_ref(),
            token,
            &self.as_profile(false),
        )
        .body()
        .map(|body| body.to_string())
        .unwrap_or_default();

        if let Some(old) = self.push_state.set(self.store(), &body) {
            self.broadcast(StateChange::KeyValue {
                key: ProfileKey::PushState,
                old,
            });
        }
    }

    /// Clear the push registration state, forcing re-registration on the next token
    /// assertion. Bypasses change notification.
    pub fn clear_push_state(&self) {
        self.push_state.reset(self.store());
    }

    /// Current contents of the custom attribute bucket.
    pub fn attributes(&self) -> HashMap<ProfileKey, PropertyValue> {
        self.attributes.get(self.store())
    }

    /// Set one attribute. Identifier keys are routed to their validating setters; anything
    /// else lands in the attribute bucket.
    pub fn set_attribute(&self, key: ProfileKey, value: PropertyValue) {
        match key {
            ProfileKey::Email
            | ProfileKey::ExternalId
            | ProfileKey::PhoneNumber => match value.as_str() {
                Some(value) => match key {
                    ProfileKey::Email => self.set_email(value),
                    ProfileKey::ExternalId => self.set_external_id(value),
                    _ => self.set_phone_number(value),
                },
                None => {
                    log::error!(target: "beacon", "unable to use non-string value {value:?} for identifier {key}");
                }
            },
            key => {
                let old = self.attributes.get(self.store());
                let mut updated = old.clone();
                updated.insert(key, value);
                self.attributes.set(self.store(), &updated);
                self.broadcast(StateChange::Attributes { old });
            }
        }
    }

    /// Get all user data in state as a [`Profile`] model object.
    pub fn as_profile(&self, with_attributes: bool) -> Profile {
        let mut profile = Profile::new();
        if let Some(external_id) = self.external_id() {
            profile.set_external_id(external_id);
        }
        if let Some(email) = self.email() {
            profile.set_email(email);
        }
        if let Some(phone_number) = self.phone_number() {
            profile.set_phone_number(phone_number);
        }
        profile.set_anonymous_id(self.anonymous_id());

        if with_attributes {
            for (key, value) in self.attributes() {
                profile.set(key, value);
            }
        }
        profile
    }

    /// Update user state from a new [`Profile`] model object.
    ///
    /// If a profile with explicit identifiers is already in state, state is reset first;
    /// this preserves merging into a purely anonymous profile while preventing
    /// cross-profile bleed.
    pub fn set_profile(&self, profile: Profile) {
        if self.external_id().is_some() || self.email().is_some() || self.phone_number().is_some()
        {
            self.reset();
        }

        if let Some(external_id) = profile.external_id() {
            self.set_external_id(external_id);
        }
        if let Some(email) = profile.email() {
            self.set_email(email);
        }
        if let Some(phone_number) = profile.phone_number() {
            self.set_phone_number(phone_number);
        }

        let attributes: HashMap<ProfileKey, PropertyValue> = profile
            .properties()
            .iter()
            .filter(|(key, _)| !key.is_identifier())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !attributes.is_empty() {
            let old = self.attributes.get(self.store());
            let mut updated = old.clone();
            for (key, value) in attributes {
                updated.insert(key, value);
            }
            self.attributes.set(self.store(), &updated);
            self.broadcast(StateChange::Attributes { old });
        }
    }

    /// Reset all user identifiers to defaults and clear custom attributes. A new anonymous
    /// id will be generated next time it is accessed.
    pub fn reset(&self) {
        let old = self.as_profile(true);

        self.external_id.reset(self.store());
        self.email.reset(self.store());
        self.phone_number.reset(self.store());
        self.anonymous_id.reset(self.store());
        self.attributes.reset(self.store());

        self.broadcast(StateChange::Reset { old });
        log::debug!(target: "beacon", "reset internal user state");
    }

    /// Clear the attribute bucket, leaving identifiers intact. Used once pending attributes
    /// have been captured into a request.
    pub fn reset_attributes(&self) {
        let old = self.attributes.get(self.store());
        self.attributes.reset(self.store());
        self.broadcast(StateChange::Attributes { old });
    }

    /// Roll back the email field after the backend rejected it. Bypasses change
    /// notification so the rollback doesn't schedule another sync of the bad value.
    pub fn reset_email(&self) {
        self.email.reset(self.store());
    }

    /// Roll back the phone number field after the backend rejected it.
    pub fn reset_phone_number(&self) {
        self.phone_number.reset(self.store());
    }

    /// Enrich `event` with a local unique id and record time, feed the in-memory buffers,
    /// and hand it to profile-event observers (or hold it briefly for a late subscriber).
    ///
    /// Returns the enriched event, which is what should be enqueued for delivery.
    pub fn record_event(&self, mut event: Event) -> Event {
        if event.unique_id().is_none() {
            event.set_unique_id(uuid::Uuid::new_v4().to_string());
        }
        event.set(
            EventKey::Time,
            self.clock.iso_time(self.clock.now_millis()),
        );

        self.recent_events.push(event.clone());

        if self.profile_event_observers.is_empty() {
            self.pending_events.push(event.clone());
        } else {
            self.profile_event_observers.emit(&event);
        }

        event
    }

    /// Register an observer notified for every recorded event.
    pub fn on_profile_event(
        &self,
        observer: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.profile_event_observers.subscribe(observer)
    }

    /// De-register a profile event observer. Idempotent.
    pub fn off_profile_event(&self, handle: SubscriptionHandle) {
        self.profile_event_observers.unsubscribe(handle);
    }

    /// Recent events in chronological order (bounded ring; reads do not clear).
    pub fn recent_events(&self) -> Vec<Event> {
        self.recent_events.events()
    }

    /// Take the events recorded before any profile-event observer was registered.
    pub fn take_buffered_events(&self) -> Vec<Event> {
        self.pending_events.consume()
    }

    /// Drop all buffered events. Called on API key rotation to prevent cross-account
    /// leakage.
    pub fn clear_event_buffers(&self) {
        self.recent_events.clear();
        self.pending_events.clear();
    }

    fn store(&self) -> &dyn DataStore {
        self.data_store.as_ref()
    }

    fn broadcast(&self, change: StateChange) {
        log::debug!(target: "beacon", "broadcasting state change for {:?}", change_key(&change));
        self.observers.emit(&change);
    }
}

fn change_key(change: &StateChange) -> Option<&ProfileKey> {
    match change {
        StateChange::Identifier { key, .. } | StateChange::KeyValue { key, .. } => Some(key),
        _ => None,
    }
}
