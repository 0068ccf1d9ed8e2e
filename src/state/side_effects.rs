//! The reactive coordinator between user state and the request queue.
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::api_client::ApiClient;
use crate::clock::{Cancellable, Clock};
use crate::config::Config;
use crate::model::{Profile, ProfileKey};
use crate::observers::SubscriptionHandle;
use crate::requests::{ApiRequest, RequestKind, RequestStatus};
use crate::state::change::StateChange;
use crate::state::user_state::UserState;

/// Host application lifecycle transitions the coordinator cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The app returned to the foreground.
    Resumed,
    /// The app left the foreground.
    Stopped,
}

/// Subscribes to state mutations and request completions, and turns them into enqueued
/// requests and targeted rollbacks.
///
/// Policy, in short: identifier/attribute edits coalesce into one debounced profile sync;
/// a full reset flushes immediately; push state changes register the token right away; a
/// backend field rejection rolls the offending identifier back; a failed token
/// registration clears push state so the next assertion re-registers.
pub struct StateSideEffects {
    inner: Arc<Inner>,
}

struct Inner {
    weak_self: Weak<Inner>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
    state: Arc<UserState>,
    api_client: Arc<dyn ApiClient>,

    /// The single debounce timer; rescheduling replaces it rather than stacking timers.
    timer: Mutex<Option<Box<dyn Cancellable>>>,
    pending: Mutex<PendingSync>,
    subscriptions: Mutex<Option<Subscriptions>>,
}

/// Why a debounced sync is pending. Attribute-only syncs are skipped at fire time if the
/// bucket has emptied in the meantime.
#[derive(Debug, Default, Clone, Copy)]
struct PendingSync {
    identifiers: bool,
    attributes: bool,
}

struct Subscriptions {
    state: SubscriptionHandle,
    api: SubscriptionHandle,
}

impl StateSideEffects {
    /// Wire the coordinator up to `state` and `api_client` and start observing.
    pub fn attach(
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        state: Arc<UserState>,
        api_client: Arc<dyn ApiClient>,
    ) -> StateSideEffects {
        let inner = Arc::new_cyclic(|weak_self| Inner {
            weak_self: weak_self.clone(),
            config,
            clock,
            state: state.clone(),
            api_client: api_client.clone(),
            timer: Mutex::new(None),
            pending: Mutex::new(PendingSync::default()),
            subscriptions: Mutex::new(None),
        });

        // Subscriptions hold weak references so a detached (or dropped) coordinator can't
        // be kept alive, or called back, through the buses it subscribed to.
        let state_subscription = {
            let weak = Arc::downgrade(&inner);
            state.on_state_change(move |change| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_state_change(change);
                }
            })
        };
        let api_subscription = {
            let weak = Arc::downgrade(&inner);
            api_client.on_request_complete(Arc::new(move |request| {
                if let Some(inner) = weak.upgrade() {
                    inner.after_request(request);
                }
            }))
        };

        *inner.lock_subscriptions() = Some(Subscriptions {
            state: state_subscription,
            api: api_subscription,
        });

        StateSideEffects { inner }
    }

    /// Detach from both buses and cancel any pending debounce timer. Idempotent.
    pub fn detach(&self) {
        let subscriptions = self.inner.lock_subscriptions().take();
        if let Some(subscriptions) = subscriptions {
            self.inner.state.off_state_change(subscriptions.state);
            self.inner.api_client.off_request_complete(subscriptions.api);
        }

        if let Some(timer) = self.inner.lock_timer().take() {
            timer.cancel();
        }
        *self.inner.lock_pending() = PendingSync::default();
    }

    /// Feed a host lifecycle transition into the coordinator.
    ///
    /// On resume, a known push token is re-asserted into state so registration state is
    /// re-evaluated against current permissions.
    pub fn handle_lifecycle_event(&self, event: LifecycleEvent) {
        if event == LifecycleEvent::Resumed {
            if let Some(token) = self.inner.state.push_token() {
                self.inner.state.set_push_token(&token);
            }
        }
    }
}

impl Drop for StateSideEffects {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Inner {
    fn on_state_change(&self, change: &StateChange) {
        match change {
            StateChange::ApiKey { old } => self.on_api_key_change(old.as_deref()),
            StateChange::Identifier { .. } => self.schedule_sync(true, false),
            StateChange::Attributes { .. } => {
                // Only a non-empty bucket is worth scheduling for.
                if !self.state.attributes().is_empty() {
                    self.schedule_sync(false, true);
                }
            }
            StateChange::Reset { .. } => self.flush_after_reset(),
            StateChange::KeyValue { key, .. } => match key {
                ProfileKey::PushState => self.on_push_state_change(),
                // Token alone is a no-op; push changes are captured by push state.
                ProfileKey::PushToken => {}
                _ => self.schedule_sync(true, false),
            },
        }
    }

    /// Coalesce a qualifying change into the single debounce timer, resetting it.
    fn schedule_sync(&self, identifiers: bool, attributes: bool) {
        {
            let mut pending = self.lock_pending();
            pending.identifiers |= identifiers;
            pending.attributes |= attributes;
        }

        let weak = self.weak_self.clone();
        let timer = self.clock.schedule(
            self.config.debounce_interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush_debounced();
                }
            }),
        );

        let mut slot = self.lock_timer();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        *slot = Some(timer);
    }

    /// Fired by the debounce timer. Re-reads state now, rather than replaying a value
    /// captured at schedule time, so the last writer before the flush wins.
    fn flush_debounced(&self) {
        let pending = {
            let mut pending = self.lock_pending();
            std::mem::take(&mut *pending)
        };
        self.lock_timer().take();

        let has_attributes = !self.state.attributes().is_empty();
        if !pending.identifiers && !has_attributes {
            log::debug!(target: "beacon", "skipping profile sync, nothing to send");
            return;
        }

        log::debug!(target: "beacon", "flushing profile update");
        let profile = self.state.as_profile(true);
        self.enqueue_token_or_profile(profile);
        // Once captured in a request, attributes don't linger in state or on disk.
        self.state.reset_attributes();
    }

    /// A reset bypasses the debounce entirely: flush the post-reset profile now, and
    /// re-assert the push token against it if one is held.
    fn flush_after_reset(&self) {
        *self.lock_pending() = PendingSync::default();
        if let Some(timer) = self.lock_timer().take() {
            timer.cancel();
        }

        let profile = self.state.as_profile(true);
        self.api_client.enqueue_profile(profile.clone());

        if let Some(token) = self.state.push_token() {
            self.api_client.enqueue_push_token(&token, profile);
        }
    }

    /// Profile data rides the push token endpoint when a token is held: one request both
    /// updates the profile and keeps the token attached to it.
    fn enqueue_token_or_profile(&self, profile: Profile) {
        match self.state.push_token() {
            Some(token) => self.api_client.enqueue_push_token(&token, profile),
            None => self.api_client.enqueue_profile(profile),
        }
    }

    fn on_push_state_change(&self) {
        if self.state.push_state().filter(|s| !s.is_empty()).is_some() {
            if let Some(token) = self.state.push_token() {
                self.api_client
                    .enqueue_push_token(&token, self.state.as_profile(false));
            }
        }
    }

    /// A key rotation with a registered token moves the registration: unregister from the
    /// previous key, register under the new one.
    fn on_api_key_change(&self, old_api_key: Option<&str>) {
        self.state.clear_event_buffers();

        if self.state.push_state().filter(|s| !s.is_empty()).is_none() {
            return;
        }
        let Some(token) = self.state.push_token() else {
            return;
        };

        let profile = self.state.as_profile(false);
        if let Some(old_api_key) = old_api_key {
            self.api_client
                .enqueue_unregister_push_token(old_api_key, &token, profile.clone());
        }
        self.api_client.enqueue_push_token(&token, profile);
    }

    fn after_request(&self, request: &ApiRequest) {
        if request.response_code() == Some(400) {
            let errors = &request.error_body().errors;
            if let Some(input_error) = errors.iter().find(|error| error.is_invalid_input()) {
                if input_error.points_at_email() {
                    log::warn!(target: "beacon", "invalid email, resetting email state");
                    self.state.reset_email();
                } else if input_error.points_at_phone_number() {
                    log::warn!(target: "beacon", "invalid phone number, resetting phone number state");
                    self.state.reset_phone_number();
                } else {
                    log::warn!(target: "beacon", "input error: {:?}", input_error.detail);
                }
            }
        } else if request.kind() == RequestKind::RegisterPushToken
            && request.status() == RequestStatus::Failed
        {
            // Forces re-registration the next time a token is asserted.
            self.state.clear_push_state();
        }
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<Box<dyn Cancellable>>> {
        self.timer
            .lock()
            .expect("thread holding timer lock should not panic")
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingSync> {
        self.pending
            .lock()
            .expect("thread holding pending-sync lock should not panic")
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Option<Subscriptions>> {
        self.subscriptions
            .lock()
            .expect("thread holding subscriptions lock should not panic")
    }
}
