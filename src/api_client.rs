//! The request-dispatch collaborator consumed by the reactive layer.
use std::sync::Arc;

use serde_json::Value;

use crate::model::{Event, Profile};
use crate::observers::SubscriptionHandle;
use crate::requests::ApiRequest;

/// Observer invoked after a request attempt completes (successfully or not).
pub type RequestObserver = Arc<dyn Fn(&ApiRequest) + Send + Sync>;

/// The transport queue that actually delivers requests.
///
/// This crate produces [`ApiRequest`]s and reacts to their completions; draining the
/// durable queue, scheduling flushes and retry pacing live in the host integration. The
/// integration is expected to persist enqueued requests (via
/// [`ApiRequest::to_json`]/[`ApiRequest::from_json`]) so work survives process death.
pub trait ApiClient: Send + Sync {
    /// Queue a profile upsert for the given profile snapshot.
    fn enqueue_profile(&self, profile: Profile);

    /// Queue an event track for the given event and profile snapshots.
    fn enqueue_event(&self, event: Event, profile: Profile);

    /// Queue a push token registration.
    fn enqueue_push_token(&self, token: &str, profile: Profile);

    /// Queue a push token removal against an explicit API key (supports key rotation).
    fn enqueue_unregister_push_token(&self, api_key: &str, token: &str, profile: Profile);

    /// Queue a pre-aggregated analytics payload.
    fn enqueue_aggregate_event(&self, payload: Value);

    /// Subscribe to request completion notifications.
    fn on_request_complete(&self, observer: RequestObserver) -> SubscriptionHandle;

    /// Remove a completion subscription. Idempotent.
    fn off_request_complete(&self, handle: SubscriptionHandle);
}
