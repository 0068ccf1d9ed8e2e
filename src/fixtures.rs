//! Shared test doubles: a virtual clock, scripted collaborators, and a recording queue.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::api_client::{ApiClient, RequestObserver};
use crate::clock::{Cancellable, Clock};
use crate::config::Config;
use crate::data_store::{DataStore, InMemoryDataStore};
use crate::model::{Event, Profile};
use crate::network_monitor::{AssumeConnected, NetworkMonitor};
use crate::observers::{ObserverSet, SubscriptionHandle};
use crate::requests::{ApiRequest, RequestMethod, RequestStatus, SendContext};
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};
use crate::{Error, Result};

/// Deterministic [`Clock`]: time only moves when a test advances it, and scheduled tasks
/// fire synchronously, in due order, during the advance.
pub(crate) struct VirtualClock {
    inner: Arc<VirtualClockInner>,
}

struct VirtualClockInner {
    now: Mutex<i64>,
    next_id: AtomicU64,
    tasks: Mutex<Vec<VirtualTask>>,
}

struct VirtualTask {
    id: u64,
    fire_at: i64,
    task: Box<dyn FnOnce() + Send>,
}

impl VirtualClock {
    pub fn new() -> VirtualClock {
        VirtualClock::at(0)
    }

    /// A clock starting at the given epoch-milliseconds instant.
    pub fn at(now: i64) -> VirtualClock {
        VirtualClock {
            inner: Arc::new(VirtualClockInner {
                now: Mutex::new(now),
                next_id: AtomicU64::new(1),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Advance time, firing every task that comes due, in due order. Tasks run with `now`
    /// set to their fire time, so re-scheduled work chains deterministically.
    pub fn advance(&self, delta: Duration) {
        self.advance_millis(delta.as_millis() as i64);
    }

    pub fn advance_millis(&self, delta: i64) {
        let target = *self.inner.lock_now() + delta;

        loop {
            let due = {
                let mut tasks = self.inner.lock_tasks();
                let next = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, task)| task.fire_at <= target)
                    .min_by_key(|(_, task)| (task.fire_at, task.id))
                    .map(|(index, _)| index);
                next.map(|index| tasks.remove(index))
            };

            // The task runs outside the lock so it can schedule or cancel freely.
            match due {
                Some(task) => {
                    {
                        let mut now = self.inner.lock_now();
                        if task.fire_at > *now {
                            *now = task.fire_at;
                        }
                    }
                    (task.task)();
                }
                None => break,
            }
        }

        *self.inner.lock_now() = target;
    }

    /// Number of not-yet-fired scheduled tasks.
    pub fn pending_tasks(&self) -> usize {
        self.inner.lock_tasks().len()
    }
}

impl Clock for VirtualClock {
    fn now_millis(&self) -> i64 {
        *self.inner.lock_now()
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> Box<dyn Cancellable> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let fire_at = *self.inner.lock_now() + delay.as_millis() as i64;
        self.inner.lock_tasks().push(VirtualTask { id, fire_at, task });

        Box::new(VirtualTimerHandle {
            id,
            inner: Arc::clone(&self.inner),
        })
    }
}

impl VirtualClockInner {
    fn lock_now(&self) -> std::sync::MutexGuard<'_, i64> {
        self.now.lock().expect("virtual clock lock poisoned")
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<VirtualTask>> {
        self.tasks.lock().expect("virtual clock lock poisoned")
    }
}

struct VirtualTimerHandle {
    id: u64,
    inner: Arc<VirtualClockInner>,
}

impl Cancellable for VirtualTimerHandle {
    fn cancel(&self) {
        self.inner.lock_tasks().retain(|task| task.id != self.id);
    }
}

// Matches the system clock's behavior: dropping a timer handle cancels the timer.
impl Drop for VirtualTimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// [`DataStore`] wrapper that counts fetches per key, for read-once assertions.
pub(crate) struct SpyDataStore {
    inner: InMemoryDataStore,
    fetches: Mutex<HashMap<String, u32>>,
}

impl SpyDataStore {
    pub fn new() -> SpyDataStore {
        SpyDataStore {
            inner: InMemoryDataStore::new(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetch_count(&self, key: &str) -> u32 {
        self.fetches
            .lock()
            .expect("spy store lock poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

impl DataStore for SpyDataStore {
    fn fetch(&self, key: &str) -> Option<String> {
        *self
            .fetches
            .lock()
            .expect("spy store lock poisoned")
            .entry(key.to_owned())
            .or_insert(0) += 1;
        self.inner.fetch(key)
    }

    fn store(&self, key: &str, value: &str) {
        self.inner.store(key, value);
    }

    fn clear(&self, key: &str) {
        self.inner.clear(key);
    }
}

/// [`NetworkMonitor`] that always reports offline.
pub(crate) struct OfflineNetwork;

impl NetworkMonitor for OfflineNetwork {
    fn is_connected(&self) -> bool {
        false
    }
}

/// One request observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub url: String,
    pub method: RequestMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

/// [`HttpTransport`] that replays scripted responses and records every exchange.
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> ScriptedTransport {
        ScriptedTransport {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script the next response.
    pub fn respond(&self, response: TransportResponse) {
        self.responses
            .lock()
            .expect("transport lock poisoned")
            .push_back(Ok(response));
    }

    /// Script a transport-level I/O failure for the next exchange.
    pub fn fail_next(&self) {
        self.responses
            .lock()
            .expect("transport lock poisoned")
            .push_back(Err(Error::Io(Arc::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "scripted transport failure",
            )))));
    }

    /// Every exchange attempted so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("transport lock poisoned")
            .clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn execute(&self, request: TransportRequest<'_>) -> Result<TransportResponse> {
        self.requests
            .lock()
            .expect("transport lock poisoned")
            .push(RecordedRequest {
                url: request.url.to_string(),
                method: request.method,
                headers: request.headers.clone(),
                body: request.body,
            });

        self.responses
            .lock()
            .expect("transport lock poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response for {}", request.url))
    }
}

/// Send `request` against a one-shot scripted response and return the resulting status.
pub(crate) fn respond_with(
    request: &mut ApiRequest,
    config: &Config,
    clock: &VirtualClock,
    status: u16,
    body: &str,
) -> RequestStatus {
    respond_with_headers(request, config, clock, status, HashMap::new(), body)
}

pub(crate) fn respond_with_headers(
    request: &mut ApiRequest,
    config: &Config,
    clock: &VirtualClock,
    status: u16,
    headers: HashMap<String, String>,
    body: &str,
) -> RequestStatus {
    let transport = ScriptedTransport::new();
    transport.respond(TransportResponse {
        status,
        headers,
        body: body.to_owned(),
    });

    request.send(
        &SendContext {
            config,
            clock,
            network: &AssumeConnected,
            transport: &transport,
        },
        |_| {},
    )
}

/// One call recorded by [`RecordingApiClient`].
#[derive(Debug, Clone)]
pub(crate) enum EnqueuedCall {
    Profile(Profile),
    Event { event: Event, profile: Profile },
    PushToken { token: String, profile: Profile },
    UnregisterPushToken {
        api_key: String,
        token: String,
        profile: Profile,
    },
    Aggregate(Value),
}

impl EnqueuedCall {
    /// Compact label for order-of-calls assertions.
    pub fn label(&self) -> &'static str {
        match self {
            EnqueuedCall::Profile(_) => "profile",
            EnqueuedCall::Event { .. } => "event",
            EnqueuedCall::PushToken { .. } => "push_token",
            EnqueuedCall::UnregisterPushToken { .. } => "unregister_push_token",
            EnqueuedCall::Aggregate(_) => "aggregate",
        }
    }
}

/// [`ApiClient`] that records every enqueue and lets tests broadcast completions.
pub(crate) struct RecordingApiClient {
    calls: Mutex<Vec<EnqueuedCall>>,
    completions: ObserverSet<ApiRequest>,
}

impl RecordingApiClient {
    pub fn new() -> RecordingApiClient {
        RecordingApiClient {
            calls: Mutex::new(Vec::new()),
            completions: ObserverSet::new(),
        }
    }

    pub fn calls(&self) -> Vec<EnqueuedCall> {
        self.calls.lock().expect("api client lock poisoned").clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.calls().iter().map(EnqueuedCall::label).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("api client lock poisoned").clear();
    }

    /// Simulate the dispatch queue reporting a finished request.
    pub fn complete(&self, request: &ApiRequest) {
        self.completions.emit(request);
    }

    fn record(&self, call: EnqueuedCall) {
        self.calls.lock().expect("api client lock poisoned").push(call);
    }
}

impl ApiClient for RecordingApiClient {
    fn enqueue_profile(&self, profile: Profile) {
        self.record(EnqueuedCall::Profile(profile));
    }

    fn enqueue_event(&self, event: Event, profile: Profile) {
        self.record(EnqueuedCall::Event { event, profile });
    }

    fn enqueue_push_token(&self, token: &str, profile: Profile) {
        self.record(EnqueuedCall::PushToken {
            token: token.to_owned(),
            profile,
        });
    }

    fn enqueue_unregister_push_token(&self, api_key: &str, token: &str, profile: Profile) {
        self.record(EnqueuedCall::UnregisterPushToken {
            api_key: api_key.to_owned(),
            token: token.to_owned(),
            profile,
        });
    }

    fn enqueue_aggregate_event(&self, payload: Value) {
        self.record(EnqueuedCall::Aggregate(payload));
    }

    fn on_request_complete(&self, observer: RequestObserver) -> SubscriptionHandle {
        self.completions.subscribe_arc(observer)
    }

    fn off_request_complete(&self, handle: SubscriptionHandle) {
        self.completions.unsubscribe(handle);
    }
}
