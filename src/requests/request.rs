//! The durable, retryable unit of outbound work and its lifecycle state machine.
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::OnceLock;
use std::time::Duration;

use rand::{thread_rng, Rng};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::config::Config;
use crate::network_monitor::NetworkMonitor;
use crate::requests::error_response::{decode_error_response, ErrorResponse};
use crate::requests::RequestKind;
use crate::transport::{HttpTransport, TransportRequest, TransportResponse};
use crate::{Error, Result};

// Common header names.
pub(crate) const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub(crate) const HEADER_ACCEPT: &str = "Accept";
pub(crate) const HEADER_USER_AGENT: &str = "User-Agent";
pub(crate) const HEADER_REVISION: &str = "Revision";
pub(crate) const HEADER_MOBILE: &str = "X-Beacon-Mobile";
pub(crate) const HEADER_ATTEMPT_COUNT: &str = "X-Beacon-Attempt-Count";
pub(crate) const HEADER_RETRY_AFTER: &str = "Retry-After";
pub(crate) const TYPE_JSON: &str = "application/json";

/// The only automatically retryable response code.
const HTTP_RETRY: u16 = 429;

/// HTTP method of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestMethod {
    /// HTTP GET.
    #[serde(rename = "GET")]
    Get,
    /// HTTP POST.
    #[serde(rename = "POST")]
    Post,
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
        })
    }
}

/// Lifecycle status of an [`ApiRequest`].
///
/// `Unsent → Inflight → {Complete | PendingRetry | Failed}`, and `PendingRetry → Inflight`
/// when the dispatcher re-invokes [`ApiRequest::send`]. `Complete` and `Failed` are terminal
/// for the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    /// Never attempted.
    Unsent,
    /// An attempt is in progress.
    Inflight,
    /// Rate limited; eligible for another attempt.
    PendingRetry,
    /// Accepted by the backend.
    Complete,
    /// Rejected, out of attempts, or hit a transport failure.
    Failed,
}

/// Collaborators one send attempt needs, passed in by the dispatching layer.
pub struct SendContext<'a> {
    /// SDK configuration.
    pub config: &'a Config,
    /// Time source for lifecycle stamps.
    pub clock: &'a dyn Clock,
    /// Connectivity guard consulted before any attempt.
    pub network: &'a dyn NetworkMonitor,
    /// Blocking HTTP transport.
    pub transport: &'a dyn HttpTransport,
}

/// One outbound API call: immutable identity plus mutable lifecycle state.
///
/// Identity (`uuid`, path, method, headers, query, body) is fixed at construction by the
/// per-endpoint constructors in this module and survives JSON persistence. Lifecycle state
/// (status, attempts, timestamps, response data) is attempt-scoped and deliberately not
/// persisted: a queued entry represents work still to do, not attempt history.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) kind: RequestKind,
    /// Full URL override; `None` means the configured base URL. Click tracking captures the
    /// whole tracking URL here.
    pub(crate) base_url: Option<String>,
    pub(crate) url_path: String,
    pub(crate) method: RequestMethod,
    pub(crate) uuid: String,
    pub(crate) queued_time: i64,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) query: HashMap<String, String>,
    pub(crate) body: Option<Value>,
    pub(crate) max_attempts: u32,
    pub(crate) success_codes: RangeInclusive<u16>,

    status: RequestStatus,
    attempts: u32,
    start_time: Option<i64>,
    end_time: Option<i64>,
    response_code: Option<u16>,
    response_headers: HashMap<String, String>,
    response_body: Option<String>,
    error_body: OnceLock<ErrorResponse>,
}

/// To facilitate deduplication, requests are compared by `uuid` alone: a request
/// deserialized from persistence is still "equal" to its original instance, regardless of
/// kind or field differences.
impl PartialEq for ApiRequest {
    fn eq(&self, other: &ApiRequest) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for ApiRequest {}

impl std::hash::Hash for ApiRequest {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json().to_string())
    }
}

impl ApiRequest {
    pub(crate) fn new(
        kind: RequestKind,
        url_path: impl Into<String>,
        method: RequestMethod,
        config: &Config,
        clock: &dyn Clock,
    ) -> ApiRequest {
        let max_attempts = config.network_max_attempts;
        let headers = HashMap::from([
            (HEADER_CONTENT_TYPE.to_owned(), TYPE_JSON.to_owned()),
            (HEADER_ACCEPT.to_owned(), TYPE_JSON.to_owned()),
            (HEADER_REVISION.to_owned(), config.api_revision.clone()),
            (HEADER_USER_AGENT.to_owned(), config.user_agent.clone()),
            (HEADER_MOBILE.to_owned(), "1".to_owned()),
            (
                HEADER_ATTEMPT_COUNT.to_owned(),
                format!("0/{max_attempts}"),
            ),
        ]);

        ApiRequest {
            kind,
            base_url: None,
            url_path: url_path.into(),
            method,
            uuid: uuid::Uuid::new_v4().to_string(),
            queued_time: clock.now_millis(),
            headers,
            query: HashMap::new(),
            body: None,
            max_attempts,
            success_codes: kind.success_codes(),
            status: RequestStatus::Unsent,
            attempts: 0,
            start_time: None,
            end_time: None,
            response_code: None,
            response_headers: HashMap::new(),
            response_body: None,
            error_body: OnceLock::new(),
        }
    }

    /// Which endpoint this request targets.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Stable unique identifier of this request.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// URL path relative to the base URL.
    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    /// HTTP method.
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Request headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Request query parameters.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Structured JSON body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Wall time this request was first enqueued, epoch millis.
    pub fn queued_time(&self) -> i64 {
        self.queued_time
    }

    /// Current lifecycle status.
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Number of send attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Maximum number of send attempts before a rate-limited request fails for good.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timestamp of the latest send attempt, epoch millis.
    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    /// Timestamp the request reached a terminal status, epoch millis.
    pub fn end_time(&self) -> Option<i64> {
        self.end_time
    }

    /// HTTP status code from the last attempt.
    pub fn response_code(&self) -> Option<u16> {
        self.response_code
    }

    /// Response body text from the last attempt.
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }

    /// Response header lookup, case-insensitive.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Typed errors decoded from the response body. Decoded lazily, at most once per
    /// attempt; an absent or unreadable body yields an empty error list.
    pub fn error_body(&self) -> &ErrorResponse {
        self.error_body.get_or_init(|| {
            self.response_body
                .as_deref()
                .map(decode_error_response)
                .unwrap_or_default()
        })
    }

    /// Update status, stamping start/end times on actual transitions only.
    fn set_status(&mut self, clock: &dyn Clock, value: RequestStatus) {
        if self.status == value {
            return;
        }
        self.status = value;

        if value == RequestStatus::Inflight {
            self.start_time = Some(clock.now_millis());
        } else if matches!(value, RequestStatus::Complete | RequestStatus::Failed) {
            self.end_time = Some(clock.now_millis());
        }
    }

    fn bump_attempts(&mut self) {
        self.attempts += 1;
        self.headers.insert(
            HEADER_ATTEMPT_COUNT.to_owned(),
            format!("{}/{}", self.attempts, self.max_attempts),
        );
    }

    pub(crate) fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.headers.insert(
            HEADER_ATTEMPT_COUNT.to_owned(),
            format!("0/{}", self.max_attempts),
        );
    }

    /// Compile the base URL, path and query into a [`Url`].
    pub fn url(&self, config: &Config) -> Result<Url> {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(&config.base_url)
            .trim_end_matches('/');
        let full = if self.url_path.is_empty() {
            base.to_owned()
        } else {
            format!("{base}/{}", self.url_path)
        };

        if self.query.is_empty() {
            Url::parse(&full)
        } else {
            Url::parse_with_params(
                &full,
                self.query.iter().map(|(key, value)| (key.as_str(), value.as_str())),
            )
        }
        .map_err(Error::InvalidBaseUrl)
    }

    /// Perform one blocking send attempt and advance the state machine.
    ///
    /// While the network is unavailable this is a no-op: no attempt is counted and the
    /// status is returned unchanged. Otherwise the request transitions to
    /// [`RequestStatus::Inflight`], `before_send` is invoked (observers see the in-flight
    /// state), and the attempt runs to a response or an I/O failure.
    ///
    /// Classification: a code inside this request's success range completes it; 429 leaves
    /// it [`RequestStatus::PendingRetry`] while attempts remain, [`RequestStatus::Failed`]
    /// after; every other code, and any transport failure, fails it immediately.
    pub fn send(
        &mut self,
        ctx: &SendContext<'_>,
        before_send: impl FnOnce(&ApiRequest),
    ) -> RequestStatus {
        if !ctx.network.is_connected() {
            log::debug!(target: "beacon", "send of {} prevented while network unavailable", self.kind.label());
            return self.status;
        }

        self.set_status(ctx.clock, RequestStatus::Inflight);
        self.bump_attempts();
        before_send(self);

        let url = match self.url(ctx.config) {
            Ok(url) => url,
            Err(err) => {
                log::error!(target: "beacon", "failed to build url for {}: {err}", self.kind.label());
                self.set_status(ctx.clock, RequestStatus::Failed);
                return self.status;
            }
        };

        let request = TransportRequest {
            url,
            method: self.method,
            headers: &self.headers,
            body: self.body.as_ref().map(|body| body.to_string()),
            timeout: ctx.config.network_timeout,
        };

        match ctx.transport.execute(request) {
            Ok(response) => self.record_response(ctx.clock, response),
            Err(err) => {
                log::error!(target: "beacon", "transport failure sending {}: {err}", self.kind.label());
                self.set_status(ctx.clock, RequestStatus::Failed);
            }
        }

        self.status
    }

    fn record_response(&mut self, clock: &dyn Clock, response: TransportResponse) {
        self.response_code = Some(response.status);
        self.response_headers = response.headers;
        self.response_body = Some(response.body);
        // A fresh attempt invalidates any previously decoded errors.
        self.error_body = OnceLock::new();

        let status = if self.success_codes.contains(&response.status) {
            RequestStatus::Complete
        } else if response.status == HTTP_RETRY {
            if self.attempts < self.max_attempts {
                RequestStatus::PendingRetry
            } else {
                RequestStatus::Failed
            }
        } else {
            RequestStatus::Failed
        };

        self.set_status(clock, status);
    }

    /// Compute how long the dispatcher should wait before re-sending a rate-limited request.
    ///
    /// Obeys the `Retry-After` response header plus jitter when present. Otherwise falls
    /// back to exponential backoff with a floor at the regular flush cadence and a ceiling
    /// from configuration.
    pub fn compute_retry_interval(&self, config: &Config) -> Duration {
        let jitter_seconds = thread_rng().gen_range(config.network_jitter_range.clone());

        if let Some(retry_after) = self.response_header(HEADER_RETRY_AFTER) {
            match retry_after.trim().parse::<u64>() {
                Ok(seconds) => return Duration::from_secs(seconds + jitter_seconds),
                Err(_) => {
                    log::warn!(target: "beacon", "invalid Retry-After header value: {retry_after:?}");
                }
            }
        }

        let exponential =
            Duration::from_secs(2u64.saturating_pow(self.attempts).saturating_add(jitter_seconds));

        exponential
            .max(config.network_flush_interval)
            .min(config.network_max_retry_interval)
    }

    /// Serialize this request for durable queue storage.
    ///
    /// Only identity fields are persisted; see [`ApiRequest::from_json`].
    pub fn to_json(&self) -> Value {
        let persisted = PersistedRequest {
            request_type: self.kind.discriminator().to_owned(),
            url_path: self.url_path.clone(),
            method: self.method,
            queued_time: self.queued_time,
            uuid: self.uuid.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            base_url: self.base_url.clone(),
        };

        serde_json::to_value(persisted).unwrap_or_else(|err| {
            log::error!(target: "beacon", "failed to serialize request {}: {err}", self.uuid);
            Value::Null
        })
    }

    /// Rebuild a request from its persisted JSON form.
    ///
    /// The request comes back [`RequestStatus::Unsent`] with a fresh attempt budget. An
    /// unrecognized `request_type` falls back to [`RequestKind::Generic`] rather than
    /// failing, so one odd entry never poisons a whole queue load.
    pub fn from_json(value: &Value, config: &Config) -> Result<ApiRequest> {
        let persisted: PersistedRequest = serde_json::from_value(value.clone())?;
        let kind = RequestKind::from_discriminator(&persisted.request_type);
        let max_attempts = kind.max_attempts(config, &persisted.headers);

        Ok(ApiRequest {
            kind,
            base_url: persisted.base_url,
            url_path: persisted.url_path,
            method: persisted.method,
            uuid: persisted.uuid,
            queued_time: persisted.queued_time,
            headers: persisted.headers,
            query: persisted.query,
            body: persisted.body,
            max_attempts,
            success_codes: kind.success_codes(),
            status: RequestStatus::Unsent,
            attempts: 0,
            start_time: None,
            end_time: None,
            response_code: None,
            response_headers: HashMap::new(),
            response_body: None,
            error_body: OnceLock::new(),
        })
    }
}

/// Durable representation of a queued request.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRequest {
    request_type: String,
    url_path: String,
    method: RequestMethod,
    #[serde(rename = "time")]
    queued_time: i64,
    uuid: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
}
