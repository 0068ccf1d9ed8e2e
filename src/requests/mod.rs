//! Outbound API requests: construction, lifecycle, persistence, and error decoding.
mod endpoint;
mod error_response;
mod request;
mod results;

pub use endpoint::RequestKind;
pub use error_response::{
    decode_error_response, ApiError, ErrorResponse, ErrorSource, EMAIL_POINTER_PATH,
    INVALID_INPUT_TITLE, PHONE_NUMBER_POINTER_PATH,
};
pub use request::{ApiRequest, RequestMethod, RequestStatus, SendContext};
pub use results::{FetchGeofencesResult, FetchedGeofence, ResolveDestinationResult};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::fixtures::{
        respond_with, respond_with_headers, OfflineNetwork, ScriptedTransport, VirtualClock,
    };
    use crate::model::Profile;
    use crate::network_monitor::AssumeConnected;
    use crate::transport::TransportResponse;
    use crate::{Config, Error};

    use super::{ApiRequest, RequestKind, RequestMethod, RequestStatus, SendContext};

    fn config() -> Config {
        Config::new("pk_test")
    }

    #[test]
    fn persistence_round_trips_identity_fields() {
        let clock = VirtualClock::at(1_700_000_000_000);
        let config = config();
        let mut profile = Profile::new();
        profile.set_email("a@b.com");
        let request = ApiRequest::create_profile(&config, &clock, &profile);

        let decoded = ApiRequest::from_json(&request.to_json(), &config).unwrap();

        assert_eq!(decoded.kind(), RequestKind::CreateProfile);
        assert_eq!(decoded.url_path(), request.url_path());
        assert_eq!(decoded.method(), request.method());
        assert_eq!(decoded.queued_time(), request.queued_time());
        assert_eq!(decoded.uuid(), request.uuid());
        assert_eq!(decoded.headers(), request.headers());
        assert_eq!(decoded.query(), request.query());
        assert_eq!(decoded.body(), request.body());
        // Lifecycle state is attempt-scoped, not identity: a reloaded entry is fresh work.
        assert_eq!(decoded.status(), RequestStatus::Unsent);
        assert_eq!(decoded.attempts(), 0);
    }

    #[test]
    fn unknown_request_type_falls_back_to_generic() {
        let config = config();
        let persisted = json!({
            "request_type": "some_future_endpoint",
            "url_path": "client/future",
            "method": "POST",
            "time": 1_700_000_000_000i64,
            "uuid": "u-1",
            "headers": {},
            "query": {},
        });

        let decoded = ApiRequest::from_json(&persisted, &config).unwrap();

        assert_eq!(decoded.kind(), RequestKind::Generic);
        assert_eq!(decoded.url_path(), "client/future");
        assert_eq!(decoded.method(), RequestMethod::Post);
        assert_eq!(decoded.uuid(), "u-1");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let config = config();
        let persisted = json!({ "request_type": "profile" });

        let result = ApiRequest::from_json(&persisted, &config);

        assert!(matches!(result, Err(Error::MalformedPersistedRequest(_))));
    }

    #[test]
    fn requests_dedup_by_uuid() {
        use std::collections::HashSet;

        let clock = VirtualClock::new();
        let config = config();
        let request = ApiRequest::create_profile(&config, &clock, &Profile::new());
        let reloaded = ApiRequest::from_json(&request.to_json(), &config).unwrap();
        let other = ApiRequest::create_profile(&config, &clock, &Profile::new());

        assert_eq!(request, reloaded);
        assert_ne!(request, other);

        let mut seen = HashSet::new();
        seen.insert(request.clone());
        assert!(!seen.insert(reloaded));
        assert!(seen.insert(other));
    }

    #[test]
    fn send_while_offline_is_a_no_op() {
        let clock = VirtualClock::new();
        let config = config();
        let transport = ScriptedTransport::new();
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        let status = request.send(
            &SendContext {
                config: &config,
                clock: &clock,
                network: &OfflineNetwork,
                transport: &transport,
            },
            |_| {},
        );

        assert_eq!(status, RequestStatus::Unsent);
        assert_eq!(request.attempts(), 0);
        assert_eq!(request.start_time(), None);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn accepted_response_completes_the_request() {
        let clock = VirtualClock::at(5_000);
        let config = config();
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        let status = respond_with(&mut request, &config, &clock, 202, "{}");

        assert_eq!(status, RequestStatus::Complete);
        assert_eq!(request.attempts(), 1);
        assert_eq!(request.response_code(), Some(202));
        assert_eq!(request.response_body(), Some("{}"));
        assert_eq!(request.start_time(), Some(5_000));
        assert_eq!(request.end_time(), Some(5_000));
    }

    #[test]
    fn success_range_narrowing_rejects_plain_200() {
        let clock = VirtualClock::new();
        let config = config();
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        // 200 is a fine code elsewhere, but the profile endpoint promises exactly 202.
        let status = respond_with(&mut request, &config, &clock, 200, "");

        assert_eq!(status, RequestStatus::Failed);
    }

    #[test]
    fn before_send_hook_observes_inflight_state() {
        let clock = VirtualClock::new();
        let config = config();
        let transport = ScriptedTransport::new();
        transport.respond(TransportResponse {
            status: 202,
            headers: Default::default(),
            body: String::new(),
        });
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        let mut observed = None;
        request.send(
            &SendContext {
                config: &config,
                clock: &clock,
                network: &AssumeConnected,
                transport: &transport,
            },
            |inflight| observed = Some((inflight.status(), inflight.attempts())),
        );

        assert_eq!(observed, Some((RequestStatus::Inflight, 1)));
    }

    #[test]
    fn rate_limit_retries_until_budget_is_exhausted() {
        let clock = VirtualClock::new();
        let config = config().with_network_max_attempts(3);
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        for attempt in 1..=2 {
            let status = respond_with(&mut request, &config, &clock, 429, "");
            assert_eq!(status, RequestStatus::PendingRetry, "attempt {attempt}");
        }
        let status = respond_with(&mut request, &config, &clock, 429, "");

        assert_eq!(status, RequestStatus::Failed);
        assert_eq!(request.attempts(), 3);
    }

    #[test]
    fn non_retryable_rejection_fails_immediately() {
        let clock = VirtualClock::new();
        let config = config();
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        let body = json!({ "errors": [{ "title": "Invalid input." }] }).to_string();
        let status = respond_with(&mut request, &config, &clock, 400, &body);

        assert_eq!(status, RequestStatus::Failed);
        assert_eq!(request.attempts(), 1);
        assert!(request.error_body().errors[0].is_invalid_input());
    }

    #[test]
    fn transport_failure_fails_and_counts_the_attempt() {
        let clock = VirtualClock::new();
        let config = config();
        let transport = ScriptedTransport::new();
        transport.fail_next();
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        let status = request.send(
            &SendContext {
                config: &config,
                clock: &clock,
                network: &AssumeConnected,
                transport: &transport,
            },
            |_| {},
        );

        assert_eq!(status, RequestStatus::Failed);
        assert_eq!(request.attempts(), 1);
        assert_eq!(request.response_code(), None);
    }

    #[test]
    fn attempt_count_rides_in_a_header() {
        let clock = VirtualClock::new();
        let config = config().with_network_max_attempts(3);
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        assert_eq!(
            request.headers().get("X-Beacon-Attempt-Count").unwrap(),
            "0/3"
        );
        respond_with(&mut request, &config, &clock, 429, "");
        assert_eq!(
            request.headers().get("X-Beacon-Attempt-Count").unwrap(),
            "1/3"
        );
    }

    #[test]
    fn end_time_is_stamped_once_per_terminal_transition() {
        let clock = VirtualClock::at(1_000);
        let config = config().with_network_max_attempts(3);
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        respond_with(&mut request, &config, &clock, 429, "");
        // PendingRetry leaves the request without a terminal stamp.
        assert_eq!(request.end_time(), None);
        assert_eq!(request.start_time(), Some(1_000));

        clock.advance_millis(500);
        respond_with(&mut request, &config, &clock, 202, "");
        assert_eq!(request.start_time(), Some(1_500));
        assert_eq!(request.end_time(), Some(1_500));
    }

    #[test]
    fn retry_interval_honors_retry_after_header() {
        let clock = VirtualClock::new();
        let mut config = config();
        config.network_jitter_range = 0..=0;
        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());

        // Header names arrive lowercased from the transport layer.
        let headers =
            std::collections::HashMap::from([("retry-after".to_owned(), "30".to_owned())]);
        respond_with_headers(&mut request, &config, &clock, 429, headers, "");

        assert_eq!(
            request.compute_retry_interval(&config),
            std::time::Duration::from_secs(30)
        );
    }

    #[test]
    fn retry_interval_backs_off_exponentially_within_bounds() {
        let clock = VirtualClock::new();
        let mut config = config();
        config.network_jitter_range = 0..=0;

        let mut request = ApiRequest::create_profile(&config, &clock, &Profile::new());
        // First attempt: 2^1 = 2s, floored by the 10s flush interval.
        respond_with(&mut request, &config, &clock, 429, "");
        assert_eq!(
            request.compute_retry_interval(&config),
            config.network_flush_interval
        );

        // Enough attempts to overflow the ceiling.
        for _ in 0..10 {
            respond_with(&mut request, &config, &clock, 429, "");
        }
        assert_eq!(
            request.compute_retry_interval(&config),
            config.network_max_retry_interval
        );
    }
}
